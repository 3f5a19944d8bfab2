use crate::error::IngestError;
use crate::events::Event;
use log::{debug, error, info, warn};
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const INITIAL_RESTART_DELAY: Duration = Duration::from_secs(1);
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Counters for one pass over a line-delimited event stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Events parsed and sent to the channel
    pub forwarded: usize,
    /// Lines that were not usable events
    pub skipped: usize,
    /// The receiving side hung up
    pub channel_closed: bool,
}

/// Live event feed collector
///
/// Spawns and supervises an external subscriber command (for example
/// `mosquitto_sub -t grsee/events`) whose stdout carries one JSON event per
/// line. Parsed events are sent to a channel for processing by the monitor.
/// If the subscriber exits it is restarted with exponential backoff.
pub struct StreamCollector {
    /// Program and arguments of the subscriber
    command: Vec<String>,
    /// Channel to send parsed events
    output_channel: Sender<Event>,
    /// Upper bound of the restart backoff
    max_restart_delay: Duration,
    /// Handle to the background thread
    thread_handle: Option<JoinHandle<()>>,
    /// Shared state for controlling the collector
    running: Arc<Mutex<bool>>,
    /// Subscriber currently being read, so `stop` can terminate it
    current_child: Arc<Mutex<Option<Child>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StreamCollector {
    /// Create a new collector for the given subscriber command
    ///
    /// # Arguments
    ///
    /// * `command` - Program followed by its arguments
    /// * `channel` - Channel to send parsed events
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use std::sync::mpsc;
    /// use grsee::ingest::StreamCollector;
    ///
    /// let (tx, rx) = mpsc::channel();
    /// let collector = StreamCollector::new(
    ///     vec!["mosquitto_sub".to_string(), "-t".to_string(), "grsee/events".to_string()],
    ///     tx,
    /// );
    /// ```
    pub fn new(command: Vec<String>, channel: Sender<Event>) -> Self {
        Self {
            command,
            output_channel: channel,
            max_restart_delay: Duration::from_secs(60),
            thread_handle: None,
            running: Arc::new(Mutex::new(false)),
            current_child: Arc::new(Mutex::new(None)),
        }
    }

    /// Override the backoff ceiling (60 seconds by default)
    pub fn with_max_restart_delay(mut self, delay: Duration) -> Self {
        self.max_restart_delay = delay.max(INITIAL_RESTART_DELAY);
        self
    }

    /// Start the collector
    ///
    /// Spawns the subscriber and a background thread that reads it. Calling
    /// `start` on a running collector does nothing.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::SubprocessSpawn` if the subscriber cannot be started.
    pub fn start(&mut self) -> Result<(), IngestError> {
        {
            let mut running = lock(&self.running);
            if *running {
                return Ok(());
            }
            *running = true;
        }

        let first_child = match Self::spawn_subscriber(&self.command) {
            Ok(child) => child,
            Err(e) => {
                *lock(&self.running) = false;
                return Err(e);
            }
        };

        let command = self.command.clone();
        let channel = self.output_channel.clone();
        let running = Arc::clone(&self.running);
        let current_child = Arc::clone(&self.current_child);
        let max_delay = self.max_restart_delay;

        let handle = thread::spawn(move || {
            Self::collector_thread(
                command,
                channel,
                running,
                current_child,
                max_delay,
                first_child,
            );
        });

        self.thread_handle = Some(handle);
        info!("StreamCollector started: {}", self.command.join(" "));
        Ok(())
    }

    /// Stop the collector
    ///
    /// Terminates the subscriber and waits for the background thread.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::SubprocessTerminated` if the thread cannot be joined.
    pub fn stop(&mut self) -> Result<(), IngestError> {
        *lock(&self.running) = false;

        if let Some(child) = lock(&self.current_child).as_mut() {
            if let Err(e) = child.kill() {
                debug!("Subscriber already exited: {}", e);
            }
        }

        if let Some(handle) = self.thread_handle.take() {
            handle.join().map_err(|_| {
                IngestError::SubprocessTerminated("Failed to join collector thread".to_string())
            })?;
        }

        info!("StreamCollector stopped");
        Ok(())
    }

    /// Check if the collector is currently running
    pub fn is_running(&self) -> bool {
        *lock(&self.running)
    }

    /// Main collector thread function
    ///
    /// Reads the subscriber until it exits, then restarts it. Every exit
    /// doubles the restart delay up to `max_delay`; a run that delivered at
    /// least one event resets the delay.
    fn collector_thread(
        command: Vec<String>,
        channel: Sender<Event>,
        running: Arc<Mutex<bool>>,
        current_child: Arc<Mutex<Option<Child>>>,
        max_delay: Duration,
        first_child: Child,
    ) {
        let mut restart_delay = INITIAL_RESTART_DELAY;
        let mut consecutive_failures: u32 = 0;
        let mut next_child = Some(first_child);

        while *lock(&running) {
            let spawned = match next_child.take() {
                Some(child) => Ok(child),
                None => Self::spawn_subscriber(&command),
            };

            match spawned {
                Ok(mut child) => {
                    let stdout = child.stdout.take();
                    {
                        let mut slot = lock(&current_child);
                        if !*lock(&running) {
                            let _ = child.kill();
                            let _ = child.wait();
                            break;
                        }
                        *slot = Some(child);
                    }

                    let result = match stdout {
                        Some(stdout) => Self::process_stream(BufReader::new(stdout), &channel),
                        None => Err(IngestError::ParseError("No stdout available".to_string())),
                    };

                    if let Some(mut child) = lock(&current_child).take() {
                        let _ = child.kill();
                        match child.wait() {
                            Ok(status) => debug!("Subscriber exited with status: {}", status),
                            Err(e) => warn!("Failed to reap subscriber: {}", e),
                        }
                    }

                    match result {
                        Ok(stats) => {
                            debug!(
                                "Subscriber run finished: {} forwarded, {} skipped",
                                stats.forwarded, stats.skipped
                            );
                            if stats.channel_closed {
                                info!("Event channel closed, stopping collector");
                                break;
                            }
                            if stats.forwarded > 0 {
                                consecutive_failures = 0;
                                restart_delay = INITIAL_RESTART_DELAY;
                            }
                        }
                        Err(e) => error!("Error reading subscriber output: {}", e),
                    }
                    consecutive_failures += 1;
                }
                Err(e) => {
                    error!("Failed to spawn subscriber: {}", e);
                    consecutive_failures += 1;
                }
            }

            if !*lock(&running) {
                break;
            }

            warn!(
                "Restarting subscriber in {:?} (attempt #{})",
                restart_delay, consecutive_failures
            );
            Self::sleep_while_running(&running, restart_delay);
            restart_delay = std::cmp::min(restart_delay * 2, max_delay);
        }

        *lock(&running) = false;
        info!("Stream collector thread finished");
    }

    /// Sleep in short intervals so shutdown stays responsive
    fn sleep_while_running(running: &Mutex<bool>, duration: Duration) {
        let mut remaining = duration;
        while remaining > Duration::ZERO && *lock(running) {
            let sleep_time = std::cmp::min(remaining, SHUTDOWN_POLL_INTERVAL);
            thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    /// Spawn the subscriber subprocess
    fn spawn_subscriber(command: &[String]) -> Result<Child, IngestError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| IngestError::SubprocessSpawn("empty subscriber command".to_string()))?;

        debug!("Spawning subscriber: {} {:?}", program, args);

        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| IngestError::SubprocessSpawn(format!("{}: {}", program, e)))
    }

    /// Read line-delimited JSON events and forward them to `channel`
    ///
    /// Blank lines are ignored; malformed lines and events without an
    /// `event_id` are logged at debug level and skipped. Returns when the
    /// reader reaches end of input or the channel is closed.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::IoError` if reading fails.
    pub fn process_stream<R: BufRead>(
        reader: R,
        channel: &Sender<Event>,
    ) -> Result<StreamStats, IngestError> {
        let mut stats = StreamStats::default();

        for raw_line in reader.split(b'\n') {
            let raw_line = raw_line?;
            let line = String::from_utf8_lossy(&raw_line);
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            match Event::from_json(line) {
                Ok(event) if event.event_id.trim().is_empty() => {
                    debug!("Skipping streamed event without event_id: {}", line);
                    stats.skipped += 1;
                }
                Ok(event) => {
                    debug!(
                        "Parsed streamed event: {} - {} - {}",
                        event.event_id, event.zone, event.event_type
                    );
                    if let Err(e) = channel.send(event) {
                        warn!("Failed to send event to channel: {}", e);
                        stats.channel_closed = true;
                        return Ok(stats);
                    }
                    stats.forwarded += 1;
                }
                Err(e) => {
                    debug!("Failed to parse streamed line '{}': {}", line, e);
                    stats.skipped += 1;
                }
            }
        }

        Ok(stats)
    }
}

impl Drop for StreamCollector {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}


// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use std::io::Cursor;
    use std::sync::mpsc;

    /// A stream mixing valid event lines with garbage
    #[derive(Debug, Clone)]
    struct MixedStream {
        lines: Vec<String>,
        valid: usize,
    }

    impl Arbitrary for MixedStream {
        fn arbitrary(g: &mut Gen) -> Self {
            let garbage = [
                "not json at all",
                "{ invalid: json }",
                "{\"event_id\": ",
                "[1, 2, 3]",
                "{\"zone\": \"LOBBY\"}",
                "null",
            ];
            let size = usize::arbitrary(g) % 40;
            let mut lines = Vec::with_capacity(size);
            let mut valid = 0;

            for i in 0..size {
                if bool::arbitrary(g) {
                    lines.push(format!(
                        "{{\"event_id\": \"evt_{}\", \"zone\": \"LOBBY\", \"severity\": \"low\"}}",
                        i
                    ));
                    valid += 1;
                } else {
                    let line = g.choose(&garbage).copied().unwrap_or_default();
                    lines.push(line.to_string());
                }
            }
            MixedStream { lines, valid }
        }
    }

    #[quickcheck]
    fn prop_malformed_lines_never_halt_processing(stream: MixedStream) -> bool {
        let (tx, rx) = mpsc::channel();
        let input = stream.lines.join("\n");

        match StreamCollector::process_stream(Cursor::new(input), &tx) {
            Ok(stats) => {
                stats.forwarded == stream.valid
                    && stats.forwarded + stats.skipped == stream.lines.len()
                    && rx.try_iter().count() == stream.valid
            }
            Err(_) => false,
        }
    }
}
