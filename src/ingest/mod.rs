/// Event ingestion from files and live subscriber feeds
pub mod file_loader;
pub mod stream_collector;

pub use file_loader::{load_events_file, parse_events_document};
pub use stream_collector::{StreamCollector, StreamStats};
