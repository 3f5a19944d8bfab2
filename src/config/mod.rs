/// TOML configuration for rules, dashboard and ingestion
#[allow(clippy::module_inception)]
pub mod config;

pub use config::{
    BusinessHours, Config, DashboardConfig, DenialPolicy, IngestConfig, RuleConfig, TamperPolicy,
};
