/// Rule engine and built-in policy rules
pub mod rule_engine;
#[allow(clippy::module_inception)]
pub mod rules;

pub use rule_engine::{PolicyRule, RuleEngine};
pub use rules::{
    AfterHoursAccessRule, AfterHoursMotionRule, EnvironmentalThresholdRule, RepeatedDenialRule,
    SurveillanceTamperRule, UnauthorizedAccessAttemptRule,
};
