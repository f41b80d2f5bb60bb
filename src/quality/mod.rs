//! Quality rule engine
//!
//! Rules are weighted and individually toggleable. A finished scenario is
//! scored as the weight of the satisfied rules over the total active weight,
//! and every failed rule contributes an improvement suggestion.

pub mod analyzer;
pub mod rules;

pub use analyzer::{score, QualityAnalyzer, QualityResult, RuleOutcome, RuleSource};
pub use rules::{QualityRule, RuleCheck, RuleSet};
