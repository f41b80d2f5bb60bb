//! Quality rule definitions and loading

use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{RecorderError, Result};

/// Built-in rule configuration, used when no rules file is configured.
pub const DEFAULT_RULES_YAML: &str = include_str!("../../config/quality-rules.yml");

/// Maximum number of step lines accepted by the step ceiling rule
pub const MAX_STEP_LINES: usize = 20;

/// Minimum length of a descriptive first line
const MIN_TITLE_LEN: usize = 15;

fn step_line() -> &'static Regex {
    static STEP_LINE: OnceLock<Regex> = OnceLock::new();
    STEP_LINE.get_or_init(|| {
        Regex::new(r"(?i)^(given|when|then|and|but)\b").expect("step line pattern is valid")
    })
}

/// One configured quality rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityRule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub weight: f64,
}

/// Predicate evaluated for a rule, picked from the rule identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCheck {
    /// The scenario contains a Then assertion (R1, R4)
    HasAssertion,
    /// The scenario is named and its first line is descriptive (R2)
    DescriptiveTitle,
    /// The scenario stays at or below [`MAX_STEP_LINES`] step lines (R3)
    StepCeiling,
    /// Given, When and Then are all used (R5)
    GivenWhenThen,
    /// Rules without a built-in predicate never fail
    Informational,
}

impl RuleCheck {
    pub fn for_id(id: &str) -> Self {
        match id {
            "R1" | "R4" => RuleCheck::HasAssertion,
            "R2" => RuleCheck::DescriptiveTitle,
            "R3" => RuleCheck::StepCeiling,
            "R5" => RuleCheck::GivenWhenThen,
            _ => RuleCheck::Informational,
        }
    }

    pub fn is_satisfied(&self, content: &str) -> bool {
        let lower = content.to_lowercase();
        match self {
            RuleCheck::HasAssertion => lower.contains("then"),
            RuleCheck::DescriptiveTitle => {
                let first = content.lines().next().unwrap_or("");
                lower.contains("scenario") && first.chars().count() > MIN_TITLE_LEN
            }
            RuleCheck::StepCeiling => {
                content
                    .lines()
                    .filter(|l| step_line().is_match(l.trim()))
                    .count()
                    <= MAX_STEP_LINES
            }
            RuleCheck::GivenWhenThen => {
                lower.contains("given") && lower.contains("when") && lower.contains("then")
            }
            RuleCheck::Informational => true,
        }
    }
}

/// Explanation attached to a rule outcome. Falls back to the configured description.
pub fn explanation(rule: &QualityRule) -> String {
    let reason = match rule.id.as_str() {
        "R1" => "Include at least one observable validation (Then) so the flow confirms its results instead of running without assertions.",
        "R2" => "Give the scenario a descriptive name that states its goal, so coverage can be identified at a glance.",
        "R3" => "Keep the scenario at 20 steps or fewer; long scenarios are harder to read, slower and flakier.",
        "R4" => "Add Then validations that capture the expected behavior, so visible regressions are detected.",
        "R5" => "Use Given/When/Then consistently to keep the scenario readable for the whole team.",
        _ => rule.description.as_str(),
    };
    format!("{} - {}", rule.id, reason)
}

#[derive(Debug, Deserialize)]
struct RulesDocument {
    quality: QualitySection,
}

#[derive(Debug, Deserialize)]
struct QualitySection {
    #[serde(default)]
    rules: Vec<QualityRule>,
}

/// A rule that passed validation, paired with its predicate
#[derive(Debug, Clone)]
pub struct ActiveRule {
    pub rule: QualityRule,
    pub check: RuleCheck,
}

/// Immutable list of active rules
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<ActiveRule>,
    total_weight: f64,
}

impl RuleSet {
    /// Keep the active rules, rejecting duplicate ids among them and a
    /// non-positive total weight.
    pub fn new(rules: Vec<QualityRule>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut active = Vec::new();
        let mut total_weight = 0.0;

        for rule in rules.into_iter().filter(|r| r.active) {
            if !rule.weight.is_finite() || rule.weight < 0.0 {
                return Err(RecorderError::InvalidConfiguration(format!(
                    "Rule {} has an invalid weight: {}",
                    rule.id, rule.weight
                )));
            }
            if !seen.insert(rule.id.clone()) {
                return Err(RecorderError::InvalidConfiguration(format!(
                    "Duplicate rule id: {}",
                    rule.id
                )));
            }
            total_weight += rule.weight;
            active.push(ActiveRule {
                check: RuleCheck::for_id(&rule.id),
                rule,
            });
        }

        if total_weight <= 0.0 {
            return Err(RecorderError::InvalidConfiguration(
                "Active rule weights must add up to more than zero".to_string(),
            ));
        }

        Ok(Self {
            rules: active,
            total_weight,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let doc: RulesDocument = serde_yaml::from_str(content).map_err(|e| {
            RecorderError::InvalidConfiguration(format!("Invalid quality rules: {}", e))
        })?;
        let set = Self::new(doc.quality.rules)?;
        info!("{} quality rules loaded", set.rules.len());
        Ok(set)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecorderError::InvalidConfiguration(format!(
                "Cannot read quality rules {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_yaml(DEFAULT_RULES_YAML)
    }

    pub fn rules(&self) -> &[ActiveRule] {
        &self.rules
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, active: bool, weight: f64) -> QualityRule {
        QualityRule {
            id: id.to_string(),
            name: format!("rule {}", id),
            description: format!("description {}", id),
            active,
            weight,
        }
    }

    #[test]
    fn test_builtin_rules_load() {
        let set = RuleSet::builtin().unwrap();
        let ids: Vec<&str> = set.rules().iter().map(|r| r.rule.id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R2", "R3", "R4", "R5"]);
        assert!(set.total_weight() > 0.0);
    }

    #[test]
    fn test_duplicate_active_ids_rejected() {
        let err = RuleSet::new(vec![rule("R1", true, 1.0), rule("R1", true, 2.0)]).unwrap_err();
        assert!(matches!(err, RecorderError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_duplicate_inactive_id_allowed() {
        let set = RuleSet::new(vec![rule("R1", true, 1.0), rule("R1", false, 2.0)]).unwrap();
        assert_eq!(set.rules().len(), 1);
        assert_eq!(set.total_weight(), 1.0);
    }

    #[test]
    fn test_zero_total_weight_rejected() {
        let err = RuleSet::new(vec![rule("R1", true, 0.0), rule("R2", true, 0.0)]).unwrap_err();
        assert!(matches!(err, RecorderError::InvalidConfiguration(_)));

        // Weight only on inactive rules does not count
        let err = RuleSet::new(vec![rule("R1", true, 0.0), rule("R2", false, 5.0)]).unwrap_err();
        assert!(matches!(err, RecorderError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = RuleSet::new(vec![rule("R1", true, 2.0), rule("R2", true, -1.0)]).unwrap_err();
        assert!(matches!(err, RecorderError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_yaml_defaults_inactive() {
        let yaml = r#"
quality:
  rules:
    - id: R1
      active: true
      weight: 2
    - id: R9
      weight: 1
"#;
        let set = RuleSet::from_yaml(yaml).unwrap();
        assert_eq!(set.rules().len(), 1);
        assert_eq!(set.rules()[0].check, RuleCheck::HasAssertion);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            RuleSet::from_yaml("quality: [1, 2"),
            Err(RecorderError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_step_ceiling() {
        let mut scenario = String::from("Scenario: long flow\n");
        for i in 0..MAX_STEP_LINES {
            scenario.push_str(&format!("When I click \"#b{}\"\n", i));
        }
        assert!(RuleCheck::StepCeiling.is_satisfied(&scenario));
        scenario.push_str("  and I wait\n");
        assert!(!RuleCheck::StepCeiling.is_satisfied(&scenario));
    }

    #[test]
    fn test_descriptive_title() {
        assert!(RuleCheck::DescriptiveTitle.is_satisfied("Scenario: Recorded flow\nGiven x"));
        assert!(!RuleCheck::DescriptiveTitle.is_satisfied("Scenario: Flow\nGiven x"));
        assert!(!RuleCheck::DescriptiveTitle.is_satisfied("A long enough first line"));
    }

    #[test]
    fn test_explanation_fallback() {
        assert!(explanation(&rule("R5", true, 1.0)).starts_with("R5 - Use Given/When/Then"));
        assert_eq!(explanation(&rule("X1", true, 1.0)), "X1 - description X1");
    }
}
