//! Scenario scoring against the active quality rules

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::OnceCell;

use super::rules::{explanation, ActiveRule, RuleSet};
use crate::error::Result;

/// Outcome of one rule for one scenario
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    pub rule_id: String,
    pub message: String,
}

/// Result of scoring a scenario
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityResult {
    /// Weighted share of satisfied rules, in [0, 1], two decimals
    pub score: f64,
    pub passed_rules: Vec<RuleOutcome>,
    pub failed_rules: Vec<RuleOutcome>,
    pub suggestions: Vec<String>,
    pub rule_details: BTreeMap<String, String>,
}

impl QualityResult {
    fn round_score(&mut self) {
        self.score = round_half_up(self.score, 2);
    }
}

/// Round half up to `decimals` places. The epsilon absorbs binary
/// representation error such as `0.285 * 100 = 28.499999999999996`.
pub fn round_half_up(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    ((value * factor) + 0.5 + 1e-9).floor() / factor
}

/// Score `content` against every rule of `rules`.
pub fn score(rules: &RuleSet, content: &str) -> QualityResult {
    let mut result = QualityResult::default();
    let mut accumulated = 0.0;

    for ActiveRule { rule, check } in rules.rules() {
        let message = explanation(rule);
        let outcome = RuleOutcome {
            rule_id: rule.id.clone(),
            message: message.clone(),
        };
        result.rule_details.insert(rule.id.clone(), message.clone());

        if check.is_satisfied(content) {
            accumulated += rule.weight;
            result.passed_rules.push(outcome);
        } else {
            result.failed_rules.push(outcome);
            result.suggestions.push(message);
        }
    }

    let total = rules.total_weight();
    result.score = if total > 0.0 {
        (accumulated / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    result.round_score();
    result
}

/// Where the rule set comes from
#[derive(Debug, Clone)]
pub enum RuleSource {
    Builtin,
    File(PathBuf),
    Inline(String),
}

/// Loads the rule set on first use and scores scenarios against it.
///
/// Concurrent first callers wait on the same load; a failed load is not
/// cached, so fixing the rules file and retrying works.
pub struct QualityAnalyzer {
    source: RuleSource,
    rules: OnceCell<RuleSet>,
}

impl QualityAnalyzer {
    pub fn new(source: RuleSource) -> Self {
        Self {
            source,
            rules: OnceCell::new(),
        }
    }

    /// Analyzer with an already validated rule set
    pub fn with_rules(rules: RuleSet) -> Self {
        Self {
            source: RuleSource::Builtin,
            rules: OnceCell::new_with(Some(rules)),
        }
    }

    pub async fn rules(&self) -> Result<&RuleSet> {
        self.rules
            .get_or_try_init(|| async {
                match &self.source {
                    RuleSource::Builtin => RuleSet::builtin(),
                    RuleSource::File(path) => RuleSet::from_file(path),
                    RuleSource::Inline(yaml) => RuleSet::from_yaml(yaml),
                }
            })
            .await
    }

    pub async fn analyze(&self, content: &str) -> Result<QualityResult> {
        let rules = self.rules().await?;
        Ok(score(rules, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecorderError;
    use crate::quality::rules::QualityRule;
    use std::sync::Arc;

    fn rules(weights: &[(&str, f64)]) -> RuleSet {
        RuleSet::new(
            weights.iter()
                .map(|(id, weight)| QualityRule {
                    id: id.to_string(),
                    name: id.to_string(),
                    description: format!("{} description", id),
                    active: true,
                    weight: *weight,
                })
                .collect(),
        )
        .unwrap()
    }

    const COMPLETE: &str = "Scenario: Recorded checkout flow\n\
        Given I navigate to \"https://shop.test\"\n\
        When I click \"css=#buy\"\n\
        Then I should see the text \"Thanks\"";

    #[test]
    fn test_complete_scenario_scores_one() {
        let result = score(&RuleSet::builtin().unwrap(), COMPLETE);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.passed_rules.len(), 5);
        assert!(result.failed_rules.is_empty());
        assert!(result.suggestions.is_empty());
        assert_eq!(result.rule_details.len(), 5);
    }

    #[test]
    fn test_missing_then_fails_coherence() {
        let content = "Scenario: Recorded flow\nGiven I navigate to \"x\"\nWhen I click \"y\"";
        let result = score(&rules(&[("R5", 1.0)]), content);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.failed_rules[0].rule_id, "R5");
        assert_eq!(result.suggestions.len(), 1);
        assert!(result.suggestions[0].starts_with("R5 - "));
        assert_eq!(result.rule_details["R5"], result.suggestions[0]);
    }

    #[test]
    fn test_weighted_score() {
        // R1 passes (contains "then"), R2 fails (no "scenario"), unknown R7 always passes
        let set = rules(&[("R1", 1.0), ("R2", 2.0), ("R7", 1.0)]);
        let result = score(&set, "Then done");
        assert_eq!(result.score, 0.5);
        let passed: Vec<&str> = result.passed_rules.iter().map(|o| o.rule_id.as_str()).collect();
        assert_eq!(passed, vec!["R1", "R7"]);
        assert_eq!(result.rule_details["R7"], "R7 - R7 description");
    }

    #[test]
    fn test_score_rounding() {
        // 1 / 3 -> 0.33, 2 / 3 -> 0.67
        let set = rules(&[("R1", 1.0), ("R2", 1.0), ("R5", 1.0)]);
        assert_eq!(score(&set, "then").score, 0.33);
        let set = rules(&[("R1", 1.0), ("R7", 1.0), ("R5", 1.0)]);
        assert_eq!(score(&set, "then").score, 0.67);

        assert_eq!(round_half_up(0.125, 2), 0.13);
        assert_eq!(round_half_up(0.285, 2), 0.29);
        assert_eq!(round_half_up(0.0, 2), 0.0);
    }

    #[test]
    fn test_score_within_bounds() {
        let contents = ["", "then", COMPLETE, "given when", "Scenario: x"];
        let weights = [0.0, 0.1, 1.0, 3.5, 100.0];
        for (i, w) in weights.iter().enumerate() {
            let set = rules(&[("R1", *w), ("R2", 1.0), ("R3", weights[(i + 1) % 5]), ("R5", 0.5)]);
            for content in contents {
                let s = score(&set, content).score;
                assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
            }
        }
    }

    #[tokio::test]
    async fn test_analyzer_loads_once() {
        let analyzer = Arc::new(QualityAnalyzer::new(RuleSource::Builtin));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let analyzer = analyzer.clone();
            handles.push(tokio::spawn(async move {
                analyzer.rules().await.unwrap() as *const RuleSet as usize
            }));
        }
        let mut addresses = Vec::new();
        for handle in handles {
            addresses.push(handle.await.unwrap());
        }
        addresses.dedup();
        assert_eq!(addresses.len(), 1);
    }

    #[tokio::test]
    async fn test_analyzer_reports_invalid_rules() {
        let yaml = "quality:\n  rules:\n    - id: R1\n      active: true\n      weight: 0\n";
        let analyzer = QualityAnalyzer::new(RuleSource::Inline(yaml.to_string()));
        let err = analyzer.analyze(COMPLETE).await.unwrap_err();
        assert!(matches!(err, RecorderError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_analyzer_with_rules() {
        let analyzer = QualityAnalyzer::with_rules(rules(&[("R1", 1.0)]));
        assert_eq!(analyzer.analyze("no assertion").await.unwrap().score, 0.0);
    }
}
