//! Proof-of-work conditions.
//!
//! A condition is a named entry in the config (`[conditions.<name>]`) whose
//! `type` selects an implementation from a [`ConditionRegistry`]. The
//! orchestrator only sees [`ConditionEvaluator`], which aggregates every
//! configured condition under the `any`/`all` mode.
//!
//! A condition whose construction or check fails counts as not met.

mod notes;
mod registry;
mod wordcount;

pub use notes::{front_matter, CheckboxCondition, DailyNote, HeadingCondition, RegexCondition, YamlCondition};
pub use registry::{ConditionContext, ConditionFactory, ConditionRegistry};
pub use wordcount::{LinkedWordcountCondition, WordCounter};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConditionError;

/// One `[conditions.<name>]` table: a type tag plus type-specific params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl ConditionConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.get(key)
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    pub fn bool_param(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(|v| v.as_bool())
    }

    /// A string param that must be present and non-empty.
    pub fn required_str(&self, key: &str) -> Result<&str, ConditionError> {
        self.str_param(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ConditionError::Misconfigured(format!("'{}' condition needs a '{key}'", self.kind))
            })
    }
}

/// How individual results combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionMode {
    /// At least one condition met.
    #[default]
    Any,
    /// Every condition met (and at least one configured).
    All,
}

/// A single check against some source of truth.
pub trait Condition: Send + Sync {
    /// Returns whether the condition is met plus a human-readable description.
    fn check(&self, config: &ConditionConfig) -> Result<(bool, String), ConditionError>;
}

/// Result of one named condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionReport {
    pub name: String,
    pub met: bool,
    pub description: String,
}

/// Aggregated result of all configured conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub satisfied: bool,
    pub reports: Vec<ConditionReport>,
}

impl Evaluation {
    /// Combine per-condition results under `mode`.
    pub fn combine(mode: ConditionMode, reports: Vec<ConditionReport>) -> Self {
        let satisfied = match mode {
            ConditionMode::Any => reports.iter().any(|r| r.met),
            ConditionMode::All => !reports.is_empty() && reports.iter().all(|r| r.met),
        };
        Self { satisfied, reports }
    }

    /// Descriptions of the conditions that were met, joined for display.
    pub fn summary(&self) -> String {
        let met: Vec<&str> = self
            .reports
            .iter()
            .filter(|r| r.met)
            .map(|r| r.description.as_str())
            .collect();
        if met.is_empty() {
            "No conditions met".to_string()
        } else {
            met.join("; ")
        }
    }
}

/// Whether the user has earned a proof-of-work unlock right now.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self) -> Evaluation;
}

/// The evaluator built from the config's `[conditions]` tables.
pub struct ConfiguredConditions {
    conditions: BTreeMap<String, ConditionConfig>,
    mode: ConditionMode,
    registry: Arc<ConditionRegistry>,
    context: ConditionContext,
}

impl ConfiguredConditions {
    pub fn new(
        conditions: BTreeMap<String, ConditionConfig>,
        mode: ConditionMode,
        registry: Arc<ConditionRegistry>,
        context: ConditionContext,
    ) -> Self {
        Self {
            conditions,
            mode,
            registry,
            context,
        }
    }

    fn check_one(&self, config: &ConditionConfig) -> Result<(bool, String), ConditionError> {
        let condition = self.registry.create(&config.kind, &self.context)?;
        condition.check(config)
    }
}

impl ConditionEvaluator for ConfiguredConditions {
    fn evaluate(&self) -> Evaluation {
        let reports = self
            .conditions
            .iter()
            .map(|(name, config)| {
                let (met, description) = match self.check_one(config) {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(condition = %name, kind = %config.kind, error = %e, "condition check failed");
                        (false, format!("Error: {e}"))
                    }
                };
                ConditionReport {
                    name: name.clone(),
                    met,
                    description,
                }
            })
            .collect();
        Evaluation::combine(self.mode, reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{SystemClock, Zone};

    fn report(name: &str, met: bool) -> ConditionReport {
        ConditionReport {
            name: name.into(),
            met,
            description: format!("{name} {}", if met { "done" } else { "missing" }),
        }
    }

    #[test]
    fn any_mode_needs_one() {
        let eval = Evaluation::combine(ConditionMode::Any, vec![report("a", false), report("b", true)]);
        assert!(eval.satisfied);
        assert_eq!(eval.summary(), "b done");
    }

    #[test]
    fn all_mode_needs_every_one() {
        let eval = Evaluation::combine(ConditionMode::All, vec![report("a", false), report("b", true)]);
        assert!(!eval.satisfied);
        let eval = Evaluation::combine(ConditionMode::All, vec![report("a", true), report("b", true)]);
        assert!(eval.satisfied);
    }

    #[test]
    fn empty_set_is_never_satisfied() {
        assert!(!Evaluation::combine(ConditionMode::Any, vec![]).satisfied);
        assert!(!Evaluation::combine(ConditionMode::All, vec![]).satisfied);
        assert_eq!(Evaluation::combine(ConditionMode::Any, vec![]).summary(), "No conditions met");
    }

    #[test]
    fn mode_parses_lowercase() {
        let mode: ConditionMode = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(mode, ConditionMode::All);
    }

    #[test]
    fn front_matter_and_linked_words_from_a_vault() {
        use crate::clock::ManualClock;
        use chrono::{TimeZone, Utc};

        let vault = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(vault.path().join("Daily")).unwrap();
        std::fs::write(
            vault.path().join("Daily/2026-06-01.md"),
            "---\nworkout: true\n---\n\n# Writing\n- [[Essay]]\n",
        )
        .unwrap();
        std::fs::write(vault.path().join("Essay.md"), "a few words here").unwrap();

        let mut conditions = BTreeMap::new();
        conditions.insert("workout".to_string(), ConditionConfig::new("yaml").with_param("field", "workout"));
        conditions.insert(
            "writing".to_string(),
            ConditionConfig::new("linked_wordcount").with_param("minimum", 10),
        );
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()));
        let context = ConditionContext::new(Some(vault.path().to_path_buf()), "Daily/{date}.md", Zone::parse(Some("UTC")).unwrap(), clock);
        let registry = Arc::new(ConditionRegistry::with_builtins());

        let any = ConfiguredConditions::new(conditions.clone(), ConditionMode::Any, registry.clone(), context.clone());
        let eval = any.evaluate();
        assert!(eval.satisfied);
        assert_eq!(eval.reports[0].description, "YAML field 'workout' set");
        assert_eq!(eval.reports[1].description, "Word count: 4/10 (Essay: 4)");

        let all = ConfiguredConditions::new(conditions, ConditionMode::All, registry, context);
        assert!(!all.evaluate().satisfied);
    }

    #[test]
    fn unknown_type_counts_as_not_met() {
        let mut conditions = BTreeMap::new();
        conditions.insert("steps".to_string(), ConditionConfig::new("strava"));
        let evaluator = ConfiguredConditions::new(
            conditions,
            ConditionMode::Any,
            Arc::new(ConditionRegistry::with_builtins()),
            ConditionContext::new(None, "Daily/{date}.md", Zone::Local, Arc::new(SystemClock)),
        );

        let eval = evaluator.evaluate();
        assert!(!eval.satisfied);
        assert!(eval.reports[0].description.contains("Unknown condition type"));
    }
}
