use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;

use super::notes::{CheckboxCondition, DailyNote, HeadingCondition, RegexCondition, YamlCondition};
use super::wordcount::LinkedWordcountCondition;
use super::Condition;
use crate::clock::{Clock, Zone};
use crate::error::ConditionError;

/// Builds a condition from the shared context.
pub type ConditionFactory =
    Box<dyn Fn(&ConditionContext) -> Result<Box<dyn Condition>, ConditionError> + Send + Sync>;

/// What a condition factory gets to work with.
#[derive(Clone)]
pub struct ConditionContext {
    pub vault_path: Option<PathBuf>,
    pub daily_note_pattern: String,
    pub zone: Zone,
    pub clock: Arc<dyn Clock>,
}

impl ConditionContext {
    pub fn new(
        vault_path: Option<PathBuf>,
        daily_note_pattern: impl Into<String>,
        zone: Zone,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            vault_path,
            daily_note_pattern: daily_note_pattern.into(),
            zone,
            clock,
        }
    }

    /// Today in the effective zone.
    pub fn today(&self) -> NaiveDate {
        self.zone.date_of(self.clock.now())
    }

    pub fn vault(&self) -> Result<&Path, ConditionError> {
        self.vault_path
            .as_deref()
            .ok_or_else(|| ConditionError::Misconfigured("notes.vault_path is not set".into()))
    }

    /// Today's daily note; fails if no vault is configured.
    pub fn daily_note(&self) -> Result<DailyNote, ConditionError> {
        Ok(DailyNote::for_date(self.vault()?, &self.daily_note_pattern, self.today()))
    }
}

/// Maps condition type names to factories.
///
/// An explicit object rather than global state: the application builds one
/// with [`ConditionRegistry::with_builtins`] and may register more.
#[derive(Default)]
pub struct ConditionRegistry {
    factories: BTreeMap<String, ConditionFactory>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the daily-note conditions: `checkbox`, `yaml`, `heading`,
    /// `regex` and `linked_wordcount`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("checkbox", |ctx| Ok(Box::new(CheckboxCondition::new(ctx.daily_note()?))));
        registry.register("yaml", |ctx| Ok(Box::new(YamlCondition::new(ctx.daily_note()?))));
        registry.register("heading", |ctx| Ok(Box::new(HeadingCondition::new(ctx.daily_note()?))));
        registry.register("regex", |ctx| Ok(Box::new(RegexCondition::new(ctx.daily_note()?))));
        registry.register("linked_wordcount", |ctx| {
            Ok(Box::new(LinkedWordcountCondition::new(ctx.daily_note()?, ctx.vault()?)?))
        });
        registry
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&ConditionContext) -> Result<Box<dyn Condition>, ConditionError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Box::new(factory));
    }

    pub fn create(&self, kind: &str, context: &ConditionContext) -> Result<Box<dyn Condition>, ConditionError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| ConditionError::UnknownType(kind.to_string()))?;
        factory(context)
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::conditions::ConditionConfig;

    struct Always(bool);

    impl Condition for Always {
        fn check(&self, _config: &ConditionConfig) -> Result<(bool, String), ConditionError> {
            Ok((self.0, "always".into()))
        }
    }

    fn context() -> ConditionContext {
        ConditionContext::new(None, "Daily/{date}.md", Zone::Local, Arc::new(SystemClock))
    }

    #[test]
    fn builtins_are_registered() {
        let registry = ConditionRegistry::with_builtins();
        assert_eq!(
            registry.types(),
            vec!["checkbox", "heading", "linked_wordcount", "regex", "yaml"]
        );
        assert!(registry.is_registered("checkbox"));
        assert!(!registry.is_registered("strava"));
    }

    #[test]
    fn custom_factory_is_used() {
        let mut registry = ConditionRegistry::new();
        registry.register("always", |_| Ok(Box::new(Always(true))));
        let condition = registry.create("always", &context()).unwrap();
        let (met, _) = condition.check(&ConditionConfig::new("always")).unwrap();
        assert!(met);
    }

    #[test]
    fn note_conditions_need_a_vault() {
        let registry = ConditionRegistry::with_builtins();
        let err = registry.create("checkbox", &context()).err().unwrap();
        assert!(matches!(err, ConditionError::Misconfigured(_)));
    }
}
