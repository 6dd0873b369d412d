//! Conditions evaluated against today's markdown daily note.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};

use super::{Condition, ConditionConfig};
use crate::error::ConditionError;

/// Today's daily note inside a notes vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyNote {
    path: PathBuf,
}

impl DailyNote {
    /// `pattern` is relative to the vault, with `{date}` replaced by `YYYY-MM-DD`.
    pub fn for_date(vault: &Path, pattern: &str, date: NaiveDate) -> Self {
        let relative = pattern.replace("{date}", &date.format("%Y-%m-%d").to_string());
        Self {
            path: vault.join(relative),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Note content, or `None` if today's note does not exist yet.
    pub fn read(&self) -> Result<Option<String>, ConditionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub(super) const NOTE_MISSING: &str = "Daily note not found";

pub(super) fn build_regex(pattern: &str, multi_line: bool) -> Result<Regex, ConditionError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(multi_line)
        .build()
        .map_err(|e| ConditionError::Misconfigured(format!("invalid pattern '{pattern}': {e}")))
}

/// A checked markdown checkbox, e.g. `- [x] Workout`.
///
/// Matches `-` or `*` bullets, `x` or `X`, and any trailing text after the label.
pub struct CheckboxCondition {
    note: DailyNote,
}

impl CheckboxCondition {
    pub fn new(note: DailyNote) -> Self {
        Self { note }
    }

    fn label(pattern: &str) -> &str {
        ["- [x] ", "- [X] ", "* [x] ", "* [X] "]
            .iter()
            .find_map(|prefix| pattern.strip_prefix(prefix))
            .unwrap_or(pattern)
    }

    pub fn is_checked(content: &str, pattern: &str) -> Result<bool, ConditionError> {
        let label = regex::escape(Self::label(pattern));
        let re = build_regex(&format!(r"[-*]\s*\[[xX]\]\s*{label}"), false)?;
        Ok(re.is_match(content))
    }
}

impl Condition for CheckboxCondition {
    fn check(&self, config: &ConditionConfig) -> Result<(bool, String), ConditionError> {
        let pattern = config.required_str("pattern")?;
        let Some(content) = self.note.read()? else {
            return Ok((false, NOTE_MISSING.into()));
        };
        let met = Self::is_checked(&content, pattern)?;
        let verdict = if met { "checked" } else { "not checked" };
        Ok((met, format!("Checkbox '{pattern}' {verdict}")))
    }
}

/// A heading with at least one non-empty line under it.
///
/// Config: `section` (heading text), `section_any_level` (default true). With
/// `section_any_level = false` the `#` count in `section` must match exactly.
pub struct HeadingCondition {
    note: DailyNote,
}

impl HeadingCondition {
    pub fn new(note: DailyNote) -> Self {
        Self { note }
    }

    pub fn has_content(content: &str, heading: &str, any_level: bool) -> Result<bool, ConditionError> {
        let pattern = if any_level {
            format!(r"^#+\s*{}\s*$", regex::escape(heading))
        } else {
            let level = heading.chars().take_while(|c| *c == '#').count().max(1);
            let text = heading.trim_start_matches('#').trim();
            format!(r"^{}\s*{}\s*$", "#".repeat(level), regex::escape(text))
        };
        let re = build_regex(&pattern, true)?;
        let Some(found) = re.find(content) else {
            return Ok(false);
        };
        for line in content[found.end()..].lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Ok(!line.starts_with('#'));
        }
        Ok(false)
    }
}

impl Condition for HeadingCondition {
    fn check(&self, config: &ConditionConfig) -> Result<(bool, String), ConditionError> {
        let heading = config.required_str("section")?;
        let any_level = config.bool_param("section_any_level").unwrap_or(true);
        let Some(content) = self.note.read()? else {
            return Ok((false, NOTE_MISSING.into()));
        };
        let met = Self::has_content(&content, heading, any_level)?;
        let verdict = if met { "has content" } else { "empty or missing" };
        Ok((met, format!("Heading '{heading}' {verdict}")))
    }
}

/// A case-insensitive, multi-line regex anywhere in the note.
pub struct RegexCondition {
    note: DailyNote,
}

impl RegexCondition {
    pub fn new(note: DailyNote) -> Self {
        Self { note }
    }
}

impl Condition for RegexCondition {
    fn check(&self, config: &ConditionConfig) -> Result<(bool, String), ConditionError> {
        let pattern = config.required_str("pattern")?;
        let re = build_regex(pattern, true)?;
        let Some(content) = self.note.read()? else {
            return Ok((false, NOTE_MISSING.into()));
        };
        let met = re.is_match(&content);
        let verdict = if met { "matched" } else { "not matched" };
        Ok((met, format!("Pattern '{pattern}' {verdict}")))
    }
}

/// The YAML mapping between leading `---` fences; empty when absent or unparsable.
pub fn front_matter(content: &str) -> serde_yaml::Mapping {
    let Some(rest) = content.strip_prefix("---") else {
        return serde_yaml::Mapping::new();
    };
    let Some(end) = rest.find("---") else {
        return serde_yaml::Mapping::new();
    };
    match serde_yaml::from_str(&rest[..end]) {
        Ok(serde_yaml::Value::Mapping(mapping)) => mapping,
        Ok(_) => serde_yaml::Mapping::new(),
        Err(e) => {
            tracing::debug!(error = %e, "front matter is not valid YAML");
            serde_yaml::Mapping::new()
        }
    }
}

/// A front-matter field in today's note.
///
/// Config: `field`, plus at most one of `minimum` (numeric lower bound) or
/// `value` (exact match). With neither, the field must be truthy.
pub struct YamlCondition {
    note: DailyNote,
}

impl YamlCondition {
    pub fn new(note: DailyNote) -> Self {
        Self { note }
    }

    fn as_number(value: &serde_yaml::Value) -> Option<f64> {
        match value {
            serde_yaml::Value::Number(n) => n.as_f64(),
            serde_yaml::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn truthy(value: &serde_yaml::Value) -> bool {
        match value {
            serde_yaml::Value::Null => false,
            serde_yaml::Value::Bool(b) => *b,
            serde_yaml::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            serde_yaml::Value::String(s) => !s.is_empty(),
            serde_yaml::Value::Sequence(items) => !items.is_empty(),
            serde_yaml::Value::Mapping(map) => !map.is_empty(),
            serde_yaml::Value::Tagged(tagged) => Self::truthy(&tagged.value),
        }
    }

    fn matches(value: &serde_yaml::Value, expected: &serde_json::Value) -> bool {
        if let (Some(found), Some(wanted)) = (Self::as_number(value), expected.as_f64()) {
            if !matches!(value, serde_yaml::Value::String(_)) {
                return found == wanted;
            }
        }
        serde_json::to_value(value).is_ok_and(|found| &found == expected)
    }

    pub fn field_met(
        content: &str,
        field: &str,
        expected: Option<&serde_json::Value>,
        minimum: Option<f64>,
    ) -> bool {
        let matter = front_matter(content);
        let Some(value) = matter.get(field) else {
            return false;
        };
        if let Some(minimum) = minimum {
            return Self::as_number(value).is_some_and(|n| n >= minimum);
        }
        match expected {
            Some(expected) => Self::matches(value, expected),
            None => Self::truthy(value),
        }
    }
}

impl Condition for YamlCondition {
    fn check(&self, config: &ConditionConfig) -> Result<(bool, String), ConditionError> {
        let field = config.required_str("field")?;
        let minimum = match config.param("minimum") {
            None => None,
            Some(raw) => Some(raw.as_f64().ok_or_else(|| {
                ConditionError::Misconfigured(format!("'minimum' for field '{field}' must be a number"))
            })?),
        };
        let Some(content) = self.note.read()? else {
            return Ok((false, NOTE_MISSING.into()));
        };
        let met = Self::field_met(&content, field, config.param("value"), minimum);
        let description = match minimum {
            Some(minimum) if met => format!("YAML field '{field}' >= {minimum}"),
            Some(minimum) => format!("YAML field '{field}' < {minimum}"),
            None if met => format!("YAML field '{field}' set"),
            None => format!("YAML field '{field}' not set"),
        };
        Ok((met, description))
    }
}
