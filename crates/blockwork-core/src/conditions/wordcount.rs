//! Word count across notes wiki-linked from a section of today's note.
//!
//! Config: `section` (default `Writing`), `section_any_level` (default true),
//! `minimum` (default 500). Each `[[link]]` under the section resolves to
//! `<vault>/<link>.md`, or else to the first file of that name anywhere in
//! the vault. Unresolvable links are skipped; unreadable files count as zero.

use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use walkdir::WalkDir;

use super::notes::{build_regex, DailyNote};
use super::{Condition, ConditionConfig};
use crate::error::ConditionError;

const DEFAULT_SECTION: &str = "Writing";
const DEFAULT_MINIMUM: u64 = 500;

fn compile(pattern: &str) -> Result<Regex, ConditionError> {
    Regex::new(pattern).map_err(|e| ConditionError::Misconfigured(format!("invalid pattern '{pattern}': {e}")))
}

/// Counts prose words in markdown, ignoring markup.
pub struct WordCounter {
    code_block: Regex,
    inline_code: Regex,
    wiki_link: Regex,
    image: Regex,
    md_link: Regex,
    heading: Regex,
    bold: Regex,
    italic: Regex,
    bold_underscore: Regex,
    italic_underscore: Regex,
    bullet: Regex,
    html: Regex,
}

impl WordCounter {
    pub fn new() -> Result<Self, ConditionError> {
        Ok(Self {
            code_block: compile(r"(?s)```.*?```")?,
            inline_code: compile(r"`[^`]+`")?,
            wiki_link: compile(r"\[\[([^\]|]+)(?:\|([^\]]+))?\]\]")?,
            image: compile(r"!\[[^\]]*\]\([^)]+\)")?,
            md_link: compile(r"\[([^\]]+)\]\([^)]+\)")?,
            heading: compile(r"(?m)^#+\s*")?,
            bold: compile(r"\*\*([^*]+)\*\*")?,
            italic: compile(r"\*([^*]+)\*")?,
            bold_underscore: compile(r"__([^_]+)__")?,
            italic_underscore: compile(r"_([^_]+)_")?,
            bullet: compile(r"(?m)^[-*]\s*(\[[xX ]\])?\s*")?,
            html: compile(r"<[^>]+>")?,
        })
    }

    pub fn count(&self, text: &str) -> usize {
        let mut text = text;
        if let Some(rest) = text.strip_prefix("---") {
            if let Some(end) = rest.find("---") {
                text = &rest[end + 3..];
            }
        }
        let text = self.code_block.replace_all(text, "");
        let text = self.inline_code.replace_all(&text, "");
        let text = self.wiki_link.replace_all(&text, |caps: &Captures| {
            caps.get(2).or_else(|| caps.get(1)).map_or("", |m| m.as_str()).to_string()
        });
        let text = self.image.replace_all(&text, "");
        let text = self.md_link.replace_all(&text, "$1");
        let text = self.heading.replace_all(&text, "");
        let text = self.bold.replace_all(&text, "$1");
        let text = self.italic.replace_all(&text, "$1");
        let text = self.bold_underscore.replace_all(&text, "$1");
        let text = self.italic_underscore.replace_all(&text, "$1");
        let text = self.bullet.replace_all(&text, "");
        let text = self.html.replace_all(&text, "");
        text.split_whitespace().count()
    }

    /// Link targets (aliases dropped) in document order.
    pub fn links(&self, content: &str) -> Vec<String> {
        self.wiki_link
            .captures_iter(content)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .collect()
    }
}

/// Lines under `heading` up to the next heading of the same or a higher level.
pub fn section_content(content: &str, heading: &str, any_level: bool) -> Result<Option<String>, ConditionError> {
    let pattern = if any_level {
        format!(r"^(#+)\s*{}\s*$", regex::escape(heading))
    } else {
        let level = heading.chars().take_while(|c| *c == '#').count().max(1);
        let text = heading.trim_start_matches('#').trim();
        format!(r"^({})\s*{}\s*$", "#".repeat(level), regex::escape(text))
    };
    let re = build_regex(&pattern, true)?;
    let Some(caps) = re.captures(content) else {
        return Ok(None);
    };
    let level = caps.get(1).map_or(1, |m| m.as_str().len());
    let end = caps.get(0).map_or(0, |m| m.end());

    let mut lines = Vec::new();
    for line in content[end..].split('\n') {
        let hashes = line.chars().take_while(|c| *c == '#').count();
        let is_heading = hashes > 0 && line[hashes..].starts_with(char::is_whitespace);
        if is_heading && hashes <= level {
            break;
        }
        lines.push(line);
    }
    Ok(Some(lines.join("\n")))
}

/// Where `[[link]]` points inside `vault`, if the file exists.
pub fn resolve_link(vault: &Path, link: &str) -> Option<PathBuf> {
    let file = if link.ends_with(".md") {
        link.to_string()
    } else {
        format!("{link}.md")
    };
    let direct = vault.join(&file);
    if direct.is_file() {
        return Some(direct);
    }
    let name = Path::new(&file).file_name()?.to_os_string();
    WalkDir::new(vault)
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_file() && entry.file_name() == name.as_os_str())
        .map(|entry| entry.into_path())
}

/// Total words in files linked under a section must reach `minimum`.
pub struct LinkedWordcountCondition {
    note: DailyNote,
    vault: PathBuf,
    counter: WordCounter,
}

impl LinkedWordcountCondition {
    pub fn new(note: DailyNote, vault: impl Into<PathBuf>) -> Result<Self, ConditionError> {
        Ok(Self {
            note,
            vault: vault.into(),
            counter: WordCounter::new()?,
        })
    }

    /// `(link, words)` for every resolvable link under `section`.
    pub fn linked_counts(&self, section: &str, any_level: bool) -> Result<Vec<(String, usize)>, ConditionError> {
        let Some(content) = self.note.read()? else {
            return Ok(Vec::new());
        };
        let Some(body) = section_content(&content, section, any_level)? else {
            return Ok(Vec::new());
        };
        let counts = self
            .counter
            .links(&body)
            .into_iter()
            .filter_map(|link| {
                let path = resolve_link(&self.vault, &link)?;
                let words = match std::fs::read_to_string(&path) {
                    Ok(text) => self.counter.count(&text),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "linked note unreadable; counting zero words");
                        0
                    }
                };
                Some((link, words))
            })
            .collect();
        Ok(counts)
    }
}

impl Condition for LinkedWordcountCondition {
    fn check(&self, config: &ConditionConfig) -> Result<(bool, String), ConditionError> {
        let section = config.str_param("section").unwrap_or(DEFAULT_SECTION);
        let any_level = config.bool_param("section_any_level").unwrap_or(true);
        let minimum = match config.param("minimum") {
            None => DEFAULT_MINIMUM,
            Some(raw) => raw.as_u64().ok_or_else(|| {
                ConditionError::Misconfigured("'minimum' word count must be a non-negative integer".into())
            })?,
        };

        let counts = self.linked_counts(section, any_level)?;
        let total: u64 = counts.iter().map(|(_, words)| *words as u64).sum();
        let met = total >= minimum;
        let description = if counts.is_empty() {
            format!("No linked files found under '{section}' section")
        } else {
            let files: Vec<String> = counts.iter().map(|(name, words)| format!("{name}: {words}")).collect();
            format!("Word count: {total}/{minimum} ({})", files.join(", "))
        };
        Ok((met, description))
    }
}
