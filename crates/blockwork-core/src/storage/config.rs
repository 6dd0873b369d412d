//! TOML-based application configuration.
//!
//! Stores:
//! - The blocked site list
//! - Conditions that earn a proof-of-work unlock
//! - Auto-unlock gate and check interval
//! - Unlock durations and emergency escalation
//! - Remote enforcement, remote state and phone request queue hosts
//!
//! Configuration is stored at `~/.config/blockwork/config.toml` unless
//! `BLOCKWORK_CONFIG` points elsewhere.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::conditions::{ConditionConfig, ConditionMode};
use crate::error::ConfigError;

/// Auto-unlock configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoUnlockSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Earliest local time of day (HH:MM) the daemon may unlock.
    #[serde(default = "default_earliest_time")]
    pub earliest_time: String,
    /// Seconds between daemon ticks.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
}

/// Unlock durations and emergency escalation, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnlockSettings {
    #[serde(default = "default_proof_of_work_duration")]
    pub proof_of_work_duration: u64,
    #[serde(default = "default_emergency_duration")]
    pub emergency_duration: u64,
    #[serde(default = "default_emergency_max_per_day")]
    pub emergency_max_per_day: u32,
    #[serde(default = "default_emergency_initial_wait")]
    pub emergency_initial_wait: u64,
    #[serde(default = "default_emergency_wait_multiplier")]
    pub emergency_wait_multiplier: u32,
}

/// Retry policy for every remote operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Seconds before the first retry.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: u32,
    /// Upper bound for one ssh invocation, in seconds.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout: u64,
}

/// Remote dnsmasq host that receives the blocklist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteSyncSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default = "default_blocklist_path")]
    pub blocklist_path: String,
    #[serde(default = "default_restart_command")]
    pub restart_command: String,
}

/// State file kept on a remote host instead of locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteStateSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Falls back to `remote_sync.host` when empty.
    #[serde(default)]
    pub host: String,
    /// Falls back to `remote_sync.user` when empty.
    #[serde(default)]
    pub user: String,
    #[serde(default = "default_remote_state_path")]
    pub state_path: String,
    #[serde(default = "default_lock_path")]
    pub lock_path: String,
    /// Defaults to true for paths under /etc or /var.
    #[serde(default)]
    pub use_sudo: Option<bool>,
}

/// Phone-facing request queue host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhoneApiSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default = "default_phone_data_dir")]
    pub data_dir: String,
}

/// Where daily notes live for note-based conditions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotesSettings {
    #[serde(default)]
    pub vault_path: Option<PathBuf>,
    #[serde(default = "default_daily_note_pattern")]
    pub daily_note_pattern: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/blockwork/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_blocked_sites")]
    pub blocked_sites: Vec<String>,
    /// IANA zone for the day key and time gate; local zone when unset.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Local state file; `<data dir>/state.json` when unset.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    /// Local blocklist artifact, used when remote sync is disabled.
    #[serde(default)]
    pub blocklist_file: Option<PathBuf>,
    #[serde(default)]
    pub condition_mode: ConditionMode,
    #[serde(default = "default_conditions")]
    pub conditions: BTreeMap<String, ConditionConfig>,
    #[serde(default)]
    pub notes: NotesSettings,
    #[serde(default)]
    pub auto_unlock: AutoUnlockSettings,
    #[serde(default)]
    pub unlock: UnlockSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub remote_sync: RemoteSyncSettings,
    #[serde(default)]
    pub remote_state: RemoteStateSettings,
    #[serde(default)]
    pub phone_api: PhoneApiSettings,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_earliest_time() -> String {
    "17:00".into()
}
fn default_check_interval() -> u64 {
    300
}
fn default_proof_of_work_duration() -> u64 {
    7200
}
fn default_emergency_duration() -> u64 {
    300
}
fn default_emergency_max_per_day() -> u32 {
    3
}
fn default_emergency_initial_wait() -> u64 {
    30
}
fn default_emergency_wait_multiplier() -> u32 {
    2
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    2
}
fn default_backoff_multiplier() -> u32 {
    2
}
fn default_attempt_timeout() -> u64 {
    30
}
fn default_blocklist_path() -> String {
    "/etc/dnsmasq.d/blocklist.conf".into()
}
fn default_restart_command() -> String {
    "sudo systemctl restart dnsmasq".into()
}
fn default_remote_state_path() -> String {
    "/etc/blockwork/state.json".into()
}
fn default_lock_path() -> String {
    "/tmp/blockwork_state.lock".into()
}
fn default_phone_data_dir() -> String {
    "/var/lib/blockwork".into()
}
fn default_daily_note_pattern() -> String {
    "Daily/{date}.md".into()
}
fn default_blocked_sites() -> Vec<String> {
    [
        "twitter.com",
        "x.com",
        "facebook.com",
        "instagram.com",
        "reddit.com",
        "youtube.com",
        "tiktok.com",
        "news.ycombinator.com",
        "threads.net",
        "linkedin.com",
        "twitch.tv",
        "netflix.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_conditions() -> BTreeMap<String, ConditionConfig> {
    let mut conditions = BTreeMap::new();
    conditions.insert(
        "workout".to_string(),
        ConditionConfig::new("checkbox").with_param("pattern", "- [x] Workout"),
    );
    conditions.insert(
        "writing".to_string(),
        ConditionConfig::new("linked_wordcount")
            .with_param("section", "Writing")
            .with_param("section_any_level", true)
            .with_param("minimum", 500),
    );
    conditions
}

impl Default for AutoUnlockSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            earliest_time: default_earliest_time(),
            check_interval: default_check_interval(),
        }
    }
}

impl AutoUnlockSettings {
    /// Parse `earliest_time` as `HH:MM`.
    pub fn earliest(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.earliest_time.trim(), "%H:%M").map_err(|e| {
            ConfigError::InvalidValue {
                key: "auto_unlock.earliest_time".into(),
                message: format!("'{}': {e}", self.earliest_time),
            }
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval.max(1))
    }
}

impl Default for UnlockSettings {
    fn default() -> Self {
        Self {
            proof_of_work_duration: default_proof_of_work_duration(),
            emergency_duration: default_emergency_duration(),
            emergency_max_per_day: default_emergency_max_per_day(),
            emergency_initial_wait: default_emergency_initial_wait(),
            emergency_wait_multiplier: default_emergency_wait_multiplier(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            multiplier: default_backoff_multiplier(),
            attempt_timeout: default_attempt_timeout(),
        }
    }
}

impl Default for RemoteSyncSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            user: String::new(),
            blocklist_path: default_blocklist_path(),
            restart_command: default_restart_command(),
        }
    }
}

impl RemoteSyncSettings {
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.host.is_empty() && !self.user.is_empty()
    }
}

impl Default for RemoteStateSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            user: String::new(),
            state_path: default_remote_state_path(),
            lock_path: default_lock_path(),
            use_sudo: None,
        }
    }
}

impl RemoteStateSettings {
    /// Host and user, falling back to the enforcement host's.
    pub fn endpoint(&self, fallback: &RemoteSyncSettings) -> Option<(String, String)> {
        let host = if self.host.is_empty() { &fallback.host } else { &self.host };
        let user = if self.user.is_empty() { &fallback.user } else { &self.user };
        if !self.enabled || host.is_empty() || user.is_empty() || self.state_path.is_empty() {
            return None;
        }
        Some((host.clone(), user.clone()))
    }

    pub fn sudo(&self) -> bool {
        self.use_sudo
            .unwrap_or_else(|| self.state_path.starts_with("/etc/") || self.state_path.starts_with("/var/"))
    }
}

impl Default for PhoneApiSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            user: String::new(),
            data_dir: default_phone_data_dir(),
        }
    }
}

impl PhoneApiSettings {
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.host.is_empty() && !self.user.is_empty()
    }
}

impl Default for NotesSettings {
    fn default() -> Self {
        Self {
            vault_path: None,
            daily_note_pattern: default_daily_note_pattern(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blocked_sites: default_blocked_sites(),
            timezone: None,
            state_path: None,
            blocklist_file: None,
            condition_mode: ConditionMode::default(),
            conditions: default_conditions(),
            notes: NotesSettings::default(),
            auto_unlock: AutoUnlockSettings::default(),
            unlock: UnlockSettings::default(),
            retry: RetrySettings::default(),
            remote_sync: RemoteSyncSettings::default(),
            remote_state: RemoteStateSettings::default(),
            phone_api: PhoneApiSettings::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Config file location: `BLOCKWORK_CONFIG`, else the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var("BLOCKWORK_CONFIG") {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Parse TOML text, filling omitted keys with defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let cfg: Config =
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let fail = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| fail(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| fail(e.to_string()))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::clock::Zone::parse(self.timezone.as_deref())?;
        if self.unlock.emergency_wait_multiplier == 0 {
            return Err(ConfigError::InvalidValue {
                key: "unlock.emergency_wait_multiplier".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.max_attempts".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. Returns error if key is unknown
    /// or the result does not validate.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Add a site to the blocklist. Returns false if it was already present.
    pub fn add_blocked_site(&mut self, site: &str) -> Result<bool, ConfigError> {
        let site = normalize_site(site)?;
        if self.blocked_sites.iter().any(|s| s == &site) {
            return Ok(false);
        }
        self.blocked_sites.push(site);
        Ok(true)
    }

    /// Remove a site from the blocklist. Returns false if it was not present.
    ///
    /// Input is normalized like [`Config::add_blocked_site`]; entries that do
    /// not normalize are matched as typed.
    pub fn remove_blocked_site(&mut self, site: &str) -> bool {
        let site = normalize_site(site).unwrap_or_else(|_| site.trim().to_ascii_lowercase());
        let before = self.blocked_sites.len();
        self.blocked_sites.retain(|s| s != &site);
        self.blocked_sites.len() != before
    }

    /// Local state file location.
    pub fn local_state_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.state_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("state.json")),
        }
    }
}

/// Lowercase a domain and strip scheme, path and a trailing dot.
fn normalize_site(site: &str) -> Result<String, ConfigError> {
    let trimmed = site.trim().to_ascii_lowercase();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(&trimmed);
    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .trim_end_matches('.');
    let valid = !host.is_empty()
        && host.contains('.')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if !valid {
        return Err(ConfigError::InvalidValue {
            key: "blocked_sites".into(),
            message: format!("'{site}' is not a domain name"),
        });
    }
    Ok(host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed = Config::parse(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg = Config::parse(
            r#"
            blocked_sites = ["example.com"]
            timezone = "America/New_York"

            [unlock]
            emergency_max_per_day = 5

            [conditions.reading]
            type = "checkbox"
            pattern = "- [x] Read"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.blocked_sites, vec!["example.com"]);
        assert_eq!(cfg.unlock.emergency_max_per_day, 5);
        assert_eq!(cfg.unlock.emergency_initial_wait, 30);
        assert_eq!(cfg.auto_unlock.check_interval, 300);
        let reading = &cfg.conditions["reading"];
        assert_eq!(reading.kind, "checkbox");
        assert_eq!(reading.str_param("pattern"), Some("- [x] Read"));
    }

    #[test]
    fn parse_rejects_bad_timezone() {
        let err = Config::parse("timezone = \"Nowhere/Special\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("auto_unlock.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("unlock.emergency_initial_wait").as_deref(), Some("30"));
        assert_eq!(cfg.get("auto_unlock.earliest_time").as_deref(), Some("17:00"));
        assert!(cfg.get("unlock.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("auto_unlock.enabled", "false").unwrap();
        cfg.set("unlock.proof_of_work_duration", "3600").unwrap();
        cfg.set("auto_unlock.earliest_time", "18:30").unwrap();
        assert!(!cfg.auto_unlock.enabled);
        assert_eq!(cfg.unlock.proof_of_work_duration, 3600);
        assert_eq!(
            cfg.auto_unlock.earliest().unwrap(),
            NaiveTime::from_hms_opt(18, 30, 0).unwrap()
        );
    }

    #[test]
    fn set_optional_timezone() {
        let mut cfg = Config::default();
        cfg.set("timezone", "Europe/Berlin").unwrap();
        assert_eq!(cfg.timezone.as_deref(), Some("Europe/Berlin"));
        assert!(cfg.set("timezone", "Not/AZone").is_err());
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("unlock.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set("auto_unlock.enabled", "not_a_bool"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.set("unlock.emergency_wait_multiplier", "0").is_err());
        assert_eq!(cfg.unlock.emergency_wait_multiplier, 2);
    }

    #[test]
    fn earliest_rejects_garbage() {
        let settings = AutoUnlockSettings {
            earliest_time: "5pm".into(),
            ..AutoUnlockSettings::default()
        };
        assert!(settings.earliest().is_err());
    }

    #[test]
    fn add_and_remove_sites() {
        let mut cfg = Config {
            blocked_sites: vec![],
            ..Config::default()
        };
        assert!(cfg.add_blocked_site("https://Example.com/feed").unwrap());
        assert!(!cfg.add_blocked_site("example.com").unwrap());
        assert_eq!(cfg.blocked_sites, vec!["example.com"]);
        assert!(cfg.add_blocked_site("not a site").is_err());
        assert!(cfg.remove_blocked_site("EXAMPLE.com"));
        assert!(!cfg.remove_blocked_site("example.com"));
        assert!(cfg.blocked_sites.is_empty());
    }

    #[test]
    fn remove_accepts_the_same_forms_as_add() {
        let mut cfg = Config {
            blocked_sites: vec!["legacy_entry".into()],
            ..Config::default()
        };
        assert!(cfg.add_blocked_site("https://Example.com/").unwrap());
        assert!(cfg.remove_blocked_site("https://Example.com/"));
        assert!(cfg.remove_blocked_site("Legacy_Entry"));
        assert!(cfg.blocked_sites.is_empty());
    }

    #[test]
    fn local_state_path_prefers_the_configured_file() {
        let cfg = Config {
            state_path: Some(PathBuf::from("/srv/blockwork/state.json")),
            ..Config::default()
        };
        assert_eq!(cfg.local_state_path().unwrap(), PathBuf::from("/srv/blockwork/state.json"));
    }

    #[test]
    fn remote_state_falls_back_to_sync_host() {
        let sync = RemoteSyncSettings {
            enabled: true,
            host: "dns.lan".into(),
            user: "admin".into(),
            ..RemoteSyncSettings::default()
        };
        let state = RemoteStateSettings {
            enabled: true,
            ..RemoteStateSettings::default()
        };
        assert_eq!(
            state.endpoint(&sync),
            Some(("dns.lan".to_string(), "admin".to_string()))
        );
        assert!(state.sudo());

        let disabled = RemoteStateSettings::default();
        assert_eq!(disabled.endpoint(&sync), None);
    }

    #[test]
    fn save_and_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let created = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, Config::default());

        let mut cfg = created;
        cfg.blocked_sites = vec!["example.org".into()];
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().blocked_sites, vec!["example.org"]);
    }
}
