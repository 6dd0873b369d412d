//! Local JSON state file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{resolve, DailyState, DayDefaults, StateStore};
use crate::clock::{Clock, Zone};
use crate::error::StateError;

/// State kept in a local JSON file.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a concurrent reader sees either the old or the new
/// document and never a partial one.
pub struct LocalStateStore {
    path: PathBuf,
    zone: Zone,
    clock: Arc<dyn Clock>,
    defaults: DayDefaults,
}

impl LocalStateStore {
    pub fn new(path: impl Into<PathBuf>, zone: Zone, clock: Arc<dyn Clock>, defaults: DayDefaults) -> Self {
        Self {
            path: path.into(),
            zone,
            clock,
            defaults,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_raw(&self) -> Result<Option<String>, StateError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

impl StateStore for LocalStateStore {
    fn load(&self) -> Result<DailyState, StateError> {
        let raw = self.read_raw()?;
        let today = self.zone.date_of(self.clock.now());
        let source = self.path.display().to_string();
        let (state, resolution) = resolve(
            raw.as_deref(),
            today,
            &self.zone.label(),
            &self.defaults,
            &source,
        );
        if resolution.needs_save() {
            self.save(&state)?;
        }
        Ok(state)
    }

    fn save(&self, state: &DailyState) -> Result<(), StateError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let json = serde_json::to_string_pretty(state)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("local:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn store_at(dir: &Path, clock: Arc<ManualClock>) -> LocalStateStore {
        LocalStateStore::new(
            dir.join("state.json"),
            Zone::parse(Some("UTC")).unwrap(),
            clock,
            DayDefaults::default(),
        )
    }

    #[test]
    fn first_load_writes_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()));
        let store = store_at(dir.path(), clock);

        let state = store.load().unwrap();
        assert!(state.blocked);
        assert_eq!(state.date, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert!(dir.path().join("state.json").exists());
    }

    #[test]
    fn save_then_load_same_day_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()));
        let store = store_at(dir.path(), Arc::clone(&clock));

        let mut state = store.load().unwrap();
        state.emergency_count = 2;
        state.emergency_next_wait = 120;
        store.save(&state).unwrap();

        clock.advance(chrono::Duration::hours(5));
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn load_rolls_over_at_midnight() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 23, 59, 0).unwrap()));
        let store = store_at(dir.path(), Arc::clone(&clock));

        let mut state = store.load().unwrap();
        state.unlocked_via_conditions_today = true;
        store.save(&state).unwrap();

        clock.advance(chrono::Duration::minutes(2));
        let next = store.load().unwrap();
        assert_eq!(next.date, NaiveDate::from_ymd_opt(2026, 2, 2).unwrap());
        assert!(!next.unlocked_via_conditions_today);

        let on_disk: DailyState =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk, next);
    }

    #[test]
    fn corrupt_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("state.json"), "}}garbage").unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()));
        let store = store_at(dir.path(), clock);

        let state = store.load().unwrap();
        assert!(state.blocked);
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(serde_json::from_str::<DailyState>(&raw).is_ok());
    }
}
