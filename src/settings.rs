use crate::config::PlannerConfig;
use crate::schedule::SleepWindow;
use crate::storage::KeyValueStore;
use anyhow::Result;

pub const SLEEP_START_KEY: &str = "sleepStart";
pub const SLEEP_END_KEY: &str = "sleepEnd";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("not a time (use HH:MM): {0:?}")]
    InvalidTime(String),
    #[error("hour out of range (0-23): {0}")]
    HourOutOfRange(u32),
    #[error("minute out of range (0-59): {0}")]
    MinuteOutOfRange(u32),
}

/// Hour component of an `HH[:MM]` string. Minutes are checked but not used.
pub fn parse_hour(input: &str) -> Result<u32, SettingsError> {
    let trimmed = input.trim();
    let invalid = || SettingsError::InvalidTime(trimmed.to_string());
    let (hour_part, minute_part) = match trimmed.split_once(':') {
        Some((h, m)) => (h, Some(m)),
        None => (trimmed, None),
    };
    let hour = parse_digits(hour_part).ok_or_else(invalid)?;
    if hour > 23 {
        return Err(SettingsError::HourOutOfRange(hour));
    }
    if let Some(m) = minute_part {
        let minute = parse_digits(m).ok_or_else(invalid)?;
        if minute > 59 {
            return Err(SettingsError::MinuteOutOfRange(minute));
        }
    }
    Ok(hour)
}

fn parse_digits(text: &str) -> Option<u32> {
    if text.is_empty() || text.len() > 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Raw sleep settings as the user typed them, used to prefill the settings form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepSettings {
    pub start: String,
    pub end: String,
}

impl SleepSettings {
    pub fn load(store: &impl KeyValueStore, config: &PlannerConfig) -> Self {
        SleepSettings {
            start: non_empty(store.get(SLEEP_START_KEY))
                .unwrap_or_else(|| config.default_sleep_start.clone()),
            end: non_empty(store.get(SLEEP_END_KEY))
                .unwrap_or_else(|| config.default_sleep_end.clone()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl SleepWindow {
    /// Current window from the store. Never fails: anything unreadable falls back
    /// to the configured default window.
    pub fn load(store: &impl KeyValueStore, config: &PlannerConfig) -> Self {
        let raw = SleepSettings::load(store, config);
        match (parse_hour(&raw.start), parse_hour(&raw.end)) {
            (Ok(start), Ok(end)) => SleepWindow::new(start, end),
            (start, end) => {
                tracing::warn!(
                    start = %raw.start,
                    end = %raw.end,
                    start_ok = start.is_ok(),
                    end_ok = end.is_ok(),
                    "stored sleep window is malformed, using defaults"
                );
                SleepWindow::default_for(config)
            }
        }
    }

    pub fn default_for(config: &PlannerConfig) -> Self {
        SleepWindow::new(
            parse_hour(&config.default_sleep_start).unwrap_or(2),
            parse_hour(&config.default_sleep_end).unwrap_or(10),
        )
    }
}

/// Validates both values first; nothing is written if either is rejected.
pub fn save_sleep_settings(
    store: &mut impl KeyValueStore,
    start: &str,
    end: &str,
) -> Result<SleepWindow> {
    let start_hour = parse_hour(start)?;
    let end_hour = parse_hour(end)?;
    store.set(SLEEP_START_KEY, start.trim().to_string())?;
    store.set(SLEEP_END_KEY, end.trim().to_string())?;
    tracing::info!(start = start.trim(), end = end.trim(), "saved sleep window");
    Ok(SleepWindow::new(start_hour, end_hour))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn parses_hour_forms() {
        assert_eq!(parse_hour("02:00"), Ok(2));
        assert_eq!(parse_hour(" 7:30 "), Ok(7));
        assert_eq!(parse_hour("23"), Ok(23));
        assert_eq!(parse_hour("0:5"), Ok(0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_hour(""), Err(SettingsError::InvalidTime(_))));
        assert!(matches!(parse_hour("ab:00"), Err(SettingsError::InvalidTime(_))));
        assert!(matches!(parse_hour("-1:00"), Err(SettingsError::InvalidTime(_))));
        assert!(matches!(parse_hour("10:"), Err(SettingsError::InvalidTime(_))));
        assert_eq!(parse_hour("24:00"), Err(SettingsError::HourOutOfRange(24)));
        assert_eq!(parse_hour("12:75"), Err(SettingsError::MinuteOutOfRange(75)));
    }

    #[test]
    fn missing_settings_use_default_window() {
        let store = MemoryStore::default();
        let config = PlannerConfig::default();
        assert_eq!(SleepWindow::load(&store, &config), SleepWindow::new(2, 10));
        let raw = SleepSettings::load(&store, &config);
        assert_eq!(raw.start, "02:00");
        assert_eq!(raw.end, "10:00");
    }

    #[test]
    fn malformed_settings_fall_back_to_default_window() {
        let mut store = MemoryStore::default();
        store.set(SLEEP_START_KEY, "23:00".into()).unwrap();
        store.set(SLEEP_END_KEY, "soon".into()).unwrap();
        let config = PlannerConfig::default();
        assert_eq!(SleepWindow::load(&store, &config), SleepWindow::new(2, 10));
    }

    #[test]
    fn saved_settings_are_read_back() {
        let mut store = MemoryStore::default();
        let config = PlannerConfig::default();
        let window = save_sleep_settings(&mut store, "22:30", " 06:00").unwrap();
        assert_eq!(window, SleepWindow::new(22, 6));
        assert_eq!(SleepWindow::load(&store, &config), window);
        assert_eq!(store.get(SLEEP_END_KEY).as_deref(), Some("06:00"));
    }

    #[test]
    fn invalid_save_writes_nothing() {
        let mut store = MemoryStore::default();
        assert!(save_sleep_settings(&mut store, "01:00", "25:00").is_err());
        assert_eq!(store.get(SLEEP_START_KEY), None);
        assert_eq!(store.get(SLEEP_END_KEY), None);
    }
}
