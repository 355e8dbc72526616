//! Runtime settings that can be modified while a session runs
//!
//! These are separate from the persistent configuration: the pause flag and
//! the view window are changed by the user during a session.

use serde::{Deserialize, Serialize};

use crate::types::parse_leading_f64;

/// Runtime settings for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// While set, incoming payloads are discarded and logs stay queued
    pub paused: bool,

    /// View window in seconds, as typed by the user
    pub view_duration: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            paused: false,
            view_duration: "15".to_string(),
        }
    }
}

impl RuntimeSettings {
    /// Create new runtime settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings with a numeric view window
    pub fn with_view_duration(mut self, seconds: f64) -> Self {
        self.view_duration = seconds.to_string();
        self
    }

    /// Toggle pause state
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Effective view window in seconds.
    ///
    /// `None` when the text does not parse to a positive number, which
    /// disables eviction.
    pub fn view_window(&self) -> Option<f64> {
        let seconds = parse_leading_f64(&self.view_duration);
        (seconds > 0.0).then_some(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_settings_default() {
        let settings = RuntimeSettings::default();
        assert!(!settings.paused);
        assert_eq!(settings.view_window(), Some(15.0));
    }

    #[test]
    fn test_view_window_parsing() {
        let mut settings = RuntimeSettings::new();
        settings.view_duration = "2.5s".to_string();
        assert_eq!(settings.view_window(), Some(2.5));

        settings.view_duration = "0".to_string();
        assert_eq!(settings.view_window(), None);

        settings.view_duration = "-3".to_string();
        assert_eq!(settings.view_window(), None);

        settings.view_duration = "forever".to_string();
        assert_eq!(settings.view_window(), None);
    }

    #[test]
    fn test_toggle_pause() {
        let mut settings = RuntimeSettings::new();
        settings.toggle_pause();
        assert!(settings.paused);
        settings.toggle_pause();
        assert!(!settings.paused);
    }

    #[test]
    fn test_with_view_duration() {
        let settings = RuntimeSettings::new().with_view_duration(0.0);
        assert_eq!(settings.view_window(), None);
    }
}
