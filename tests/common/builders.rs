//! Test data builders for creating test objects

use lasecplot::{ManualClock, RuntimeSettings, Session};

/// Arrival time used by default, in milliseconds
pub const START_MS: f64 = 1_000_000.0;

/// Builder for sessions driven by a manual clock
pub struct SessionBuilder {
    start_ms: f64,
    view_duration: String,
    paused: bool,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            start_ms: START_MS,
            view_duration: "0".to_string(),
            paused: false,
        }
    }

    pub fn start_ms(mut self, start_ms: f64) -> Self {
        self.start_ms = start_ms;
        self
    }

    pub fn view_duration(mut self, text: &str) -> Self {
        self.view_duration = text.to_string();
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// The session and a handle on its clock
    pub fn build(self) -> (Session<ManualClock>, ManualClock) {
        let clock = ManualClock::new(self.start_ms);
        let settings = RuntimeSettings {
            paused: self.paused,
            view_duration: self.view_duration,
        };
        (Session::with_clock(clock.clone()).with_settings(settings), clock)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A timestamped numeric batch line, `key:t0:v0;t1:v1;...`
pub fn batch_line(key: &str, points: &[(f64, f64)]) -> String {
    let items: Vec<String> = points
        .iter()
        .map(|(ms, value)| format!("{}:{}", ms, value))
        .collect();
    format!("{}:{}", key, items.join(";"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_builder() {
        let (session, _clock) = SessionBuilder::new().view_duration("2").paused(true).build();
        assert!(session.is_paused());
        assert_eq!(session.view_window(), Some(2.0));
    }

    #[test]
    fn test_batch_line() {
        assert_eq!(batch_line("k", &[(1000.0, 1.5), (2000.0, 2.0)]), "k:1000:1.5;2000:2");
    }
}
