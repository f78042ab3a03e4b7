//! Core data types
//!
//! This module defines the session model decoded from keystroke logs and the
//! statistic vocabulary shared by the grapheme builder and the aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of each fixed string field in the user header
pub const USER_FIELD_WIDTH: usize = 64;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Participant metadata stored at the head of every log file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub user: String,
    pub email: String,
    pub major: String,
    /// Requested typing duration per session, in seconds
    pub typing_duration_seconds: i16,
}

/// A single key press/release pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystrokeEvent {
    /// Raw key byte as captured by the recorder
    pub key: u8,
    pub press_sec: i64,
    pub press_nanos: i64,
    pub release_sec: i64,
    pub release_nanos: i64,
}

impl KeystrokeEvent {
    pub fn new(key: u8, press: (i64, i64), release: (i64, i64)) -> Self {
        Self {
            key,
            press_sec: press.0,
            press_nanos: press.1,
            release_sec: release.0,
            release_nanos: release.1,
        }
    }

    /// Key as a character (bytes map onto U+0000..U+00FF)
    pub fn key_char(&self) -> char {
        char::from(self.key)
    }

    /// Press timestamp as total nanoseconds since the epoch
    pub fn press_nanos_total(&self) -> i128 {
        self.press_sec as i128 * NANOS_PER_SEC + self.press_nanos as i128
    }

    /// Release timestamp as total nanoseconds since the epoch
    pub fn release_nanos_total(&self) -> i128 {
        self.release_sec as i128 * NANOS_PER_SEC + self.release_nanos as i128
    }

    /// Press timestamp, if representable
    pub fn pressed_at(&self) -> Option<DateTime<Utc>> {
        to_datetime(self.press_sec, self.press_nanos)
    }

    /// Release timestamp, if representable
    pub fn released_at(&self) -> Option<DateTime<Utc>> {
        to_datetime(self.release_sec, self.release_nanos)
    }
}

fn to_datetime(sec: i64, nanos: i64) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(nanos).ok()?;
    DateTime::from_timestamp(sec, nanos)
}

/// One typing session: ordered keystrokes plus their timing arrays
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub keystrokes: Vec<KeystrokeEvent>,
    /// Press-to-press gaps between consecutive keys
    pub time_deltas: Vec<u64>,
    /// Press-to-release duration of each key
    pub dwell_times: Vec<u64>,
    /// Release-to-press gaps between consecutive keys
    pub flight_times: Vec<u64>,
}

impl Session {
    /// Concatenated key characters
    pub fn text(&self) -> String {
        self.keystrokes.iter().map(KeystrokeEvent::key_char).collect()
    }

    /// Timing array for a statistic
    pub fn statistic(&self, kind: StatisticKind) -> &[u64] {
        match kind {
            StatisticKind::TimeDelta => &self.time_deltas,
            StatisticKind::DwellTime => &self.dwell_times,
            StatisticKind::FlightTime => &self.flight_times,
        }
    }

    /// First press to last release
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.keystrokes.first()?.pressed_at()?;
        let last = self.keystrokes.last()?.released_at()?;
        Some((first, last))
    }
}

/// Timing statistics carried per session and per grapheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticKind {
    TimeDelta,
    DwellTime,
    FlightTime,
}

impl StatisticKind {
    pub const ALL: [StatisticKind; 3] = [
        StatisticKind::TimeDelta,
        StatisticKind::DwellTime,
        StatisticKind::FlightTime,
    ];

    /// Column suffix used in composite keys (`"th+dwell_time"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticKind::TimeDelta => "time_delta",
            StatisticKind::DwellTime => "dwell_time",
            StatisticKind::FlightTime => "flight_time",
        }
    }

    /// Whether the statistic measures a gap between two keys
    pub fn is_gap(&self) -> bool {
        !matches!(self, StatisticKind::DwellTime)
    }
}

impl fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_total_combines_seconds() {
        let event = KeystrokeEvent::new(b'a', (2, 500), (3, 0));
        assert_eq!(event.press_nanos_total(), 2_000_000_500);
        assert_eq!(event.release_nanos_total(), 3_000_000_000);
    }

    #[test]
    fn test_pressed_at_rejects_negative_nanos() {
        let event = KeystrokeEvent::new(b'a', (0, -1), (0, 0));
        assert!(event.pressed_at().is_none());
        assert!(event.released_at().is_some());
    }

    #[test]
    fn test_session_text_and_span() {
        let session = Session {
            keystrokes: vec![
                KeystrokeEvent::new(b'h', (10, 0), (10, 100)),
                KeystrokeEvent::new(b'i', (11, 0), (12, 0)),
            ],
            ..Default::default()
        };
        assert_eq!(session.text(), "hi");
        let (start, end) = session.time_span().unwrap();
        assert_eq!((end - start).num_seconds(), 2);
    }

    #[test]
    fn test_statistic_names() {
        let names: Vec<_> = StatisticKind::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["time_delta", "dwell_time", "flight_time"]);
        assert!(StatisticKind::FlightTime.is_gap());
        assert!(!StatisticKind::DwellTime.is_gap());
    }
}
