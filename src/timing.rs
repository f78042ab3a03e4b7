//! Timing derivation from keystroke timestamps
//!
//! Recomputes the three per-session timing arrays the recorder stores next to
//! the keystrokes. All values are nanoseconds.
//!
//! - time delta: press(i+1) - press(i), `n - 1` entries
//! - dwell time: release(i) - press(i), `n` entries
//! - flight time: |press(i+1) - release(i)|, `n - 1` entries (overlapping
//!   keys give the magnitude of the overlap)

use crate::types::{KeystrokeEvent, Session};

/// Timing arrays derived from one keystroke sequence
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DerivedTimings {
    pub time_deltas: Vec<u64>,
    pub dwell_times: Vec<u64>,
    pub flight_times: Vec<u64>,
}

/// Derive all three timing arrays
pub fn derive_timings(keystrokes: &[KeystrokeEvent]) -> DerivedTimings {
    let time_deltas = keystrokes
        .windows(2)
        .map(|pair| non_negative(pair[1].press_nanos_total() - pair[0].press_nanos_total()))
        .collect();

    let dwell_times = keystrokes
        .iter()
        .map(|k| non_negative(k.release_nanos_total() - k.press_nanos_total()))
        .collect();

    let flight_times = keystrokes
        .windows(2)
        .map(|pair| magnitude(pair[1].press_nanos_total() - pair[0].release_nanos_total()))
        .collect();

    DerivedTimings {
        time_deltas,
        dwell_times,
        flight_times,
    }
}

impl Session {
    /// Replace the stored timing arrays with ones derived from the keystrokes
    pub fn with_derived_timings(mut self) -> Self {
        let derived = derive_timings(&self.keystrokes);
        self.time_deltas = derived.time_deltas;
        self.dwell_times = derived.dwell_times;
        self.flight_times = derived.flight_times;
        self
    }
}

// Out-of-order timestamps clamp to zero.
fn non_negative(nanos: i128) -> u64 {
    u64::try_from(nanos.max(0)).unwrap_or(u64::MAX)
}

fn magnitude(nanos: i128) -> u64 {
    u64::try_from(nanos.unsigned_abs()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_keystrokes() -> Vec<KeystrokeEvent> {
        vec![
            KeystrokeEvent::new(b'a', (0, 0), (0, 80_000_000)),
            KeystrokeEvent::new(b'b', (0, 150_000_000), (0, 230_000_000)),
            // pressed before 'b' is released
            KeystrokeEvent::new(b'c', (0, 200_000_000), (1, 0)),
        ]
    }

    #[test]
    fn test_derive_timings() {
        let derived = derive_timings(&sample_keystrokes());

        assert_eq!(derived.time_deltas, vec![150_000_000, 50_000_000]);
        assert_eq!(derived.dwell_times, vec![80_000_000, 80_000_000, 800_000_000]);
        assert_eq!(derived.flight_times, vec![70_000_000, 30_000_000]);
    }

    #[test]
    fn test_derive_lengths_follow_between_keys_layout() {
        let keystrokes = sample_keystrokes();
        let derived = derive_timings(&keystrokes);
        assert_eq!(derived.dwell_times.len(), keystrokes.len());
        assert_eq!(derived.time_deltas.len(), keystrokes.len() - 1);
        assert_eq!(derived.flight_times.len(), keystrokes.len() - 1);
    }

    #[test]
    fn test_derive_empty_and_single() {
        assert_eq!(derive_timings(&[]), DerivedTimings::default());

        let single = derive_timings(&[KeystrokeEvent::new(b'x', (5, 0), (5, 10))]);
        assert!(single.time_deltas.is_empty());
        assert!(single.flight_times.is_empty());
        assert_eq!(single.dwell_times, vec![10]);
    }

    #[test]
    fn test_reversed_press_clamps_to_zero() {
        let derived = derive_timings(&[
            KeystrokeEvent::new(b'a', (2, 0), (2, 5)),
            KeystrokeEvent::new(b'b', (1, 0), (1, 5)),
        ]);
        assert_eq!(derived.time_deltas, vec![0]);
    }

    #[test]
    fn test_session_with_derived_timings() {
        let session = Session {
            keystrokes: sample_keystrokes(),
            time_deltas: vec![1],
            dwell_times: vec![],
            flight_times: vec![9, 9, 9, 9],
        }
        .with_derived_timings();

        assert_eq!(session.time_deltas.len(), 2);
        assert_eq!(session.dwell_times.len(), 3);
        assert_eq!(session.flight_times, vec![70_000_000, 30_000_000]);
    }
}
