//! Pipeline configuration
//!
//! Every variant behaviour of the decoder and the grapheme builder is selected
//! here: which gap-array layout the recorder wrote, which window the builder
//! slides over gap arrays, how strictly array lengths are checked, whether the flight-time sign correction runs, where timings
//! come from, and how graphemes and times are rendered.

use crate::error::{FluxError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default grapheme order (digraphs)
pub const DEFAULT_GRAPHEME_ORDER: usize = 2;

/// Threshold above which a flight time is treated as a wrapped negative value
pub const DEFAULT_FLIGHT_CORRECTION_THRESHOLD: u64 = 500_000;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Layout of the two gap arrays (time deltas, flight times)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapLayout {
    /// One entry per adjacent key pair (`n - 1` entries)
    #[default]
    BetweenKeys,
    /// One entry per key (`n` entries)
    PerKey,
}

impl GapLayout {
    /// Expected gap-array length for a session with `keys` keystrokes
    pub fn expected_len(&self, keys: usize) -> usize {
        match self {
            GapLayout::BetweenKeys => keys.saturating_sub(1),
            GapLayout::PerKey => keys,
        }
    }
}

/// Numeric window the grapheme builder slides over the two gap arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapWindow {
    /// Same window as the graphemes (`order`), like every other array
    #[default]
    Grapheme,
    /// The transitions inside a grapheme (`order - 1`)
    Transitions,
}

impl GapWindow {
    pub fn window(&self, order: usize) -> usize {
        match self {
            GapWindow::Grapheme => order,
            GapWindow::Transitions => order.saturating_sub(1),
        }
    }
}

/// How the reader treats timing arrays that disagree with the gap layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LengthPolicy {
    /// Reject the file with `ArrayLengthMismatch`
    #[default]
    Strict,
    /// Accept the file; the grapheme builder reports misaligned sessions
    Lenient,
}

/// Where session timing arrays come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimingSource {
    /// Arrays stored in the log
    #[default]
    Recorded,
    /// Recomputed from keystroke timestamps
    Derived,
}

/// Reinterprets flight times above `threshold` as wrapped negative values and
/// keeps their magnitude.
///
/// This compensates for a signedness defect in some recorder builds and is off
/// unless explicitly enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightCorrection {
    pub threshold: u64,
}

impl Default for FlightCorrection {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FLIGHT_CORRECTION_THRESHOLD,
        }
    }
}

impl FlightCorrection {
    /// `|value - 2^64|` above the threshold, `value` otherwise
    pub fn apply(&self, value: u64) -> u64 {
        if value > self.threshold {
            value.wrapping_neg()
        } else {
            value
        }
    }
}

/// Rendering of grapheme labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GraphemeEncoding {
    /// Key characters, e.g. `th`
    #[default]
    Raw,
    /// Decimal key codes joined by `-`, e.g. `116-104`
    Codepoint,
}

/// Unit of emitted timing statistics (logs record nanoseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeUnit {
    #[default]
    Nanoseconds,
    Milliseconds,
}

impl TimeUnit {
    /// Convert a nanosecond value into this unit
    pub fn convert_nanos(&self, nanos: f64) -> f64 {
        match self {
            TimeUnit::Nanoseconds => nanos,
            TimeUnit::Milliseconds => nanos / NANOS_PER_MILLI,
        }
    }
}

/// Options consumed by the binary log reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaderConfig {
    pub gap_layout: GapLayout,
    pub length_policy: LengthPolicy,
    pub timing_source: TimingSource,
    pub flight_correction: Option<FlightCorrection>,
}

/// Options consumed by the grapheme map builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphemeConfig {
    pub gap_window: GapWindow,
    pub encoding: GraphemeEncoding,
    pub time_unit: TimeUnit,
}

/// Complete pipeline configuration, loadable from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxConfig {
    pub grapheme_order: usize,
    pub gap_layout: GapLayout,
    pub gap_window: GapWindow,
    pub length_policy: LengthPolicy,
    pub timing_source: TimingSource,
    pub flight_correction: Option<FlightCorrection>,
    pub grapheme_encoding: GraphemeEncoding,
    pub time_unit: TimeUnit,
}

impl Default for FluxConfig {
    fn default() -> Self {
        Self {
            grapheme_order: DEFAULT_GRAPHEME_ORDER,
            gap_layout: GapLayout::default(),
            gap_window: GapWindow::default(),
            length_policy: LengthPolicy::default(),
            timing_source: TimingSource::default(),
            flight_correction: None,
            grapheme_encoding: GraphemeEncoding::default(),
            time_unit: TimeUnit::default(),
        }
    }
}

impl FluxConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: FluxConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(2..=3).contains(&self.grapheme_order) {
            return Err(FluxError::UnsupportedGraphemeOrder(self.grapheme_order));
        }
        if let Some(correction) = self.flight_correction {
            if correction.threshold == 0 {
                return Err(FluxError::InvalidConfig(
                    "flight correction threshold must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn reader(&self) -> ReaderConfig {
        ReaderConfig {
            gap_layout: self.gap_layout,
            length_policy: self.length_policy,
            timing_source: self.timing_source,
            flight_correction: self.flight_correction,
        }
    }

    pub fn grapheme(&self) -> GraphemeConfig {
        GraphemeConfig {
            gap_window: self.gap_window,
            encoding: self.grapheme_encoding,
            time_unit: self.time_unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_gap_layout_lengths() {
        assert_eq!(GapLayout::BetweenKeys.expected_len(5), 4);
        assert_eq!(GapLayout::BetweenKeys.expected_len(0), 0);
        assert_eq!(GapLayout::PerKey.expected_len(5), 5);

    }

    #[test]
    fn test_gap_window_defaults_to_grapheme_order() {
        assert_eq!(GraphemeConfig::default().gap_window, GapWindow::Grapheme);
        assert_eq!(FluxConfig::default().grapheme().gap_window, GapWindow::Grapheme);
        assert_eq!(FluxConfig::default().reader().gap_layout, GapLayout::BetweenKeys);

        assert_eq!(GapWindow::Grapheme.window(2), 2);
        assert_eq!(GapWindow::Grapheme.window(3), 3);
        assert_eq!(GapWindow::Transitions.window(2), 1);
        assert_eq!(GapWindow::Transitions.window(3), 2);
    }

    #[test]
    fn test_flight_correction_folds_wrapped_values() {
        let correction = FlightCorrection::default();
        assert_eq!(correction.apply(1_000), 1_000);
        assert_eq!(correction.apply(500_000), 500_000);
        // -250 stored as an unsigned 64-bit value
        assert_eq!(correction.apply(u64::MAX - 249), 250);
    }

    #[test]
    fn test_flight_correction_respects_threshold() {
        let value = 600_000;
        assert_eq!(FlightCorrection::default().apply(value), 18_446_744_073_708_951_616);
        assert_eq!(FlightCorrection { threshold: 700_000 }.apply(value), value);
        assert_eq!(FlightCorrection { threshold: 10 }.apply(11), u64::MAX - 10);
        assert_eq!(FlightCorrection { threshold: 10 }.apply(10), 10);
    }

    #[test]
    fn test_time_unit_conversion() {
        assert_eq!(TimeUnit::Nanoseconds.convert_nanos(2_500_000.0), 2_500_000.0);
        assert_eq!(TimeUnit::Milliseconds.convert_nanos(2_500_000.0), 2.5);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = FluxConfig::from_json(
            r#"{
                "grapheme_order": 3,
                "gap_layout": "per-key",
                "gap_window": "transitions",
                "flight_correction": { "threshold": 1000 },
                "time_unit": "milliseconds"
            }"#,
        )
        .unwrap();

        assert_eq!(config.grapheme_order, 3);
        assert_eq!(config.gap_layout, GapLayout::PerKey);
        assert_eq!(config.length_policy, LengthPolicy::Strict);
        assert_eq!(config.flight_correction, Some(FlightCorrection { threshold: 1000 }));
        assert_eq!(config.grapheme_encoding, GraphemeEncoding::Raw);
        assert_eq!(config.grapheme().time_unit, TimeUnit::Milliseconds);
        assert_eq!(config.reader().gap_layout, GapLayout::PerKey);
        assert_eq!(config.grapheme().gap_window, GapWindow::Transitions);
    }

    #[test]
    fn test_config_rejects_unsupported_order() {
        let result = FluxConfig::from_json(r#"{ "grapheme_order": 1 }"#);
        assert!(matches!(result, Err(FluxError::UnsupportedGraphemeOrder(1))));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = FluxConfig {
            timing_source: TimingSource::Derived,
            grapheme_encoding: GraphemeEncoding::Codepoint,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(FluxConfig::from_json(&json).unwrap(), config);
    }
}
