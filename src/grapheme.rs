//! Grapheme map builder
//!
//! Turns one session into a table of digraphs or trigraphs, each carrying the
//! mean time delta, dwell time and flight time over its window. The table is
//! then flattened into a [`SessionRecord`] keyed by `"<grapheme>+<statistic>"`
//! for the master dictionary.

use crate::combinations::{numeric_combinations, text_combinations};
use crate::config::{GraphemeConfig, GraphemeEncoding};
use crate::error::{FluxError, Result};
use crate::types::{Session, StatisticKind};
use serde::Serialize;
use std::collections::HashMap;

/// Per-session grapheme table with parallel columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphemeMap {
    pub order: usize,
    /// 1-based row numbers
    pub index: Vec<usize>,
    pub grapheme: Vec<String>,
    pub time_delta: Vec<f64>,
    pub dwell_time: Vec<f64>,
    pub flight_time: Vec<f64>,
}

/// One row of a [`GraphemeMap`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphemeRow<'a> {
    pub index: usize,
    pub grapheme: &'a str,
    pub time_delta: f64,
    pub dwell_time: f64,
    pub flight_time: f64,
}

impl GraphemeMap {
    pub fn len(&self) -> usize {
        self.grapheme.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grapheme.is_empty()
    }

    pub fn column(&self, kind: StatisticKind) -> &[f64] {
        match kind {
            StatisticKind::TimeDelta => &self.time_delta,
            StatisticKind::DwellTime => &self.dwell_time,
            StatisticKind::FlightTime => &self.flight_time,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = GraphemeRow<'_>> {
        (0..self.len()).map(move |i| GraphemeRow {
            index: self.index[i],
            grapheme: &self.grapheme[i],
            time_delta: self.time_delta[i],
            dwell_time: self.dwell_time[i],
            flight_time: self.flight_time[i],
        })
    }

    /// Flatten into composite keys; a repeated grapheme keeps its last values
    pub fn to_record(&self) -> SessionRecord {
        let mut record = SessionRecord::default();
        for row in self.rows() {
            for kind in StatisticKind::ALL {
                let value = match kind {
                    StatisticKind::TimeDelta => row.time_delta,
                    StatisticKind::DwellTime => row.dwell_time,
                    StatisticKind::FlightTime => row.flight_time,
                };
                record.insert(composite_key(row.grapheme, kind), value);
            }
        }
        record
    }
}

/// Composite column key, e.g. `th+dwell_time`
pub fn composite_key(grapheme: &str, kind: StatisticKind) -> String {
    format!("{}+{}", grapheme, kind)
}

/// One session's scalar per composite key, in first-occurrence order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRecord {
    entries: Vec<(String, f64)>,
    positions: HashMap<String, usize>,
}

impl SessionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value; overwriting keeps the original position
    pub fn insert(&mut self, key: String, value: f64) {
        match self.positions.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.positions.get(key).map(|&pos| self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for SessionRecord {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut record = SessionRecord::default();
        for (key, value) in iter {
            record.insert(key.into(), value);
        }
        record
    }
}

/// Build a grapheme map with the default configuration
pub fn build_grapheme_map(session: &Session, order: usize) -> Result<GraphemeMap> {
    GraphemeMapBuilder::default().build(session, order)
}

/// Builds grapheme maps according to a [`GraphemeConfig`]
#[derive(Debug, Clone, Default)]
pub struct GraphemeMapBuilder {
    config: GraphemeConfig,
}

impl GraphemeMapBuilder {
    pub fn new(config: GraphemeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GraphemeConfig {
        &self.config
    }

    /// Build the map for digraphs (`order == 2`) or trigraphs (`order == 3`)
    pub fn build(&self, session: &Session, order: usize) -> Result<GraphemeMap> {
        if !(2..=3).contains(&order) {
            return Err(FluxError::UnsupportedGraphemeOrder(order));
        }

        let labels = text_combinations(&session.text(), order).map_err(|e| match e {
            FluxError::EmptyInput => FluxError::EmptyGraphemeList(order),
            other => other,
        })?;
        let grapheme: Vec<String> = match self.config.encoding {
            GraphemeEncoding::Raw => labels,
            GraphemeEncoding::Codepoint => labels.iter().map(|l| codepoint_label(l)).collect(),
        };

        let time_delta = self.statistic_means(session, StatisticKind::TimeDelta, order)?;
        let dwell_time = self.statistic_means(session, StatisticKind::DwellTime, order)?;
        let flight_time = self.statistic_means(session, StatisticKind::FlightTime, order)?;

        let expected = grapheme.len();
        for (kind, column) in [
            (StatisticKind::TimeDelta, &time_delta),
            (StatisticKind::DwellTime, &dwell_time),
            (StatisticKind::FlightTime, &flight_time),
        ] {
            if column.len() != expected {
                return Err(FluxError::ColumnLengthMismatch {
                    column: kind.to_string(),
                    expected,
                    actual: column.len(),
                });
            }
        }

        Ok(GraphemeMap {
            order,
            index: (1..=expected).collect(),
            grapheme,
            time_delta,
            dwell_time,
            flight_time,
        })
    }

    /// Window one timing array and reduce each window to its mean
    fn statistic_means(&self, session: &Session, kind: StatisticKind, order: usize) -> Result<Vec<f64>> {
        let window = if kind.is_gap() {
            self.config.gap_window.window(order)
        } else {
            order
        };
        let values: Vec<f64> = session.statistic(kind).iter().map(|&v| v as f64).collect();
        let windows = numeric_combinations(&values, window).map_err(|e| match e {
            FluxError::EmptyInput => FluxError::EmptyStatisticList(kind),
            other => other,
        })?;

        Ok(windows
            .iter()
            .map(|w| self.config.time_unit.convert_nanos(w.iter().sum::<f64>() / w.len() as f64))
            .collect())
    }
}

fn codepoint_label(label: &str) -> String {
    label
        .chars()
        .map(|c| (c as u32).to_string())
        .collect::<Vec<_>>()
        .join("-")
}
