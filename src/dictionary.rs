//! Master dictionary aggregation
//!
//! Merges per-session records into one wide table: one column per
//! `"<grapheme>+<statistic>"` key, one row per session. A session that never
//! produced a key holds an unobserved cell (`None`) in that column, written as
//! `-1` in CSV output.

use crate::error::{FluxError, Result};
use crate::grapheme::SessionRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;

/// CSV rendering of an unobserved cell
pub const UNOBSERVED_SENTINEL: &str = "-1";

/// Leading CSV header fields
pub const SEQUENCE_HEADER: &str = "SequenceNumber";
pub const USER_HEADER: &str = "User";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Column {
    key: String,
    cells: Vec<Option<f64>>,
}

/// Column-oriented feature export for external classifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<f64>>>,
    pub labels: Vec<String>,
}

/// Accumulating grapheme table across sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterDictionary {
    columns: Vec<Column>,
    /// Per-row user label; `None` falls back to the label given at write time
    labels: Vec<Option<String>>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl MasterDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of aggregated sessions
    pub fn row_count(&self) -> usize {
        self.labels.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.key.as_str())
    }

    pub fn column(&self, key: &str) -> Option<&[Option<f64>]> {
        self.positions
            .get(key)
            .map(|&pos| self.columns[pos].cells.as_slice())
    }

    pub fn label(&self, row: usize) -> Option<&str> {
        self.labels.get(row).and_then(|l| l.as_deref())
    }

    /// Append one session without a row label
    pub fn update(&mut self, record: &SessionRecord) -> Result<()> {
        self.update_row(None, record)
    }

    /// Append one session labelled with its user
    pub fn update_labeled(&mut self, label: impl Into<String>, record: &SessionRecord) -> Result<()> {
        self.update_row(Some(label.into()), record)
    }

    fn update_row(&mut self, label: Option<String>, record: &SessionRecord) -> Result<()> {
        if record.is_empty() {
            return Ok(());
        }
        self.check_invariant()?;

        let current_max = self.max_len();
        for (key, value) in record.iter() {
            match self.positions.get(key) {
                Some(&pos) => self.columns[pos].cells.push(Some(value)),
                None => {
                    let mut cells = vec![None; current_max];
                    cells.push(Some(value));
                    self.positions.insert(key.to_string(), self.columns.len());
                    self.columns.push(Column {
                        key: key.to_string(),
                        cells,
                    });
                }
            }
        }
        self.labels.push(label);
        self.pad_to_max_length();
        Ok(())
    }

    /// Back-fill every short column with unobserved cells
    pub fn pad_to_max_length(&mut self) {
        let max = self.max_len().max(self.labels.len());
        for column in &mut self.columns {
            column.cells.resize(max, None);
        }
        self.labels.resize(max, None);
    }

    fn max_len(&self) -> usize {
        self.columns.iter().map(|c| c.cells.len()).max().unwrap_or(0)
    }

    fn check_invariant(&self) -> Result<()> {
        let expected = self.labels.len();
        match self.columns.iter().find(|c| c.cells.len() != expected) {
            Some(column) => Err(FluxError::ColumnLengthMismatch {
                column: column.key.clone(),
                expected,
                actual: column.cells.len(),
            }),
            None => Ok(()),
        }
    }

    /// Drop all rows and columns
    pub fn clear(&mut self) {
        self.columns.clear();
        self.labels.clear();
        self.positions.clear();
    }

    /// Write the table as fully quoted CSV
    pub fn write_csv<W: Write>(&self, out: W, user_label: &str) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(out);

        let mut header = vec![SEQUENCE_HEADER, USER_HEADER];
        header.extend(self.keys());
        writer.write_record(&header)?;

        for row in 0..self.row_count() {
            let mut fields = Vec::with_capacity(self.columns.len() + 2);
            fields.push((row + 1).to_string());
            fields.push(self.label(row).unwrap_or(user_label).to_string());
            for column in &self.columns {
                fields.push(format_cell(column.cells.get(row).copied().flatten()));
            }
            writer.write_record(&fields)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Render the CSV into a string
    pub fn to_csv_string(&self, user_label: &str) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf, user_label)?;
        String::from_utf8(buf)
            .map_err(|e| FluxError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Export rows for classification
    pub fn feature_table(&self, user_label: &str) -> FeatureTable {
        let rows = (0..self.row_count())
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| c.cells.get(row).copied().flatten())
                    .collect()
            })
            .collect();
        let labels = (0..self.row_count())
            .map(|row| self.label(row).unwrap_or(user_label).to_string())
            .collect();

        FeatureTable {
            columns: self.keys().map(str::to_string).collect(),
            rows,
            labels,
        }
    }

    /// Save dictionary state to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore dictionary state from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let mut dictionary: MasterDictionary = serde_json::from_str(json)?;
        for (pos, column) in dictionary.columns.iter().enumerate() {
            if dictionary.positions.insert(column.key.clone(), pos).is_some() {
                return Err(FluxError::InvalidConfig(format!(
                    "duplicate dictionary column {}",
                    column.key
                )));
            }
        }
        dictionary.check_invariant()?;
        Ok(dictionary)
    }
}

fn format_cell(cell: Option<f64>) -> String {
    match cell {
        Some(value) => value.to_string(),
        None => UNOBSERVED_SENTINEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(entries: &[(&str, f64)]) -> SessionRecord {
        entries.iter().map(|&(k, v)| (k, v)).collect()
    }

    #[test]
    fn test_first_session_creates_single_cells() {
        let mut dict = MasterDictionary::new();
        dict.update(&record(&[("ab+time_delta", 10.0), ("ab+dwell_time", 5.0)]))
            .unwrap();

        assert_eq!(dict.row_count(), 1);
        assert_eq!(dict.column("ab+time_delta").unwrap(), &[Some(10.0)]);
        assert_eq!(dict.column("ab+dwell_time").unwrap(), &[Some(5.0)]);
    }

    #[test]
    fn test_new_key_is_pre_padded() {
        let mut dict = MasterDictionary::new();
        dict.update(&record(&[("ab+time_delta", 10.0)])).unwrap();
        dict.update(&record(&[("ab+time_delta", 12.0)])).unwrap();
        dict.update(&record(&[("cd+time_delta", 7.0)])).unwrap();

        assert_eq!(dict.column("cd+time_delta").unwrap(), &[None, None, Some(7.0)]);
        // missing key back-filled after the update
        assert_eq!(
            dict.column("ab+time_delta").unwrap(),
            &[Some(10.0), Some(12.0), None]
        );
        assert_eq!(dict.row_count(), 3);
    }

    #[test]
    fn test_padding_is_idempotent() {
        let mut dict = MasterDictionary::new();
        dict.update(&record(&[("ab+time_delta", 1.0)])).unwrap();
        dict.update(&record(&[("bc+time_delta", 2.0)])).unwrap();

        dict.pad_to_max_length();
        let once = dict.clone();
        dict.pad_to_max_length();
        assert_eq!(dict, once);
    }

    #[test]
    fn test_zero_is_distinct_from_unobserved() {
        let mut dict = MasterDictionary::new();
        dict.update(&record(&[("ab+flight_time", 0.0)])).unwrap();
        dict.update(&record(&[("bc+flight_time", 0.0)])).unwrap();
        assert_eq!(dict.column("ab+flight_time").unwrap(), &[Some(0.0), None]);
    }

    #[test]
    fn test_empty_record_adds_no_row() {
        let mut dict = MasterDictionary::new();
        dict.update(&record(&[("ab+time_delta", 1.0)])).unwrap();
        dict.update(&SessionRecord::new()).unwrap();
        assert_eq!(dict.row_count(), 1);
    }

    #[test]
    fn test_broken_invariant_leaves_dictionary_untouched() {
        let mut dict = MasterDictionary::new();
        dict.update(&record(&[("ab+time_delta", 1.0), ("bc+time_delta", 2.0)]))
            .unwrap();
        dict.columns[1].cells.push(Some(3.0));
        let before = dict.clone();

        let err = dict.update(&record(&[("ab+time_delta", 4.0)])).unwrap_err();
        assert!(matches!(
            err,
            FluxError::ColumnLengthMismatch { ref column, expected: 1, actual: 2 } if column == "bc+time_delta"
        ));
        assert_eq!(dict, before);
    }

    #[test]
    fn test_csv_marks_missing_grapheme() {
        let mut dict = MasterDictionary::new();
        dict.update(&record(&[
            ("ab+time_delta", 15.0),
            ("ab+dwell_time", 5.0),
            ("bc+time_delta", 20.0),
            ("bc+dwell_time", 2.5),
        ]))
        .unwrap();
        dict.update(&record(&[("ab+time_delta", 11.0), ("ab+dwell_time", 4.0)]))
            .unwrap();

        let csv = dict.to_csv_string("alice").unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#""SequenceNumber","User","ab+time_delta","ab+dwell_time","bc+time_delta","bc+dwell_time""#,
                r#""1","alice","15","5","20","2.5""#,
                r#""2","alice","11","4","-1","-1""#,
            ]
        );
    }

    #[test]
    fn test_row_labels_override_default() {
        let mut dict = MasterDictionary::new();
        dict.update_labeled("alice", &record(&[("ab+time_delta", 1.0)]))
            .unwrap();
        dict.update(&record(&[("ab+time_delta", 2.0)])).unwrap();

        let table = dict.feature_table("unknown");
        assert_eq!(table.labels, vec!["alice", "unknown"]);
        assert_eq!(table.columns, vec!["ab+time_delta"]);
        assert_eq!(table.rows, vec![vec![Some(1.0)], vec![Some(2.0)]]);
    }

    #[test]
    fn test_empty_dictionary_csv_has_header_only() {
        let csv = MasterDictionary::new().to_csv_string("x").unwrap();
        assert_eq!(csv, "\"SequenceNumber\",\"User\"\n");
    }

    #[test]
    fn test_json_state_roundtrip() {
        let mut dict = MasterDictionary::new();
        dict.update_labeled("bob", &record(&[("ab+time_delta", 1.0)]))
            .unwrap();
        dict.update(&record(&[("cd+time_delta", 2.0)])).unwrap();

        let restored = MasterDictionary::from_json(&dict.to_json().unwrap()).unwrap();
        assert_eq!(restored, dict);

        let mut resumed = restored;
        resumed
            .update(&record(&[("cd+time_delta", 3.0)]))
            .unwrap();
        assert_eq!(
            resumed.column("cd+time_delta").unwrap(),
            &[None, Some(2.0), Some(3.0)]
        );
    }

    #[test]
    fn test_from_json_rejects_ragged_columns() {
        let json = r#"{
            "columns": [{ "key": "ab+time_delta", "cells": [1.0, null] }],
            "labels": [null]
        }"#;
        assert!(matches!(
            MasterDictionary::from_json(json),
            Err(FluxError::ColumnLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_clear() {
        let mut dict = MasterDictionary::new();
        dict.update(&record(&[("ab+time_delta", 1.0)])).unwrap();
        dict.clear();
        assert!(dict.is_empty());
        assert_eq!(dict.row_count(), 0);
        assert!(dict.column("ab+time_delta").is_none());
    }
}
