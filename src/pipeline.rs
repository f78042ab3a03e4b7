//! Batch pipeline orchestration
//!
//! This module provides the public API for turning keystroke logs into a
//! grapheme feature table: binary log → sessions → grapheme maps → master
//! dictionary → CSV.

use crate::config::FluxConfig;
use crate::dictionary::MasterDictionary;
use crate::error::Result;
use crate::grapheme::{GraphemeMap, GraphemeMapBuilder};
use crate::reader::{KeystrokeLog, LogReader};
use crate::types::Session;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Label used for rows whose log carries no user name
pub const UNKNOWN_USER: &str = "unknown";

/// Convert one binary log into CSV (stateless, one-shot).
///
/// # Example
/// ```ignore
/// let csv = log_to_csv(&std::fs::read("session.bin")?, FluxConfig::default())?;
/// ```
pub fn log_to_csv(bytes: &[u8], config: FluxConfig) -> Result<String> {
    let mut processor = BatchProcessor::with_config(config)?;
    processor.process_bytes(bytes)?;
    processor.dictionary().to_csv_string(UNKNOWN_USER)
}

/// Outcome of one processed log
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileReport {
    pub user: String,
    pub sessions_total: usize,
    pub sessions_aggregated: usize,
    pub skipped: Vec<SkippedSession>,
}

/// A session left out of the dictionary, with the reason
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSession {
    pub index: usize,
    pub reason: String,
}

/// Running totals for a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub sessions_aggregated: usize,
    pub sessions_skipped: usize,
}

/// Stateful processor that owns the master dictionary for one batch run.
///
/// Each log is decoded completely before any of its sessions are aggregated;
/// a decode failure contributes nothing. Sessions that cannot be mapped or
/// aggregated are skipped individually.
pub struct BatchProcessor {
    config: FluxConfig,
    reader: LogReader,
    builder: GraphemeMapBuilder,
    dictionary: MasterDictionary,
    summary: BatchSummary,
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchProcessor {
    /// Create a processor with the default configuration (digraphs)
    pub fn new() -> Self {
        Self::build(FluxConfig::default())
    }

    /// Create a processor from a validated configuration
    pub fn with_config(config: FluxConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: FluxConfig) -> Self {
        Self {
            reader: LogReader::new(config.reader()),
            builder: GraphemeMapBuilder::new(config.grapheme()),
            dictionary: MasterDictionary::new(),
            summary: BatchSummary::default(),
            config,
        }
    }

    pub fn config(&self) -> &FluxConfig {
        &self.config
    }

    /// Decode a log from memory and aggregate its sessions
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Result<FileReport> {
        match self.reader.decode(bytes) {
            Ok(log) => {
                self.summary.files_processed += 1;
                Ok(self.process_log(&log))
            }
            Err(e) => {
                self.summary.files_failed += 1;
                Err(e)
            }
        }
    }

    /// Read, decode and aggregate a log file
    pub fn process_file(&mut self, path: &Path) -> Result<FileReport> {
        tracing::debug!(path = %path.display(), "processing keystroke log");
        match std::fs::read(path) {
            Ok(bytes) => self.process_bytes(&bytes),
            Err(e) => {
                self.summary.files_failed += 1;
                Err(e.into())
            }
        }
    }

    /// Process several files; failures are logged and the batch continues
    pub fn process_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> &BatchSummary {
        for path in paths {
            let path = path.as_ref();
            match self.process_file(path) {
                Ok(report) => tracing::info!(
                    path = %path.display(),
                    user = %report.user,
                    aggregated = report.sessions_aggregated,
                    skipped = report.skipped.len(),
                    "log processed"
                ),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping log"),
            }
        }
        &self.summary
    }

    /// Aggregate every session of an already decoded log
    pub fn process_log(&mut self, log: &KeystrokeLog) -> FileReport {
        let mut report = FileReport {
            user: log.user.user.clone(),
            sessions_total: log.sessions.len(),
            ..Default::default()
        };

        for (index, session) in log.sessions.iter().enumerate() {
            let outcome = self.grapheme_map(session).and_then(|map| {
                let record = map.to_record();
                if log.user.user.is_empty() {
                    self.dictionary.update(&record)
                } else {
                    self.dictionary.update_labeled(log.user.user.as_str(), &record)
                }
            });

            match outcome {
                Ok(()) => report.sessions_aggregated += 1,
                Err(e) => {
                    tracing::warn!(session = index, error = %e, "skipping session");
                    report.skipped.push(SkippedSession {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.summary.sessions_aggregated += report.sessions_aggregated;
        self.summary.sessions_skipped += report.skipped.len();
        report
    }

    /// Build one session's grapheme map with this processor's settings
    pub fn grapheme_map(&self, session: &Session) -> Result<GraphemeMap> {
        self.builder.build(session, self.config.grapheme_order)
    }

    pub fn dictionary(&self) -> &MasterDictionary {
        &self.dictionary
    }

    pub fn into_dictionary(self) -> MasterDictionary {
        self.dictionary
    }

    pub fn summary(&self) -> &BatchSummary {
        &self.summary
    }

    /// Write the aggregated table as CSV
    pub fn write_csv<W: Write>(&self, out: W, user_label: &str) -> Result<()> {
        self.dictionary.write_csv(out, user_label)
    }

    /// Save dictionary state to JSON for a later run
    pub fn save_state(&self) -> Result<String> {
        self.dictionary.to_json()
    }

    /// Resume from saved dictionary state
    pub fn load_state(&mut self, json: &str) -> Result<()> {
        self.dictionary = MasterDictionary::from_json(json)?;
        Ok(())
    }

    /// Clear the dictionary and the batch totals
    pub fn reset(&mut self) {
        self.dictionary.clear();
        self.summary = BatchSummary::default();
    }
}
