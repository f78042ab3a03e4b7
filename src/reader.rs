//! Binary keystroke log reader
//!
//! Decodes the recorder's log layout (all integers little-endian):
//!
//! ```text
//! UserInfo:      user[64] email[64] major[64] typing_duration(i16)
//! SessionCount:  u64
//! Session*:
//!   KeystrokeCount: u64
//!   Keystroke*:  key(u8) press_sec(i64) press_nanos(i64) release_sec(i64) release_nanos(i64)
//!   DeltaCount: u64;  Delta*: u64
//!   DwellCount: u64;  Dwell*: u64
//!   FlightCount: u64; Flight*: u64
//! ```
//!
//! Decoding is all-or-nothing: a file either yields every session or an error.

use crate::config::{LengthPolicy, ReaderConfig, TimingSource};
use crate::error::{FluxError, Result};
use crate::types::{KeystrokeEvent, Session, StatisticKind, UserInfo, USER_FIELD_WIDTH};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Encoded size of one keystroke record
pub const KEYSTROKE_RECORD_SIZE: usize = 1 + 4 * 8;

/// Encoded size of the user header
pub const USER_INFO_SIZE: usize = 3 * USER_FIELD_WIDTH + 2;

/// Smallest possible encoded session (four zero counts)
const MIN_SESSION_SIZE: usize = 4 * 8;

/// A fully decoded log file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeystrokeLog {
    pub user: UserInfo,
    pub sessions: Vec<Session>,
}

/// Decode a log with the default reader configuration
pub fn decode_log(bytes: &[u8]) -> Result<KeystrokeLog> {
    LogReader::default().decode(bytes)
}

/// Configurable log decoder
#[derive(Debug, Clone, Default)]
pub struct LogReader {
    config: ReaderConfig,
}

impl LogReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Read and decode a log file
    pub fn read_file(&self, path: &Path) -> Result<KeystrokeLog> {
        let bytes = std::fs::read(path)?;
        self.decode(&bytes)
    }

    /// Decode a complete log from memory
    pub fn decode(&self, bytes: &[u8]) -> Result<KeystrokeLog> {
        let mut cursor = ByteCursor::new(bytes);

        let user = UserInfo {
            user: cursor.read_fixed_str("user")?,
            email: cursor.read_fixed_str("email")?,
            major: cursor.read_fixed_str("major")?,
            typing_duration_seconds: cursor.read_i16("typing_duration")?,
        };

        let session_count = cursor.read_count(MIN_SESSION_SIZE, "session_count")?;
        let mut sessions = Vec::with_capacity(session_count);

        for index in 0..session_count {
            let session = self
                .decode_session(&mut cursor, index)
                .map_err(|e| in_session(e, index))?;
            sessions.push(session);
        }

        if cursor.remaining() > 0 {
            tracing::debug!(
                trailing = cursor.remaining(),
                "ignoring trailing bytes after last session"
            );
        }
        tracing::debug!(user = %user.user, sessions = sessions.len(), "decoded keystroke log");

        Ok(KeystrokeLog { user, sessions })
    }

    fn decode_session(&self, cursor: &mut ByteCursor<'_>, index: usize) -> Result<Session> {
        let keystroke_count = cursor.read_count(KEYSTROKE_RECORD_SIZE, "keystroke_count")?;
        let mut keystrokes = Vec::with_capacity(keystroke_count);
        for _ in 0..keystroke_count {
            keystrokes.push(KeystrokeEvent {
                key: cursor.read_u8("keystroke.key")?,
                press_sec: cursor.read_i64("keystroke.press_sec")?,
                press_nanos: cursor.read_i64("keystroke.press_nanos")?,
                release_sec: cursor.read_i64("keystroke.release_sec")?,
                release_nanos: cursor.read_i64("keystroke.release_nanos")?,
            });
        }

        let time_deltas = cursor.read_u64_array("time_deltas")?;
        let dwell_times = cursor.read_u64_array("dwell_times")?;
        let mut flight_times = cursor.read_u64_array("flight_times")?;

        let session = match self.config.timing_source {
            TimingSource::Derived => Session {
                keystrokes,
                ..Default::default()
            }
            .with_derived_timings(),
            TimingSource::Recorded => {
                if let Some(correction) = self.config.flight_correction {
                    for value in flight_times.iter_mut() {
                        *value = correction.apply(*value);
                    }
                }
                let session = Session {
                    keystrokes,
                    time_deltas,
                    dwell_times,
                    flight_times,
                };
                if self.config.length_policy == LengthPolicy::Strict {
                    self.check_lengths(&session, index)?;
                }
                session
            }
        };

        Ok(session)
    }

    fn check_lengths(&self, session: &Session, index: usize) -> Result<()> {
        let keys = session.keystrokes.len();
        for kind in StatisticKind::ALL {
            let expected = if kind.is_gap() {
                self.config.gap_layout.expected_len(keys)
            } else {
                keys
            };
            let actual = session.statistic(kind).len();
            if actual != expected {
                return Err(FluxError::ArrayLengthMismatch {
                    session: index,
                    array: kind,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

fn in_session(error: FluxError, index: usize) -> FluxError {
    match error {
        FluxError::TruncatedInput { offset, field } => FluxError::TruncatedInput {
            offset,
            field: format!("session[{}].{}", index, field),
        },
        other => other,
    }
}

/// Bounds-checked little-endian cursor over a byte slice
struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(FluxError::truncated(self.offset, field));
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn read_bytes<const N: usize>(&mut self, field: &str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N, field)?);
        Ok(buf)
    }

    fn read_u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.read_bytes::<1>(field)?[0])
    }

    fn read_i16(&mut self, field: &str) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_bytes(field)?))
    }

    fn read_i64(&mut self, field: &str) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_bytes(field)?))
    }

    fn read_u64(&mut self, field: &str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_bytes(field)?))
    }

    /// Read an element count and check the elements can fit in what is left
    fn read_count(&mut self, element_size: usize, field: &str) -> Result<usize> {
        let count = self.read_u64(field)?;
        let fits = usize::try_from(count)
            .ok()
            .and_then(|n| n.checked_mul(element_size).map(|bytes| (n, bytes)))
            .filter(|&(_, bytes)| bytes <= self.remaining());
        match fits {
            Some((n, _)) => Ok(n),
            None => Err(FluxError::truncated(self.offset, field)),
        }
    }

    fn read_u64_array(&mut self, field: &str) -> Result<Vec<u64>> {
        let count = self.read_count(8, field)?;
        let bytes = self.take(count * 8, field)?;
        Ok(bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                u64::from_le_bytes(buf)
            })
            .collect())
    }

    /// Fixed-width string; the value ends at the first NUL
    fn read_fixed_str(&mut self, field: &str) -> Result<String> {
        let raw = self.take(USER_FIELD_WIDTH, field)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        std::str::from_utf8(&raw[..end])
            .map(str::to_string)
            .map_err(|source| FluxError::Encoding {
                field: field.to_string(),
                source,
            })
    }
}
