//! Binary keystroke log writer
//!
//! Produces the same little-endian layout the reader accepts, field for field.

use crate::error::{FluxError, Result};
use crate::types::{Session, UserInfo, USER_FIELD_WIDTH};
use std::io::Write;

/// Encode a log into a byte vector
pub fn encode_log(user: &UserInfo, sessions: &[Session]) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_log(&mut bytes, user, sessions)?;
    Ok(bytes)
}

/// Write a log to any byte sink
pub fn write_log<W: Write>(mut out: W, user: &UserInfo, sessions: &[Session]) -> Result<()> {
    write_fixed_str(&mut out, "user", &user.user)?;
    write_fixed_str(&mut out, "email", &user.email)?;
    write_fixed_str(&mut out, "major", &user.major)?;
    out.write_all(&user.typing_duration_seconds.to_le_bytes())?;

    write_count(&mut out, sessions.len())?;
    for session in sessions {
        write_count(&mut out, session.keystrokes.len())?;
        for keystroke in &session.keystrokes {
            out.write_all(&[keystroke.key])?;
            out.write_all(&keystroke.press_sec.to_le_bytes())?;
            out.write_all(&keystroke.press_nanos.to_le_bytes())?;
            out.write_all(&keystroke.release_sec.to_le_bytes())?;
            out.write_all(&keystroke.release_nanos.to_le_bytes())?;
        }
        write_u64_array(&mut out, &session.time_deltas)?;
        write_u64_array(&mut out, &session.dwell_times)?;
        write_u64_array(&mut out, &session.flight_times)?;
    }

    out.flush()?;
    Ok(())
}

fn write_fixed_str<W: Write>(out: &mut W, field: &'static str, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() > USER_FIELD_WIDTH {
        return Err(FluxError::FieldTooLong {
            field,
            len: bytes.len(),
            max: USER_FIELD_WIDTH,
        });
    }
    let mut buf = [0u8; USER_FIELD_WIDTH];
    buf[..bytes.len()].copy_from_slice(bytes);
    out.write_all(&buf)?;
    Ok(())
}

fn write_count<W: Write>(out: &mut W, count: usize) -> Result<()> {
    out.write_all(&(count as u64).to_le_bytes())?;
    Ok(())
}

fn write_u64_array<W: Write>(out: &mut W, values: &[u64]) -> Result<()> {
    write_count(out, values.len())?;
    for value in values {
        out.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{decode_log, KEYSTROKE_RECORD_SIZE, USER_INFO_SIZE};
    use crate::types::KeystrokeEvent;

    #[test]
    fn test_encoded_size() {
        let session = Session {
            keystrokes: vec![
                KeystrokeEvent::new(b'o', (1, 0), (1, 1)),
                KeystrokeEvent::new(b'k', (2, 0), (2, 1)),
            ],
            time_deltas: vec![1],
            dwell_times: vec![1, 1],
            flight_times: vec![1],
        };
        let bytes = encode_log(&UserInfo::default(), &[session]).unwrap();

        let expected = USER_INFO_SIZE + 8 + 8 + 2 * KEYSTROKE_RECORD_SIZE + (8 + 8) + (8 + 16) + (8 + 8);
        assert_eq!(bytes.len(), expected);
    }

    #[test]
    fn test_full_width_field_roundtrips_without_nul() {
        let user = UserInfo {
            user: "u".repeat(USER_FIELD_WIDTH),
            ..Default::default()
        };
        let bytes = encode_log(&user, &[]).unwrap();
        assert_eq!(decode_log(&bytes).unwrap().user, user);
    }

    #[test]
    fn test_field_too_long() {
        let user = UserInfo {
            major: "m".repeat(USER_FIELD_WIDTH + 1),
            ..Default::default()
        };
        let err = encode_log(&user, &[]).unwrap_err();
        assert!(matches!(
            err,
            FluxError::FieldTooLong { field: "major", len: 65, max: 64 }
        ));
    }

    #[test]
    fn test_layout_starts_with_padded_user() {
        let user = UserInfo {
            user: "dan".to_string(),
            typing_duration_seconds: -2,
            ..Default::default()
        };
        let bytes = encode_log(&user, &[]).unwrap();
        assert_eq!(&bytes[..4], b"dan\0");
        assert_eq!(&bytes[3 * USER_FIELD_WIDTH..USER_INFO_SIZE], &(-2i16).to_le_bytes());
        assert_eq!(&bytes[USER_INFO_SIZE..], &0u64.to_le_bytes());
    }
}
