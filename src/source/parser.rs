use crate::source::format::MessageFormat;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to skip to {field}: unexpected EOF")]
    UnexpectedEof { field: &'static str },

    #[error("failed to parse TIMESTAMP '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// A single log event: when it happened and what was logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

/// Fields pulled out of one framed syslog record.
#[derive(Debug)]
pub struct Frame<'a> {
    pub timestamp: DateTime<Utc>,
    pub app: &'a [u8],
    pub process: &'a [u8],
    pub payload: &'a [u8],
}

/// Parse a single framed record into a [`LogEntry`] with the default
/// `app[process]: payload` message.
///
/// The record layout is
/// `LEN <PRI>VERSION TIMESTAMP HOSTNAME APP-NAME PROCID MSGID MSG`; everything
/// after the MSGID field is the payload, kept verbatim.
pub fn parse(raw: &[u8]) -> Result<LogEntry, ParseError> {
    parse_with_format(raw, MessageFormat::Text)
}

pub fn parse_with_format(raw: &[u8], format: MessageFormat) -> Result<LogEntry, ParseError> {
    let frame = parse_frame(raw)?;
    Ok(LogEntry {
        timestamp: frame.timestamp,
        message: format.render(
            &String::from_utf8_lossy(frame.app),
            &String::from_utf8_lossy(frame.process),
            &String::from_utf8_lossy(frame.payload),
        ),
    })
}

pub fn parse_frame(raw: &[u8]) -> Result<Frame<'_>, ParseError> {
    let mut cursor = Cursor::new(raw);

    // Octet count and "<PRI>VERSION"
    cursor.skip(2, "TIMESTAMP")?;

    let value = cursor.next_word("TIMESTAMP")?;
    let value = String::from_utf8_lossy(value);
    let timestamp = DateTime::parse_from_rfc3339(&value)
        .map_err(|source| ParseError::Timestamp {
            value: value.to_string(),
            source,
        })?
        .with_timezone(&Utc);

    // Hostname
    cursor.skip(1, "APP-NAME")?;

    let app = cursor.next_word("APP-NAME")?;
    let process = cursor.next_word("PROCID")?;

    // Message ID placeholder
    cursor.skip(1, "MSG")?;

    Ok(Frame {
        timestamp,
        app,
        process,
        payload: cursor.rest(),
    })
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Advance past the next `count` spaces.
    fn skip(&mut self, count: usize, field: &'static str) -> Result<(), ParseError> {
        let mut skipped = 0;
        while self.pos < self.bytes.len() {
            let byte = self.bytes[self.pos];
            self.pos += 1;
            if byte == b' ' {
                skipped += 1;
                if skipped == count {
                    return Ok(());
                }
            }
        }
        Err(ParseError::UnexpectedEof { field })
    }

    /// Read up to (not including) the next space and move past it.
    fn next_word(&mut self, field: &'static str) -> Result<&'a [u8], ParseError> {
        let start = self.pos;
        self.skip(1, field)?;
        Ok(&self.bytes[start..self.pos - 1])
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const VALID: &str =
        "89 <45>1 2016-10-15T08:59:08.723822+00:00 host heroku web.1 - State changed from up to down";

    #[test]
    fn test_parse_valid_record() {
        let entry = parse(VALID.as_bytes()).unwrap();

        assert_eq!(entry.message, "heroku[web.1]: State changed from up to down");
        let expected = Utc.with_ymd_and_hms(2016, 10, 15, 8, 59, 8).unwrap()
            + chrono::Duration::microseconds(723822);
        assert_eq!(entry.timestamp, expected);
    }

    #[test]
    fn test_parse_converts_offset_to_utc() {
        let entry =
            parse(b"12 <45>1 2016-10-15T10:59:08.5+02:00 host app web.1 - hello").unwrap();

        let expected = Utc.with_ymd_and_hms(2016, 10, 15, 8, 59, 8).unwrap()
            + chrono::Duration::milliseconds(500);
        assert_eq!(entry.timestamp, expected);
    }

    #[test]
    fn test_parse_keeps_structured_payload_verbatim() {
        let payload = r#"{"level":"info", "msg":"user logged in", "ctx": {"id": 42}}"#;
        let raw = format!(
            "200 <190>1 2020-09-17T15:41:38.426Z host app web.2 - {}",
            payload
        );

        let entry = parse(raw.as_bytes()).unwrap();
        assert_eq!(entry.message, format!("app[web.2]: {}", payload));
    }

    #[test]
    fn test_parse_allows_empty_payload() {
        let entry = parse(b"1 <45>1 2016-10-15T08:59:08Z host app web.1 - ").unwrap();
        assert_eq!(entry.message, "app[web.1]: ");
    }

    #[test]
    fn test_parse_rejects_truncated_records() {
        let cases = [
            "",
            "89",
            "89 <45>",
            "89 <45>1",
            "89 <45>1 2016-10-15T08:59:08.723822+00:00",
            "89 <45>1 2016-10-15T08:59:08.723822+00:00 host",
            "89 <45>1 2016-10-15T08:59:08.723822+00:00 host heroku",
            "89 <45>1 2016-10-15T08:59:08.723822+00:00 host heroku web.1",
            "89 <45>1 2016-10-15T08:59:08.723822+00:00 host heroku web.1 -",
        ];

        for case in cases {
            let result = parse(case.as_bytes());
            assert!(
                matches!(result, Err(ParseError::UnexpectedEof { .. })),
                "expected EOF error for {:?}, got {:?}",
                case,
                result
            );
        }
    }

    #[test]
    fn test_parse_rejects_bad_timestamp() {
        // Missing octet count shifts every field left by one
        let raw = "<45>1 2016-10-15T08:59:08.723822+00:00 host heroku web.1 - - State changed";
        let result = parse(raw.as_bytes());

        match result {
            Err(ParseError::Timestamp { value, .. }) => assert_eq!(value, "host"),
            other => panic!("expected timestamp error, got {:?}", other),
        }
    }

    #[test]
    fn test_eof_error_message() {
        let err = parse(b"").unwrap_err();
        assert!(err.to_string().contains("unexpected EOF"));
    }

    #[test]
    fn test_parse_frame_fields() {
        let frame = parse_frame(VALID.as_bytes()).unwrap();
        assert_eq!(frame.app, b"heroku");
        assert_eq!(frame.process, b"web.1");
        assert_eq!(frame.payload, b"State changed from up to down");
    }
}
