//! Line protocol decoder
//!
//! Accepts the InfluxDB line protocol:
//!
//! ```text
//! measurement[,tag=value...] field=value[,field=value...] [timestamp]
//! ```
//!
//! Field values are `"quoted strings"`, integers with an `i` suffix, unsigned
//! integers with a `u` suffix, booleans (`t`, `true`, `F`, `false`, ...) or
//! floats. Lines without a timestamp get the batch default timestamp.

use super::model::Metric;
use crate::data::{FieldValue, Labels};
use std::collections::BTreeMap;

/// Turns a raw batch into metric records
pub trait MetricDecoder: Send + Sync {
    fn decode(&self, buf: &[u8]) -> Result<Vec<Metric>, ParseError>;
}

/// Unit of the trailing timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl Precision {
    fn multiplier(self) -> i64 {
        match self {
            Precision::Nanoseconds => 1,
            Precision::Microseconds => 1_000,
            Precision::Milliseconds => 1_000_000,
            Precision::Seconds => 1_000_000_000,
        }
    }
}

impl std::str::FromStr for Precision {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ns" | "n" => Ok(Precision::Nanoseconds),
            "us" | "u" => Ok(Precision::Microseconds),
            "ms" => Ok(Precision::Milliseconds),
            "s" => Ok(Precision::Seconds),
            other => Err(ParseError::InvalidPrecision(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineProtocolDecoder {
    precision: Precision,
    /// Used for lines without a timestamp; wall clock when unset
    default_timestamp: Option<i64>,
}

impl LineProtocolDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_default_timestamp(mut self, timestamp: i64) -> Self {
        self.default_timestamp = Some(timestamp);
        self
    }

    fn batch_timestamp(&self) -> i64 {
        self.default_timestamp.unwrap_or_else(|| {
            chrono::Utc::now()
                .timestamp_nanos_opt()
                .unwrap_or_default()
        })
    }
}

impl MetricDecoder for LineProtocolDecoder {
    fn decode(&self, buf: &[u8]) -> Result<Vec<Metric>, ParseError> {
        let default_timestamp = self.batch_timestamp();
        let mut metrics = Vec::new();

        for (idx, raw_line) in buf.split(|b| *b == b'\n').enumerate() {
            let line_no = idx + 1;
            let line = std::str::from_utf8(raw_line)
                .map_err(|_| ParseError::InvalidUtf8 { line: line_no })?;
            let line = line.strip_suffix('\r').unwrap_or(line);
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let parser = LineParser {
                line: trimmed.as_bytes(),
                pos: 0,
                indent: line.len() - trimmed.len(),
                line_no,
                precision: self.precision,
                default_timestamp,
            };
            metrics.push(parser.parse()?);
        }

        tracing::trace!("Decoded {} metrics", metrics.len());
        Ok(metrics)
    }
}

struct LineParser<'a> {
    line: &'a [u8],
    pos: usize,
    /// Leading whitespace trimmed off before parsing
    indent: usize,
    line_no: usize,
    precision: Precision,
    default_timestamp: i64,
}

impl<'a> LineParser<'a> {
    fn parse(mut self) -> Result<Metric, ParseError> {
        let name = self.read_token(b", ", b", ")?;
        if name.is_empty() {
            return Err(self.syntax("missing measurement"));
        }

        let mut tags = Labels::new();
        while self.peek() == Some(b',') {
            self.pos += 1;
            let key = self.read_token(b",= ", b",= ")?;
            self.expect(b'=', "expected '=' after tag key")?;
            let value = self.read_token(b", ", b",= ")?;
            if key.is_empty() || value.is_empty() {
                return Err(self.syntax("empty tag key or value"));
            }
            tags.insert(key, value);
        }

        if self.skip_spaces() == 0 {
            return Err(self.syntax("missing fields"));
        }

        let mut fields = BTreeMap::new();
        loop {
            let key = self.read_token(b",= ", b",= ")?;
            if key.is_empty() {
                return Err(self.syntax("missing field key"));
            }
            self.expect(b'=', "expected '=' after field key")?;
            let value = self.read_field_value()?;
            fields.insert(key, value);

            if self.peek() == Some(b',') {
                self.pos += 1;
            } else {
                break;
            }
        }

        let timestamp = if self.skip_spaces() > 0 && self.pos < self.line.len() {
            self.read_timestamp()?
        } else {
            self.default_timestamp
        };

        if self.pos < self.line.len() {
            return Err(self.syntax("unexpected trailing data"));
        }

        Ok(Metric {
            name,
            timestamp,
            tags,
            fields,
        })
    }

    fn peek(&self) -> Option<u8> {
        self.line.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8, reason: &'static str) -> Result<(), ParseError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.syntax(reason))
        }
    }

    fn skip_spaces(&mut self) -> usize {
        let start = self.pos;
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Read until an unescaped byte in `stop`. A backslash followed by a byte
    /// in `escapable` yields that byte literally.
    fn read_token(&mut self, stop: &[u8], escapable: &[u8]) -> Result<String, ParseError> {
        let mut out = Vec::new();
        while let Some(b) = self.peek() {
            if b == b'\\' {
                if let Some(next) = self.line.get(self.pos + 1) {
                    if escapable.contains(next) || *next == b'\\' {
                        out.push(*next);
                        self.pos += 2;
                        continue;
                    }
                }
                out.push(b);
                self.pos += 1;
                continue;
            }
            if stop.contains(&b) {
                break;
            }
            out.push(b);
            self.pos += 1;
        }
        String::from_utf8(out).map_err(|_| ParseError::InvalidUtf8 { line: self.line_no })
    }

    fn read_field_value(&mut self) -> Result<FieldValue, ParseError> {
        if self.peek() == Some(b'"') {
            self.pos += 1;
            let mut out = Vec::new();
            loop {
                match self.peek() {
                    None => return Err(self.syntax("unterminated string")),
                    Some(b'"') => {
                        self.pos += 1;
                        break;
                    }
                    Some(b'\\') if matches!(self.line.get(self.pos + 1), Some(b'"' | b'\\')) => {
                        out.push(self.line[self.pos + 1]);
                        self.pos += 2;
                    }
                    Some(b) => {
                        out.push(b);
                        self.pos += 1;
                    }
                }
            }
            let s = String::from_utf8(out)
                .map_err(|_| ParseError::InvalidUtf8 { line: self.line_no })?;
            return Ok(FieldValue::String(s));
        }

        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b',' || b == b' ' {
                break;
            }
            self.pos += 1;
        }
        let line = self.line;
        let raw = std::str::from_utf8(&line[start..self.pos])
            .map_err(|_| ParseError::InvalidUtf8 { line: self.line_no })?;
        self.parse_raw_value(raw)
    }

    fn parse_raw_value(&self, raw: &str) -> Result<FieldValue, ParseError> {
        if raw.is_empty() {
            return Err(self.syntax("missing field value"));
        }

        match raw {
            "t" | "T" | "true" | "True" | "TRUE" => return Ok(FieldValue::Bool(true)),
            "f" | "F" | "false" | "False" | "FALSE" => return Ok(FieldValue::Bool(false)),
            _ => {}
        }

        if let Some(digits) = raw.strip_suffix('i') {
            return digits
                .parse::<i64>()
                .map(FieldValue::Int64)
                .map_err(|_| self.invalid_number(raw));
        }

        if let Some(digits) = raw.strip_suffix('u') {
            let unsigned: u64 = digits.parse().map_err(|_| self.invalid_number(raw))?;
            return i64::try_from(unsigned)
                .map(FieldValue::Int64)
                .map_err(|_| self.invalid_number(raw));
        }

        // Reject inf/nan spellings that f64::from_str would accept
        let starts_numeric = raw
            .bytes()
            .next()
            .map(|b| b.is_ascii_digit() || b == b'-' || b == b'+' || b == b'.')
            .unwrap_or(false);
        match raw.parse::<f64>() {
            Ok(v) if starts_numeric && v.is_finite() => Ok(FieldValue::Float64(v)),
            _ => Err(self.invalid_number(raw)),
        }
    }

    fn read_timestamp(&mut self) -> Result<i64, ParseError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b' ' {
                break;
            }
            self.pos += 1;
        }
        let line = self.line;
        let raw = std::str::from_utf8(&line[start..self.pos])
            .map_err(|_| ParseError::InvalidUtf8 { line: self.line_no })?;
        self.skip_spaces();

        let value: i64 = raw.parse().map_err(|_| ParseError::InvalidTimestamp {
            line: self.line_no,
            value: raw.to_string(),
        })?;
        value
            .checked_mul(self.precision.multiplier())
            .ok_or_else(|| ParseError::InvalidTimestamp {
                line: self.line_no,
                value: raw.to_string(),
            })
    }

    fn syntax(&self, reason: &'static str) -> ParseError {
        ParseError::Syntax {
            line: self.line_no,
            column: self.indent + self.pos + 1,
            reason,
        }
    }

    fn invalid_number(&self, raw: &str) -> ParseError {
        ParseError::InvalidNumber {
            line: self.line_no,
            value: raw.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}:{column}: {reason}")]
    Syntax {
        line: usize,
        column: usize,
        reason: &'static str,
    },

    #[error("line {line}: invalid UTF-8")]
    InvalidUtf8 { line: usize },

    #[error("line {line}: invalid number: {value}")]
    InvalidNumber { line: usize, value: String },

    #[error("line {line}: invalid timestamp: {value}")]
    InvalidTimestamp { line: usize, value: String },

    #[error("Invalid precision: {0}")]
    InvalidPrecision(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &str) -> Vec<Metric> {
        LineProtocolDecoder::new()
            .with_default_timestamp(42)
            .decode(input.as_bytes())
            .unwrap()
    }

    #[test]
    fn test_simple_line() {
        let metrics = decode("cpu,host=a,region=eu usage=0.5,count=3i 1000\n");
        assert_eq!(metrics.len(), 1);

        let m = &metrics[0];
        assert_eq!(m.name, "cpu");
        assert_eq!(m.timestamp, 1000);
        assert_eq!(m.tags.get("host").map(String::as_str), Some("a"));
        assert_eq!(m.tags.get("region").map(String::as_str), Some("eu"));
        assert_eq!(m.fields.get("usage"), Some(&FieldValue::Float64(0.5)));
        assert_eq!(m.fields.get("count"), Some(&FieldValue::Int64(3)));
    }

    #[test]
    fn test_value_kinds() {
        let metrics = decode(r#"m s="hello \"world\"",b=t,B=FALSE,u=7u,f=-1.5e3,i=-2i"#);
        let fields = &metrics[0].fields;
        assert_eq!(
            fields.get("s"),
            Some(&FieldValue::String(r#"hello "world""#.to_string()))
        );
        assert_eq!(fields.get("b"), Some(&FieldValue::Bool(true)));
        assert_eq!(fields.get("B"), Some(&FieldValue::Bool(false)));
        assert_eq!(fields.get("u"), Some(&FieldValue::Int64(7)));
        assert_eq!(fields.get("f"), Some(&FieldValue::Float64(-1500.0)));
        assert_eq!(fields.get("i"), Some(&FieldValue::Int64(-2)));
    }

    #[test]
    fn test_escapes() {
        let metrics = decode(r"my\ metric,tag\,key=va\ lue,k=a\=b field\ one=1i 5");
        let m = &metrics[0];
        assert_eq!(m.name, "my metric");
        assert_eq!(m.tags.get("tag,key").map(String::as_str), Some("va lue"));
        assert_eq!(m.tags.get("k").map(String::as_str), Some("a=b"));
        assert_eq!(m.fields.get("field one"), Some(&FieldValue::Int64(1)));
    }

    #[test]
    fn test_string_with_separators() {
        let metrics = decode(r#"log msg="a, b c=d",level="warn" 9"#);
        let fields = &metrics[0].fields;
        assert_eq!(fields.get("msg"), Some(&FieldValue::String("a, b c=d".into())));
        assert_eq!(fields.get("level"), Some(&FieldValue::String("warn".into())));
        assert_eq!(metrics[0].timestamp, 9);
    }

    #[test]
    fn test_missing_timestamp_uses_default() {
        let metrics = decode("cpu usage=1\ncpu usage=2");
        assert_eq!(metrics.len(), 2);
        assert!(metrics.iter().all(|m| m.timestamp == 42));
    }

    #[test]
    fn test_blank_and_comment_lines() {
        let metrics = decode("# header\n\ncpu usage=1 1\r\n   \nmem free=2i 2\n");
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[1].name, "mem");
    }

    #[test]
    fn test_precision() {
        let metrics = LineProtocolDecoder::new()
            .with_precision(Precision::Seconds)
            .decode(b"cpu usage=1 3")
            .unwrap();
        assert_eq!(metrics[0].timestamp, 3_000_000_000);
        assert_eq!("ms".parse::<Precision>().unwrap(), Precision::Milliseconds);
        assert!("hours".parse::<Precision>().is_err());
    }

    #[test]
    fn test_duplicate_field_last_wins() {
        let metrics = decode("cpu usage=1,usage=2 1");
        assert_eq!(metrics[0].fields.get("usage"), Some(&FieldValue::Float64(2.0)));
    }

    #[test]
    fn test_errors_carry_line_number() {
        let decoder = LineProtocolDecoder::new();

        let err = decoder.decode(b"cpu usage=1 1\ncpu 1").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 2, .. }));

        let err = decoder.decode(b"cpu").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 1, .. }));

        let err = decoder.decode(b"cpu usage=abc 1").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { line: 1, .. }));

        let err = decoder.decode(b"cpu usage=inf 1").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { .. }));

        let err = decoder.decode(b"cpu usage=1 12abc").unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimestamp { .. }));

        let err = decoder.decode(br#"cpu msg="open 1"#).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));

        let err = decoder.decode(b"cpu n=18446744073709551615u 1").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { .. }));
    }

    #[test]
    fn test_empty_batch() {
        assert!(decode("").is_empty());
        assert!(decode("\n\n").is_empty());
    }

    #[test]
    fn test_syntax_column_counts_leading_whitespace() {
        let decoder = LineProtocolDecoder::new();

        let err = decoder.decode(b"cpu value").unwrap_err();
        let ParseError::Syntax { line, column, .. } = err else {
            panic!("expected syntax error, got {:?}", err);
        };
        assert_eq!((line, column), (1, 10));

        let err = decoder.decode(b"ok v=1 1\n   cpu value").unwrap_err();
        let ParseError::Syntax { line, column, .. } = err else {
            panic!("expected syntax error, got {:?}", err);
        };
        assert_eq!((line, column), (2, 13));
    }
}
