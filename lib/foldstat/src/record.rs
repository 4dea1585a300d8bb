use memchr::memchr;
use thiserror::Error;

pub const RECORD_DELIMITER: u8 = b';';
pub const LINE_DELIMITER: u8 = b'\n';

/// One parsed `key;value` line, borrowing its key from the chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    pub key: &'a str,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("missing ';' delimiter")]
    MissingDelimiter,
    #[error("more than one ';' delimiter")]
    ExtraDelimiter,
    #[error("empty key")]
    EmptyKey,
    #[error("key is not valid UTF-8")]
    InvalidKey,
    #[error("invalid numeric value {0:?}")]
    InvalidValue(String),
}

/// Lines of a chunk split on `\n`, with a trailing `\r` stripped. A last line
/// without terminator is still yielded; the empty remainder after a final
/// newline is not.
pub fn lines(chunk: &[u8]) -> Lines<'_> {
    Lines { rest: chunk }
}

pub struct Lines<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.rest.is_empty() {
            return None;
        }
        let (line, rest) = match memchr(LINE_DELIMITER, self.rest) {
            Some(nl) => (&self.rest[..nl], &self.rest[nl + 1..]),
            None => (self.rest, &self.rest[self.rest.len()..]),
        };
        self.rest = rest;
        Some(line.strip_suffix(b"\r").unwrap_or(line))
    }
}

pub fn parse_record(line: &[u8]) -> Result<Record<'_>, MalformedRecord> {
    let sep = memchr(RECORD_DELIMITER, line).ok_or(MalformedRecord::MissingDelimiter)?;
    let (key, value) = (&line[..sep], &line[sep + 1..]);
    if memchr(RECORD_DELIMITER, value).is_some() {
        return Err(MalformedRecord::ExtraDelimiter);
    }
    if key.is_empty() {
        return Err(MalformedRecord::EmptyKey);
    }
    let key = std::str::from_utf8(key).map_err(|_| MalformedRecord::InvalidKey)?;
    let value = parse_value(value)?;
    Ok(Record { key, value })
}

/// `[+-]?digits[.digits]` with at least one digit somewhere.
fn parse_value(raw: &[u8]) -> Result<f64, MalformedRecord> {
    let invalid = || MalformedRecord::InvalidValue(String::from_utf8_lossy(raw).into_owned());
    let unsigned = match raw.first() {
        Some(b'+') | Some(b'-') => &raw[1..],
        _ => raw,
    };
    let (int, frac) = match memchr(b'.', unsigned) {
        Some(dot) => (&unsigned[..dot], &unsigned[dot + 1..]),
        None => (unsigned, &unsigned[unsigned.len()..]),
    };
    let all_digits = |s: &[u8]| s.iter().all(u8::is_ascii_digit);
    if int.len() + frac.len() == 0 || !all_digits(int) || !all_digits(frac) {
        return Err(invalid());
    }
    // validated as ASCII above
    let text = std::str::from_utf8(raw).map_err(|_| invalid())?;
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid()),
    }
}
