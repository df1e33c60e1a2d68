#![forbid(unsafe_code)]

use std::fmt;

use percent_encoding::percent_decode_str;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieParseError {
    /// The escaped key still failed to compile (e.g. it exceeds the regex size limit).
    KeyPattern,
    /// A `%` not followed by two hex digits.
    MalformedEscape { offset: usize },
    /// Percent-decoded bytes are not UTF-8.
    InvalidUtf8,
}

impl fmt::Display for CookieParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyPattern => write!(f, "cookie key could not be compiled into a pattern"),
            Self::MalformedEscape { offset } => {
                write!(f, "malformed percent escape at byte {offset}")
            }
            Self::InvalidUtf8 => write!(f, "decoded cookie value is not valid utf-8"),
        }
    }
}

impl std::error::Error for CookieParseError {}

/// Reads one value out of a raw `Cookie` header (`a=1; b=2`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieReader;

impl CookieReader {
    /// First matching entry, URI-decoded. Anything malformed reads as absent.
    pub fn read(raw_cookie: &str, key: &str) -> Option<String> {
        Self::try_read(raw_cookie, key).unwrap_or(None)
    }

    pub fn try_read(raw_cookie: &str, key: &str) -> Result<Option<String>, CookieParseError> {
        let pattern = format!("(?:^|; ){}=([^;]*)", regex::escape(key));
        let re = Regex::new(&pattern).map_err(|_| CookieParseError::KeyPattern)?;
        let Some(value) = re.captures(raw_cookie).and_then(|c| c.get(1)) else {
            return Ok(None);
        };
        decode_uri_component(value.as_str()).map(Some)
    }
}

/// Percent-decoding with the strictness of `decodeURIComponent`: `+` stays literal,
/// a truncated or non-hex escape is an error.
pub fn decode_uri_component(raw: &str) -> Result<String, CookieParseError> {
    let bytes = raw.as_bytes();
    for (offset, _) in raw.match_indices('%') {
        let well_formed = bytes
            .get(offset + 1..offset + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !well_formed {
            return Err(CookieParseError::MalformedEscape { offset });
        }
    }
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| CookieParseError::InvalidUtf8)
}
