use std::fmt;

use crate::error::{Error, Result};

/// Body character encodings understood by the gateway core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    /// UTF-8
    #[default]
    Utf8,
    /// ISO-8859-1 (Latin-1)
    Iso8859_1,
    /// 7-bit US-ASCII
    UsAscii,
}

impl Charset {
    /// Looks up a charset by its IANA name or a common alias, ignoring case.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().trim_matches('"').to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1" | "latin-1" => {
                Some(Charset::Iso8859_1)
            }
            "us-ascii" | "ascii" => Some(Charset::UsAscii),
            _ => None,
        }
    }

    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Iso8859_1 => "iso-8859-1",
            Charset::UsAscii => "us-ascii",
        }
    }

    /// Decodes `bytes` into a string.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| self.error(e)),
            Charset::Iso8859_1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Charset::UsAscii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(index) => Err(self.error(format_args!("non-ASCII byte at offset {}", index))),
                None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            },
        }
    }

    /// Encodes `text` into bytes.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        let limit = match self {
            Charset::Utf8 => return Ok(text.as_bytes().to_vec()),
            Charset::Iso8859_1 => 0xFF,
            Charset::UsAscii => 0x7F,
        };
        text.chars()
            .map(|c| {
                u8::try_from(u32::from(c))
                    .ok()
                    .filter(|&b| u32::from(b) <= limit)
                    .ok_or_else(|| self.error(format_args!("character {:?} is not representable", c)))
            })
            .collect()
    }

    fn error(self, reason: impl fmt::Display) -> Error {
        Error::Encoding {
            charset: self.name(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A media type plus the charset its body is encoded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    media_type: String,
    charset: Charset,
}

impl ContentType {
    /// Creates a content type from its parts.
    pub fn new(media_type: impl Into<String>, charset: Charset) -> Self {
        Self {
            media_type: media_type.into().to_ascii_lowercase(),
            charset,
        }
    }

    /// Parses a header value such as `text/xml; charset=ISO-8859-1`.
    ///
    /// Parameters other than `charset` are ignored. A missing charset means UTF-8.
    pub fn parse(value: &str) -> std::result::Result<Self, String> {
        let mut parts = value.split(';');
        let media_type = parts.next().unwrap_or_default().trim();
        match media_type.split_once('/') {
            Some((kind, sub)) if !kind.trim().is_empty() && !sub.trim().is_empty() => {}
            _ => return Err(format!("'{}' is not a media type", value)),
        }

        let mut charset = Charset::Utf8;
        for param in parts {
            let Some((key, val)) = param.split_once('=') else {
                continue;
            };
            if key.trim().eq_ignore_ascii_case("charset") {
                charset = Charset::from_label(val)
                    .ok_or_else(|| format!("unsupported charset '{}'", val.trim()))?;
            }
        }
        Ok(Self::new(media_type, charset))
    }

    /// Returns the lower-case `type/subtype`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Returns the declared charset.
    pub fn charset(&self) -> Charset {
        self.charset
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::new("text/plain", Charset::Utf8)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; charset={}", self.media_type, self.charset)
    }
}
