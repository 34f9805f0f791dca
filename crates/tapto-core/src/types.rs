use crate::{Result, constants::DEVICE_SPEC_SEPARATOR, error::Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of physical tag behind a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenType {
    /// NTAG21x family.
    Ntag,

    /// Mifare Classic family.
    Mifare,

    /// Anything the reader could not classify.
    #[default]
    Unknown,
}

impl TokenType {
    /// Get a human-readable name for the token type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ntag => "NTAG",
            Self::Mifare => "MIFARE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded identity and payload of a scanned tag.
///
/// Tokens are plain values: once built they are only cloned and compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Hardware identifier, hex encoded.
    pub uid: String,

    /// Tag family.
    #[serde(rename = "type")]
    pub kind: TokenType,

    /// Decoded text record, empty when the tag carries none.
    pub text: String,

    /// Raw payload, hex encoded.
    pub data: String,

    /// When the tag was read.
    pub scan_time: DateTime<Utc>,

    /// Device spec of the reader that produced the token.
    pub source: String,

    /// Token was injected through the API instead of a physical scan.
    #[serde(default)]
    pub from_api: bool,
}

impl Token {
    /// Create a token read from `source` at the current time.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapto_core::{Token, TokenType};
    ///
    /// let token = Token::new("04a1b2c3", TokenType::Ntag, "pn532_uart:/dev/ttyUSB0")
    ///     .with_text("**launch.random:snes")
    ///     .with_data("d1010e54");
    ///
    /// assert_eq!(token.text, "**launch.random:snes");
    /// assert!(!token.from_api);
    /// ```
    pub fn new(uid: impl Into<String>, kind: TokenType, source: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind,
            text: String::new(),
            data: String::new(),
            scan_time: Utc::now(),
            source: source.into(),
            from_api: false,
        }
    }

    /// Set the decoded text record.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the raw payload.
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    /// Set the scan time.
    pub fn with_scan_time(mut self, scan_time: DateTime<Utc>) -> Self {
        self.scan_time = scan_time;
        self
    }

    /// Mark the token as coming from the API.
    pub fn via_api(mut self) -> Self {
        self.from_api = true;
        self
    }

    /// Identity used for debouncing: same UID and same text.
    #[must_use]
    pub fn same_identity(&self, other: &Token) -> bool {
        self.uid == other.uid && self.text == other.text
    }

    /// Identity plus payload, used by drivers to decide whether a re-read
    /// tag changed.
    #[must_use]
    pub fn same_contents(&self, other: &Token) -> bool {
        self.same_identity(other) && self.data == other.data
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} [{}]", self.kind, self.uid, self.text)
    }
}

/// Debounce comparison over optional tokens.
///
/// Two absent tokens are equal, so repeated removals collapse into one.
///
/// ```
/// use tapto_core::{Token, TokenType, same_token};
///
/// let a = Token::new("01", TokenType::Ntag, "mock:0");
/// assert!(same_token(Some(&a), Some(&a.clone())));
/// assert!(same_token(None, None));
/// assert!(!same_token(Some(&a), None));
/// ```
#[must_use]
pub fn same_token(a: Option<&Token>, b: Option<&Token>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same_identity(b),
        (None, None) => true,
        _ => false,
    }
}

/// Event emitted by a reader driver.
///
/// A scan without a token is a removal. A scan with an error reports a
/// failed read and its token is meaningless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// Device spec of the emitting reader.
    pub source: String,

    /// Token now present, `None` when the tag was removed.
    pub token: Option<Token>,

    /// Read failure message for this cycle.
    pub error: Option<String>,
}

impl Scan {
    /// A tag was presented.
    pub fn inserted(source: impl Into<String>, token: Token) -> Self {
        Self {
            source: source.into(),
            token: Some(token),
            error: None,
        }
    }

    /// The tag left the field.
    pub fn removed(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            token: None,
            error: None,
        }
    }

    /// Reading failed.
    pub fn failed(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            token: None,
            error: Some(error.into()),
        }
    }

    /// Check whether this scan reports a read failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Parsed `<reader-id>:<path>` device string.
///
/// The string is split on the first separator only, so Windows drive paths
/// and paths with colons survive intact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceSpec {
    reader: String,
    path: String,
}

impl DeviceSpec {
    /// Build a device spec from its parts.
    pub fn new(reader: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            reader: reader.into(),
            path: path.into(),
        }
    }

    /// Parse a device string.
    ///
    /// # Errors
    /// Returns `Error::InvalidDeviceSpec` when the separator is missing or
    /// either side of it is empty.
    pub fn parse(spec: &str) -> Result<Self> {
        match spec.split_once(DEVICE_SPEC_SEPARATOR) {
            Some((reader, path)) if !reader.is_empty() && !path.is_empty() => {
                Ok(Self::new(reader, path))
            }
            _ => Err(Error::InvalidDeviceSpec(spec.to_string())),
        }
    }

    /// Check the reader id against the ids a driver claims.
    ///
    /// # Errors
    /// Returns `Error::UnknownReader` when the id is not claimed.
    pub fn expect_reader(&self, ids: &[&str]) -> Result<()> {
        if ids.contains(&self.reader.as_str()) {
            Ok(())
        } else {
            Err(Error::UnknownReader(self.reader.clone()))
        }
    }

    /// Reader variant id.
    #[must_use]
    pub fn reader(&self) -> &str {
        &self.reader
    }

    /// Transport path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}{}", self.reader, DEVICE_SPEC_SEPARATOR, self.path)
    }
}

impl std::str::FromStr for DeviceSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceSpec::parse(s)
    }
}
