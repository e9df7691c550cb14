use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Exchange prefixes the vendor uses in file and symbol names.
pub const EXCHANGES: [&str; 3] = ["sh", "sz", "bj"];

/// Exchange-qualified instrument identifier, e.g. `sh600000`.
///
/// The first two characters name the exchange; the remainder is the
/// instrument code that corporate actions are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("symbol '{0}' contains non-ASCII characters")]
    NonAscii(String),

    #[error("symbol '{0}' is too short")]
    TooShort(String),

    #[error("symbol '{0}' has unknown exchange prefix")]
    UnknownExchange(String),

    #[error("symbol '{0}' has a non-alphanumeric instrument code")]
    InvalidCode(String),
}

impl Symbol {
    /// Parse and validate an exchange-qualified symbol.
    pub fn parse(raw: &str) -> Result<Self, SymbolError> {
        let raw = raw.trim().to_ascii_lowercase();
        if !raw.is_ascii() {
            return Err(SymbolError::NonAscii(raw));
        }
        if raw.len() <= 2 {
            return Err(SymbolError::TooShort(raw));
        }
        if !EXCHANGES.contains(&&raw[..2]) {
            return Err(SymbolError::UnknownExchange(raw));
        }
        if !raw[2..].chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SymbolError::InvalidCode(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two-character exchange prefix.
    pub fn exchange(&self) -> &str {
        &self.0[..2]
    }

    /// Instrument code: the symbol with its exchange prefix dropped.
    pub fn code(&self) -> &str {
        &self.0[2..]
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
