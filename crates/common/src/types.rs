use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TOKEN_LEN: usize = 8;

fn random_suffix() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..TOKEN_LEN].to_uppercase()
}

/// Unique identifier for an order.
///
/// An opaque, human-scannable token: the `OD` prefix followed by eight
/// uppercase hex characters drawn from a freshly generated UUID. Generated
/// once at order creation and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generates a new random order ID.
    pub fn generate() -> Self {
        Self(format!("OD{}", random_suffix()))
    }

    /// Wraps a raw token received from a caller (e.g. a gateway callback).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for an order line.
///
/// Same token scheme as [`OrderId`], with the `OL` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    /// Generates a new random line ID.
    pub fn generate() -> Self {
        Self(format!("OL{}", random_suffix()))
    }

    /// Wraps a raw token.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LineId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for LineId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
