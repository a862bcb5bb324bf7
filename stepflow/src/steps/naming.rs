//! The name-based produces convention.
//!
//! A step named `SetGreeting` writes its result under `Greeting`, replacing
//! any existing value. A step named `EnsureName` writes under `Name` only if
//! nothing is stored there yet. Prefixes match regardless of case, so
//! camelCase (`getMessage`) and snake_case (`get_message`) names follow the
//! same rules.

use crate::store::WriteMode;
use serde::{Deserialize, Serialize};

/// Prefixes whose steps overwrite the inferred key.
pub const WRITE_PREFIXES: [&str; 3] = ["Set", "Update", "Overwrite"];

/// Prefixes whose steps only fill the inferred key when it is absent.
pub const ENSURE_PREFIXES: [&str; 3] = ["Get", "Ensure", "Add"];

/// How a step's result is written under its inferred key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducesMode {
    /// Write-prefixed: always overwrite.
    Write,
    /// Ensure-prefixed: keep an existing value.
    Ensure,
}

impl ProducesMode {
    /// Returns the store write mode for this convention.
    #[must_use]
    pub const fn write_mode(self) -> WriteMode {
        match self {
            Self::Write => WriteMode::Overwrite,
            Self::Ensure => WriteMode::SkipIfExists,
        }
    }
}

/// The key a step is presumed to produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Produces {
    /// The inferred store key.
    pub key: String,
    /// How the result is written.
    pub mode: ProducesMode,
}

impl Produces {
    /// Returns true if this key matches `name`, ignoring case.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.key.eq_ignore_ascii_case(name)
    }
}

/// Infers the produces key from a step name.
///
/// Returns `None` when the name carries no recognised prefix or the prefix
/// is not followed by a word boundary (`Settings` produces nothing).
#[must_use]
pub fn infer_produces(name: &str) -> Option<Produces> {
    let candidates = WRITE_PREFIXES
        .iter()
        .map(|prefix| (*prefix, ProducesMode::Write))
        .chain(
            ENSURE_PREFIXES
                .iter()
                .map(|prefix| (*prefix, ProducesMode::Ensure)),
        );

    for (prefix, mode) in candidates {
        if let Some(key) = strip_prefix(name, prefix) {
            return Some(Produces {
                key: key.to_string(),
                mode,
            });
        }
    }
    None
}

fn strip_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = &name[prefix.len()..];
    if let Some(key) = rest.strip_prefix('_') {
        return (!key.is_empty()).then_some(key);
    }
    rest.chars()
        .next()
        .is_some_and(char::is_uppercase)
        .then_some(rest)
}
