//! Sensitive values and command text that carries them
//!
//! Anything derived from a token or private key travels as [`SecretValue`]
//! or [`MaskedText`]. Both only ever render their redacted form through
//! `Debug`/`Display`; the real text has to be asked for with `expose`.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// Placeholder written in place of secret material
pub const MASK: &str = "********";

/// An owned secret (token, private key) that can be cloned and deserialized
pub struct SecretValue(SecretString);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl Clone for SecretValue {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_owned())
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue::new)
    }
}

/// Shell text with a redacted twin
///
/// The exposed rendering goes to the remote runner; the masked rendering is
/// the only one allowed into logs, errors or persistence.
pub struct MaskedText {
    exposed: SecretString,
    masked: String,
}

impl MaskedText {
    /// Text without any secret in it
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            exposed: SecretString::from(text.clone()),
            masked: text,
        }
    }

    pub fn builder() -> MaskedTextBuilder {
        MaskedTextBuilder::default()
    }

    pub fn expose(&self) -> &str {
        self.exposed.expose_secret()
    }

    pub fn masked(&self) -> &str {
        &self.masked
    }

    /// True when the exposed rendering differs from the masked one
    pub fn is_sensitive(&self) -> bool {
        self.expose() != self.masked
    }

    /// Apply the same pure string transform to both renderings
    pub fn map(&self, transform: impl Fn(&str) -> String) -> MaskedText {
        MaskedText {
            exposed: SecretString::from(transform(self.expose())),
            masked: transform(&self.masked),
        }
    }
}

impl Clone for MaskedText {
    fn clone(&self) -> Self {
        Self {
            exposed: SecretString::from(self.expose().to_owned()),
            masked: self.masked.clone(),
        }
    }
}

impl PartialEq for MaskedText {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose() && self.masked == other.masked
    }
}

impl Eq for MaskedText {}

impl fmt::Debug for MaskedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MaskedText").field(&self.masked).finish()
    }
}

impl fmt::Display for MaskedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked)
    }
}

/// Incremental builder for [`MaskedText`]
#[derive(Default)]
pub struct MaskedTextBuilder {
    exposed: String,
    masked: String,
}

impl MaskedTextBuilder {
    pub fn text(mut self, text: &str) -> Self {
        self.exposed.push_str(text);
        self.masked.push_str(text);
        self
    }

    pub fn secret(mut self, secret: &str) -> Self {
        self.exposed.push_str(secret);
        self.masked.push_str(MASK);
        self
    }

    pub fn append(mut self, other: &MaskedText) -> Self {
        self.exposed.push_str(other.expose());
        self.masked.push_str(other.masked());
        self
    }

    pub fn build(self) -> MaskedText {
        MaskedText {
            exposed: SecretString::from(self.exposed),
            masked: self.masked,
        }
    }
}
