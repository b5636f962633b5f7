//! Credential wrapper used for the signing secret and API tokens.

use std::{borrow::Cow, fmt, ops::Deref};

use http::{header::InvalidHeaderValue, HeaderValue};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// A credential for a service. Generally any semi-secret item.
///
/// This wrapper prevents the value from appearing in debug reprs,
/// and wipes owned values from memory when dropped.
///
/// Use [Secret::revealed] to get the underlying value.
#[derive(Clone, Deserialize, Serialize)]
#[serde(from = "String")]
pub struct Secret(Cow<'static, str>);

impl Secret {
    /// Build a secret from user input, trimming surrounding whitespace.
    ///
    /// Returns `None` when nothing is left after trimming, so that a blank
    /// input is treated the same as a missing one.
    pub fn from_input(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Secret(trimmed.to_owned().into()))
        }
    }

    /// Read a secret from an environment variable.
    ///
    /// Blank values are treated as unset.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .and_then(|value| Self::from_input(&value))
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        if let Cow::Owned(ref mut s) = self.0 {
            s.zeroize()
        }
    }
}

/// Tiny wrapper struct to indicate that the inner object should
/// be directly printed in fmt::Debug implementations.
struct DirectDebug<D>(D);

impl<D> fmt::Debug for DirectDebug<D>
where
    D: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&DirectDebug("****")).finish()
    }
}

impl Secret {
    /// Expose the underlying value of this secret
    pub fn revealed(&self) -> &str {
        self.0.deref()
    }

    /// Raw bytes of the secret, as used for keyed hashing.
    pub fn as_bytes(&self) -> &[u8] {
        self.revealed().as_bytes()
    }

    /// Header value carrying this secret as a bearer token, marked sensitive.
    pub fn bearer(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut header = HeaderValue::try_from(format!("Bearer {}", self.revealed()))?;
        header.set_sensitive(true);
        Ok(header)
    }
}

impl From<Cow<'static, str>> for Secret {
    fn from(inner: Cow<'static, str>) -> Self {
        Secret(inner)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret(value.into())
    }
}

impl From<&'static str> for Secret {
    fn from(value: &'static str) -> Self {
        Secret(value.into())
    }
}
