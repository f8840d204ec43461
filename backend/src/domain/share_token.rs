//! Single-use room invite codes.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters allowed in a share token. Excludes I, L and O.
pub const SHARE_TOKEN_ALPHABET: &str = "ABCDEFGHJKMNPQRSTUVWXYZ0123456789";
/// Number of characters in a share token.
pub const SHARE_TOKEN_LEN: usize = 5;

/// Rejected token text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShareTokenError {
    #[error("share token must be {SHARE_TOKEN_LEN} characters")]
    WrongLength,
    #[error("share token contains a character outside the allowed alphabet")]
    InvalidCharacter,
}

/// An issued invite code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShareToken(String);

impl ShareToken {
    /// Validate token text against the alphabet and length.
    ///
    /// # Examples
    /// ```
    /// use household::domain::ShareToken;
    ///
    /// assert!(ShareToken::parse("K7M3P").is_ok());
    /// assert!(ShareToken::parse("K7M3O").is_err());
    /// ```
    pub fn parse(raw: impl Into<String>) -> Result<Self, ShareTokenError> {
        let raw = raw.into();
        if raw.chars().count() != SHARE_TOKEN_LEN {
            return Err(ShareTokenError::WrongLength);
        }
        if !raw.chars().all(|c| SHARE_TOKEN_ALPHABET.contains(c)) {
            return Err(ShareTokenError::InvalidCharacter);
        }
        Ok(Self(raw))
    }

    /// Exact comparison against caller-supplied text. No case folding.
    pub fn matches(&self, supplied: &str) -> bool {
        self.0 == supplied
    }
}

impl AsRef<str> for ShareToken {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<ShareToken> for String {
    fn from(value: ShareToken) -> Self {
        value.0
    }
}

impl TryFrom<String> for ShareToken {
    type Error = ShareTokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Source of fresh share tokens.
pub trait ShareTokenSource: Send + Sync {
    fn next_token(&self) -> ShareToken;
}

/// Draws tokens uniformly from [`SHARE_TOKEN_ALPHABET`] using the thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomShareTokenSource;

impl ShareTokenSource for RandomShareTokenSource {
    fn next_token(&self) -> ShareToken {
        let alphabet = SHARE_TOKEN_ALPHABET.as_bytes();
        let mut rng = rand::thread_rng();
        let token: String = (0..SHARE_TOKEN_LEN)
            .map(|_| char::from(alphabet[rng.gen_range(0..alphabet.len())]))
            .collect();
        ShareToken(token)
    }
}
