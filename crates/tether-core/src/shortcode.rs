use crate::codec;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Maximum length of any short code, generated or custom.
pub const MAX_LENGTH: usize = 20;

/// A short code identifying a link.
///
/// Generated codes come from [`ShortCode::generated`]; custom codes are
/// produced by [`AliasPolicy::validate_custom_alias`](crate::AliasPolicy).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    /// Derives the system code for a store-assigned link id.
    pub fn generated(id: i64) -> Result<Self> {
        codec::encode(id).map(Self)
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes coming from trusted sources such as the store
    /// or a request path that is looked up, never inserted.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns `true` if the code could be a stored code: non-empty, at most
    /// [`MAX_LENGTH`] characters, alphabet symbols only.
    pub fn is_well_formed(code: &str) -> bool {
        code.len() <= MAX_LENGTH && codec::is_valid_alphabet(code)
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_uses_codec() {
        assert_eq!(ShortCode::generated(0).unwrap().as_str(), "0");
        assert_eq!(ShortCode::generated(62).unwrap().as_str(), "10");
        assert!(ShortCode::generated(-5).is_err());
    }

    #[test]
    fn well_formed_codes() {
        assert!(ShortCode::is_well_formed("abc"));
        assert!(ShortCode::is_well_formed(&"a".repeat(20)));
        assert!(!ShortCode::is_well_formed(&"a".repeat(21)));
        assert!(!ShortCode::is_well_formed(""));
        assert!(!ShortCode::is_well_formed("my-code"));
    }

    #[test]
    fn to_url_joins_base() {
        let code = ShortCode::new_unchecked("abc123");
        assert_eq!(code.to_url("https://teth.er"), "https://teth.er/abc123");
        assert_eq!(code.to_url("https://teth.er/"), "https://teth.er/abc123");
    }
}
