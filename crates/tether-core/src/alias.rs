use crate::codec;
use crate::error::{CoreError, Result};
use crate::shortcode::{ShortCode, MAX_LENGTH};
use std::collections::HashSet;

/// Words that may not be claimed as custom aliases by default.
///
/// They collide with paths the serving layer keeps for itself.
pub const DEFAULT_RESERVED_WORDS: &[&str] = &[
    "api",
    "admin",
    "health",
    "metrics",
    "docs",
    "swagger",
    "actuator",
    "management",
    "error",
    "login",
    "logout",
    "index",
    "home",
    "about",
    "help",
    "contact",
    "privacy",
    "terms",
    "www",
    "ftp",
    "mail",
    "email",
];

/// Static validation rules for caller-supplied aliases.
///
/// The policy never consults the store: uniqueness is checked by the
/// creation workflow and ultimately enforced by the store's unique index.
#[derive(Debug, Clone)]
pub struct AliasPolicy {
    reserved: HashSet<String>,
}

impl AliasPolicy {
    /// Creates a policy with [`DEFAULT_RESERVED_WORDS`].
    pub fn new() -> Self {
        Self::with_reserved_words(DEFAULT_RESERVED_WORDS.iter().copied())
    }

    /// Creates a policy with a custom reserved-word set.
    ///
    /// Words are matched case-insensitively.
    pub fn with_reserved_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            reserved: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn is_reserved(&self, alias: &str) -> bool {
        self.reserved.contains(&alias.to_lowercase())
    }

    /// Validates a custom alias and returns it, trimmed, as a [`ShortCode`].
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArgument`] if the alias is blank, longer than
    /// [`MAX_LENGTH`], uses a symbol outside the codec alphabet, or is a
    /// reserved word.
    pub fn validate_custom_alias(&self, alias: &str) -> Result<ShortCode> {
        let alias = alias.trim();

        if alias.is_empty() {
            return Err(CoreError::InvalidArgument(
                "custom alias cannot be blank".to_string(),
            ));
        }

        let length = alias.chars().count();
        if length > MAX_LENGTH {
            return Err(CoreError::InvalidArgument(format!(
                "custom alias must be at most {MAX_LENGTH} characters, got {length}"
            )));
        }

        if !codec::is_valid_alphabet(alias) {
            return Err(CoreError::InvalidArgument(format!(
                "custom alias may only contain digits and ASCII letters: '{alias}'"
            )));
        }

        if self.is_reserved(alias) {
            return Err(CoreError::InvalidArgument(format!(
                "custom alias is a reserved word: '{alias}'"
            )));
        }

        Ok(ShortCode::new_unchecked(alias))
    }
}

impl Default for AliasPolicy {
    fn default() -> Self {
        Self::new()
    }
}
