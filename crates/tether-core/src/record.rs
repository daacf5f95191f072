use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Maximum length of a target address.
pub const MAX_TARGET_LENGTH: usize = 2048;

/// Maximum length of a link description.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// A stored short link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    /// Store-assigned identity; the codec input for system codes.
    pub id: i64,
    /// The address the code resolves to.
    pub target_address: String,
    /// The short code, unique across all links.
    pub code: ShortCode,
    /// `true` if `code` was supplied by the caller.
    pub is_custom_alias: bool,
    /// Number of recorded resolutions.
    pub access_count: i64,
    pub created_at: Timestamp,
    pub last_updated_at: Timestamp,
    pub description: Option<String>,
}

/// The payload for inserting a new link; the store assigns the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShortLink {
    pub target_address: String,
    pub code: ShortCode,
    pub is_custom_alias: bool,
    pub description: Option<String>,
}

impl NewShortLink {
    /// A system-generated link whose real code is backfilled after insert.
    pub fn system(target_address: impl Into<String>, placeholder: ShortCode) -> Self {
        Self {
            target_address: target_address.into(),
            code: placeholder,
            is_custom_alias: false,
            description: None,
        }
    }

    /// A link with a caller-supplied alias.
    pub fn custom(
        target_address: impl Into<String>,
        alias: ShortCode,
        description: Option<String>,
    ) -> Self {
        Self {
            target_address: target_address.into(),
            code: alias,
            is_custom_alias: true,
            description,
        }
    }

    /// Builds the stored record for a freshly assigned id.
    pub fn into_link(self, id: i64, now: Timestamp) -> ShortLink {
        ShortLink {
            id,
            target_address: self.target_address,
            code: self.code,
            is_custom_alias: self.is_custom_alias,
            access_count: 0,
            created_at: now,
            last_updated_at: now,
            description: self.description,
        }
    }
}
