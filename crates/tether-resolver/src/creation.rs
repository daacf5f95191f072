use crate::error::{ResolverError, Result};
use std::sync::Arc;
use tether_core::record::{MAX_DESCRIPTION_LENGTH, MAX_TARGET_LENGTH};
use tether_core::{AliasPolicy, ConflictKey, LinkStore, NewShortLink, ShortCode, ShortLink, StorageError};
use tracing::{debug, info, warn};

/// Prefix of the temporary code a system link holds between insert and
/// backfill. `~` is outside the codec alphabet, so a placeholder can never
/// collide with a real code and never resolves.
pub const PLACEHOLDER_PREFIX: char = '~';

fn placeholder() -> ShortCode {
    ShortCode::new_unchecked(format!("{PLACEHOLDER_PREFIX}{:016x}", rand::random::<u64>()))
}

fn is_placeholder(code: &ShortCode) -> bool {
    code.as_str().starts_with(PLACEHOLDER_PREFIX)
}

/// Validates a target address and returns it trimmed.
///
/// The address must be non-blank, at most [`MAX_TARGET_LENGTH`] characters,
/// use the `http` or `https` scheme, and name a host.
pub fn validate_target(target: &str) -> Result<&str> {
    let target = target.trim();

    if target.is_empty() {
        return Err(ResolverError::InvalidArgument(
            "target address cannot be blank".to_string(),
        ));
    }

    let length = target.chars().count();
    if length > MAX_TARGET_LENGTH {
        return Err(ResolverError::InvalidArgument(format!(
            "target address must be at most {MAX_TARGET_LENGTH} characters, got {length}"
        )));
    }

    let Some((scheme, rest)) = target.split_once("://") else {
        return Err(ResolverError::InvalidArgument(format!(
            "target address must be an absolute http(s) URL: '{target}'"
        )));
    };

    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return Err(ResolverError::InvalidArgument(format!(
            "unsupported scheme '{scheme}', expected http or https"
        )));
    }

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(ResolverError::InvalidArgument(format!(
            "target address has no valid host: '{target}'"
        )));
    }

    Ok(target)
}

fn validate_description(description: Option<String>) -> Result<Option<String>> {
    let Some(description) = description else {
        return Ok(None);
    };
    let description = description.trim();
    if description.is_empty() {
        return Ok(None);
    }

    let length = description.chars().count();
    if length > MAX_DESCRIPTION_LENGTH {
        return Err(ResolverError::InvalidArgument(format!(
            "description must be at most {MAX_DESCRIPTION_LENGTH} characters, got {length}"
        )));
    }
    Ok(Some(description.to_string()))
}

/// Creates links against the store.
///
/// System codes are derived from the store-assigned id, so a link is first
/// inserted under a placeholder and then backfilled with `encode(id)`.
/// Repeated requests for one target return the same link; the store's unique
/// index on system targets arbitrates concurrent first requests.
#[derive(Debug)]
pub struct LinkCreator<S> {
    store: Arc<S>,
    policy: AliasPolicy,
}

impl<S> Clone for LinkCreator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy.clone(),
        }
    }
}

impl<S: LinkStore> LinkCreator<S> {
    pub fn new(store: Arc<S>, policy: AliasPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &AliasPolicy {
        &self.policy
    }

    /// Returns the system-generated link for `target`, creating it if needed.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the target fails validation
    /// - `Overflow` if the assigned id cannot be encoded
    /// - `Storage` for store faults
    pub async fn create_system_code(&self, target: &str) -> Result<ShortLink> {
        let target = validate_target(target)?;

        if let Some(existing) = self.store.find_by_target(target).await? {
            debug!(target_address = target, id = existing.id, "Target already has a system code");
            return self.backfill(existing).await;
        }

        let inserted = match self
            .store
            .insert(NewShortLink::system(target, placeholder()))
            .await
        {
            Ok(link) => link,
            Err(StorageError::Conflict {
                key: ConflictKey::Target,
                value,
            }) => {
                debug!(target_address = target, "Lost the race to create a system code, reusing the winner");
                let winner = self.store.find_by_target(target).await?.ok_or(
                    StorageError::Conflict {
                        key: ConflictKey::Target,
                        value,
                    },
                )?;
                return self.backfill(winner).await;
            }
            Err(e) => return Err(e.into()),
        };

        let link = self.backfill(inserted).await?;
        info!(id = link.id, code = %link.code, target_address = target, "Created system short code");
        Ok(link)
    }

    /// Creates a link under a caller-chosen alias.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the target, alias or description is invalid
    /// - `Conflict` if the alias is already in use
    /// - `Storage` for store faults
    pub async fn create_custom_code(
        &self,
        target: &str,
        alias: &str,
        description: Option<String>,
    ) -> Result<ShortLink> {
        let target = validate_target(target)?;
        let alias = self.policy.validate_custom_alias(alias)?;
        let description = validate_description(description)?;

        if self.store.exists_by_code(alias.as_str()).await? {
            return Err(ResolverError::Conflict(format!(
                "alias '{alias}' is already in use"
            )));
        }

        match self
            .store
            .insert(NewShortLink::custom(target, alias.clone(), description))
            .await
        {
            Ok(link) => {
                info!(id = link.id, code = %link.code, target_address = target, "Created custom alias");
                Ok(link)
            }
            Err(StorageError::Conflict {
                key: ConflictKey::Code,
                ..
            }) => Err(ResolverError::Conflict(format!(
                "alias '{alias}' is already in use"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces a placeholder code with `encode(id)`.
    ///
    /// The code depends only on the id, so racing backfills of one row all
    /// write the same value. Rows left holding a placeholder by an
    /// interrupted creation are repaired here on the next request for their
    /// target.
    async fn backfill(&self, link: ShortLink) -> Result<ShortLink> {
        if link.is_custom_alias || !is_placeholder(&link.code) {
            return Ok(link);
        }

        let code = ShortCode::generated(link.id)?;
        match self.store.update(ShortLink { code, ..link }).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                warn!(error = %e, "Failed to backfill system code");
                Err(e.into())
            }
        }
    }
}
