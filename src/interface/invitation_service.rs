use anyhow::Result;
use async_trait::async_trait;

use crate::domain::InvitationData;

/// External invitation-link validation service.
///
/// Resolves a one-time token to its profile payload, or None when the
/// token is invalid or expired.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvitationValidationService: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<InvitationData>>;
}
