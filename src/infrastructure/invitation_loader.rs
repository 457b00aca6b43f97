//! Invitation token resolution with resolve-once semantics.
//!
//! A token is resolved against the validation service at most once per
//! session; the payload is cached in the draft store so a reload does not
//! re-resolve. A missing or invalid token is not fatal; the wizard simply
//! proceeds with every field editable.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::OnceCell;

use crate::domain::InvitationData;
use crate::infrastructure::LocalDraftStore;
use crate::interface::InvitationValidationService;

pub struct InvitationDataLoader {
    service: Arc<dyn InvitationValidationService>,
    drafts: Arc<LocalDraftStore>,
    resolved: OnceCell<Option<InvitationData>>,
}

impl InvitationDataLoader {
    pub fn new(
        service: Arc<dyn InvitationValidationService>,
        drafts: Arc<LocalDraftStore>,
    ) -> Self {
        Self {
            service,
            drafts,
            resolved: OnceCell::new(),
        }
    }

    /// Resolve the session's invitation payload, if any.
    ///
    /// The first call does the work; later calls return the same answer.
    pub async fn load(&self, token: Option<&str>) -> Option<InvitationData> {
        self.resolved
            .get_or_init(|| self.resolve(token))
            .await
            .clone()
    }

    async fn resolve(&self, token: Option<&str>) -> Option<InvitationData> {
        if let Some(cached) = self.drafts.load_invitation() {
            info!("Using cached invitation payload for {}", cached.email);
            return Some(cached);
        }

        let token = token?;
        match self.service.resolve(token).await {
            Ok(Some(invitation)) => {
                if let Err(e) = self.drafts.save_invitation(&invitation) {
                    warn!("Failed to cache invitation payload: {}", e);
                }
                info!("Resolved invitation token for {}", invitation.email);
                Some(invitation)
            }
            Ok(None) => {
                warn!("Invitation token invalid or expired; proceeding without pre-fill");
                None
            }
            Err(e) => {
                warn!(
                    "Invitation resolution failed ({}); proceeding without pre-fill",
                    e
                );
                None
            }
        }
    }
}
