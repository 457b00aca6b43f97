//! Session-start reconciliation.
//!
//! Produces one authoritative `OnboardingProgress` from up to three
//! candidate sources: the cached local record, the loose per-field draft
//! cache, and the remote record. Last-write-wins at whole-record
//! granularity; ties favor the local copy.

use log::{info, warn};
use uuid::Uuid;

use crate::domain::{InvitationData, OnboardingProgress, WizardStep};
use crate::infrastructure::LocalDraftStore;
use crate::interface::{Clock, RemoteProgressGateway};

/// Which candidate became authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileSource {
    Local,
    Remote,
    Fresh,
}

#[derive(Debug)]
pub struct ReconcileOutcome {
    pub progress: OnboardingProgress,
    pub source: ReconcileSource,
    /// True when the session is running local-only because the remote
    /// store was unreachable or rejected the initial create.
    pub degraded: bool,
}

pub struct ProgressReconciler;

impl ProgressReconciler {
    pub async fn reconcile(
        drafts: &LocalDraftStore,
        gateway: &dyn RemoteProgressGateway,
        invitation: Option<&InvitationData>,
        session_email: Option<&str>,
        invitation_token: Option<&str>,
        initial_step: WizardStep,
        clock: &dyn Clock,
    ) -> ReconcileOutcome {
        // Local candidate: cached record with the loose field cache merged
        // in. The field cache wins on collision; it may hold edits that
        // never made it into a saved record.
        let loose_fields = drafts.fields();
        let local = drafts.load_progress().map(|mut progress| {
            for (name, value) in &loose_fields {
                progress.step_data.insert(name.clone(), value.clone());
            }
            progress
        });

        let email = session_email
            .map(str::to_string)
            .or_else(|| invitation.map(|inv| inv.email.clone()))
            .or_else(|| local.as_ref().map(|p| p.email.clone()));

        let Some(email) = email else {
            // No resolvable identity: run purely local.
            return match local {
                Some(progress) => {
                    info!("No identity available; keeping local progress");
                    ReconcileOutcome {
                        progress,
                        source: ReconcileSource::Local,
                        degraded: false,
                    }
                }
                None => {
                    info!("No identity and no cached progress; starting fresh locally");
                    let progress = Self::fresh_record(
                        drafts,
                        String::new(),
                        invitation,
                        invitation_token,
                        initial_step,
                        clock,
                    );
                    ReconcileOutcome {
                        progress,
                        source: ReconcileSource::Fresh,
                        degraded: false,
                    }
                }
            };
        };

        match gateway.fetch(&email, invitation_token).await {
            Ok(Some(remote)) => Self::pick_newer(drafts, local, remote),
            Ok(None) => match local {
                Some(progress) => {
                    info!("No remote record; keeping local progress");
                    ReconcileOutcome {
                        progress,
                        source: ReconcileSource::Local,
                        degraded: false,
                    }
                }
                None => {
                    Self::create_fresh(
                        drafts,
                        gateway,
                        email,
                        invitation,
                        invitation_token,
                        initial_step,
                        clock,
                    )
                    .await
                }
            },
            Err(e) => {
                warn!("Remote fetch failed ({}); running in degraded mode", e);
                match local {
                    Some(progress) => ReconcileOutcome {
                        progress,
                        source: ReconcileSource::Local,
                        degraded: true,
                    },
                    None => ReconcileOutcome {
                        progress: Self::fresh_record(
                            drafts,
                            email,
                            invitation,
                            invitation_token,
                            initial_step,
                            clock,
                        ),
                        source: ReconcileSource::Fresh,
                        degraded: true,
                    },
                }
            }
        }
    }

    /// Strictly-greater-than on `last_updated`; equal timestamps keep the
    /// local copy. A newer remote record replaces local state wholesale,
    /// including the loose field cache.
    fn pick_newer(
        drafts: &LocalDraftStore,
        local: Option<OnboardingProgress>,
        remote: OnboardingProgress,
    ) -> ReconcileOutcome {
        match local {
            Some(local) if remote.last_updated <= local.last_updated => {
                info!("Local progress is current; remote copy not adopted");
                ReconcileOutcome {
                    progress: local,
                    source: ReconcileSource::Local,
                    degraded: false,
                }
            }
            _ => {
                info!(
                    "Adopting remote progress (last_updated {})",
                    remote.last_updated
                );
                if let Err(e) = drafts.save_progress(&remote) {
                    warn!("Failed to persist adopted remote progress: {}", e);
                }
                if let Err(e) = drafts.replace_fields(&remote.step_data) {
                    warn!("Failed to rewrite field cache: {}", e);
                }
                ReconcileOutcome {
                    progress: remote,
                    source: ReconcileSource::Remote,
                    degraded: false,
                }
            }
        }
    }

    async fn create_fresh(
        drafts: &LocalDraftStore,
        gateway: &dyn RemoteProgressGateway,
        email: String,
        invitation: Option<&InvitationData>,
        invitation_token: Option<&str>,
        initial_step: WizardStep,
        clock: &dyn Clock,
    ) -> ReconcileOutcome {
        let progress = Self::fresh_record(
            drafts,
            email.clone(),
            invitation,
            invitation_token,
            initial_step,
            clock,
        );

        // Best-effort remote create; a failure leaves the session
        // local-only and is retried by ordinary auto-save.
        let degraded = match gateway
            .update(
                &email,
                progress.current_step,
                &progress.step_data,
                &progress.completed_steps,
                invitation_token,
            )
            .await
        {
            Ok(true) => {
                info!("Created remote progress record for {}", email);
                false
            }
            Ok(false) => {
                warn!("Remote create was rejected; continuing locally");
                true
            }
            Err(e) => {
                warn!("Remote create failed ({}); continuing locally", e);
                true
            }
        };

        ReconcileOutcome {
            progress,
            source: ReconcileSource::Fresh,
            degraded,
        }
    }

    fn fresh_record(
        drafts: &LocalDraftStore,
        email: String,
        invitation: Option<&InvitationData>,
        invitation_token: Option<&str>,
        initial_step: WizardStep,
        clock: &dyn Clock,
    ) -> OnboardingProgress {
        let mut progress = OnboardingProgress::new(
            Uuid::new_v4().to_string(),
            email,
            initial_step,
            clock.now_ms(),
        );
        progress.invitation_based = invitation.is_some();
        progress.invitation_token = invitation_token.map(str::to_string);
        // Loose drafts from a session that never saved a record are still
        // worth keeping.
        progress.step_data = drafts.fields();
        if let Err(e) = drafts.save_progress(&progress) {
            warn!("Failed to persist fresh progress record: {}", e);
        }
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldValue;
    use crate::interface::clock::testing::FixedClock;
    use crate::interface::MockRemoteProgressGateway;
    use tempfile::TempDir;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn store(dir: &TempDir) -> LocalDraftStore {
        LocalDraftStore::new(dir.path(), "onboarding_field_")
    }

    fn record(last_updated: i64, marker: &str) -> OnboardingProgress {
        let mut progress = OnboardingProgress::new(
            "u-1".to_string(),
            "coach@example.com".to_string(),
            WizardStep::Contact,
            last_updated,
        );
        progress
            .step_data
            .insert("marker".to_string(), FieldValue::from(marker));
        progress
    }

    #[tokio::test]
    async fn test_strictly_newer_remote_wins_and_is_persisted() {
        let dir = TempDir::new().unwrap();
        let drafts = store(&dir);
        drafts.save_progress(&record(100, "local")).unwrap();

        let mut gateway = MockRemoteProgressGateway::new();
        gateway
            .expect_fetch()
            .returning(|_, _| Ok(Some(record(200, "remote"))));

        let clock = FixedClock::at(NOW_MS);
        let outcome = ProgressReconciler::reconcile(
            &drafts,
            &gateway,
            None,
            Some("coach@example.com"),
            None,
            WizardStep::PersonalInfo,
            &clock,
        )
        .await;

        assert_eq!(outcome.source, ReconcileSource::Remote);
        assert_eq!(
            outcome.progress.step_data["marker"],
            FieldValue::from("remote")
        );
        // Adopted record replaces the local cache wholesale
        assert_eq!(drafts.load_progress().unwrap().last_updated, 200);
        assert_eq!(drafts.fields()["marker"], FieldValue::from("remote"));
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_local() {
        let dir = TempDir::new().unwrap();
        let drafts = store(&dir);
        drafts.save_progress(&record(100, "local")).unwrap();

        let mut gateway = MockRemoteProgressGateway::new();
        gateway
            .expect_fetch()
            .returning(|_, _| Ok(Some(record(100, "remote"))));

        let clock = FixedClock::at(NOW_MS);
        let outcome = ProgressReconciler::reconcile(
            &drafts,
            &gateway,
            None,
            Some("coach@example.com"),
            None,
            WizardStep::PersonalInfo,
            &clock,
        )
        .await;

        assert_eq!(outcome.source, ReconcileSource::Local);
        assert_eq!(
            outcome.progress.step_data["marker"],
            FieldValue::from("local")
        );
    }

    #[tokio::test]
    async fn test_loose_field_cache_wins_over_cached_step_data() {
        let dir = TempDir::new().unwrap();
        let drafts = store(&dir);
        drafts.save_progress(&record(300, "local")).unwrap();
        // An unsynced edit newer than the cached record
        drafts
            .set_field("marker", &FieldValue::from("unsynced"))
            .unwrap();

        let mut gateway = MockRemoteProgressGateway::new();
        gateway.expect_fetch().returning(|_, _| Ok(None));

        let clock = FixedClock::at(NOW_MS);
        let outcome = ProgressReconciler::reconcile(
            &drafts,
            &gateway,
            None,
            Some("coach@example.com"),
            None,
            WizardStep::PersonalInfo,
            &clock,
        )
        .await;

        assert_eq!(
            outcome.progress.step_data["marker"],
            FieldValue::from("unsynced")
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_local_unchanged() {
        let dir = TempDir::new().unwrap();
        let drafts = store(&dir);
        let local = record(100, "local");
        drafts.save_progress(&local).unwrap();

        let mut gateway = MockRemoteProgressGateway::new();
        gateway
            .expect_fetch()
            .returning(|_, _| Err(anyhow::anyhow!("network down")));

        let clock = FixedClock::at(NOW_MS);
        let outcome = ProgressReconciler::reconcile(
            &drafts,
            &gateway,
            None,
            Some("coach@example.com"),
            None,
            WizardStep::PersonalInfo,
            &clock,
        )
        .await;

        assert!(outcome.degraded);
        assert_eq!(outcome.source, ReconcileSource::Local);
        assert_eq!(outcome.progress, local);
    }

    #[tokio::test]
    async fn test_fresh_record_attempts_remote_create() {
        let dir = TempDir::new().unwrap();
        let drafts = store(&dir);

        let mut gateway = MockRemoteProgressGateway::new();
        gateway.expect_fetch().returning(|_, _| Ok(None));
        gateway
            .expect_update()
            .times(1)
            .returning(|_, _, _, _, _| Ok(true));

        let clock = FixedClock::at(NOW_MS);
        let outcome = ProgressReconciler::reconcile(
            &drafts,
            &gateway,
            None,
            Some("new@example.com"),
            None,
            WizardStep::PersonalInfo,
            &clock,
        )
        .await;

        assert_eq!(outcome.source, ReconcileSource::Fresh);
        assert!(!outcome.degraded);
        assert_eq!(outcome.progress.email, "new@example.com");
        assert_eq!(outcome.progress.last_updated, NOW_MS);
        assert!(outcome.progress.step_data.is_empty());
        // Fresh record is cached locally right away
        assert!(drafts.load_progress().is_some());
    }

    #[tokio::test]
    async fn test_failed_create_degrades_but_proceeds() {
        let dir = TempDir::new().unwrap();
        let drafts = store(&dir);

        let mut gateway = MockRemoteProgressGateway::new();
        gateway.expect_fetch().returning(|_, _| Ok(None));
        gateway
            .expect_update()
            .returning(|_, _, _, _, _| Err(anyhow::anyhow!("503")));

        let clock = FixedClock::at(NOW_MS);
        let outcome = ProgressReconciler::reconcile(
            &drafts,
            &gateway,
            None,
            Some("new@example.com"),
            None,
            WizardStep::PersonalInfo,
            &clock,
        )
        .await;

        assert_eq!(outcome.source, ReconcileSource::Fresh);
        assert!(outcome.degraded);
    }

    #[tokio::test]
    async fn test_no_identity_skips_remote_entirely() {
        let dir = TempDir::new().unwrap();
        let drafts = store(&dir);

        // No expectations: any gateway call would panic
        let gateway = MockRemoteProgressGateway::new();

        let clock = FixedClock::at(NOW_MS);
        let outcome = ProgressReconciler::reconcile(
            &drafts,
            &gateway,
            None,
            None,
            None,
            WizardStep::PersonalInfo,
            &clock,
        )
        .await;

        assert_eq!(outcome.source, ReconcileSource::Fresh);
        assert!(!outcome.degraded);
        assert!(outcome.progress.email.is_empty());
    }

    #[tokio::test]
    async fn test_invitation_supplies_identity() {
        let dir = TempDir::new().unwrap();
        let drafts = store(&dir);

        let invitation = InvitationData {
            email: "invited@example.com".to_string(),
            first_name: None,
            last_name: None,
            phone: None,
            phone_formatted: None,
            city: None,
            state: None,
            bio: None,
        };

        let mut gateway = MockRemoteProgressGateway::new();
        gateway
            .expect_fetch()
            .withf(|email, token| email == "invited@example.com" && token == &Some("tok-9"))
            .returning(|_, _| Ok(None));
        gateway
            .expect_update()
            .returning(|_, _, _, _, _| Ok(true));

        let clock = FixedClock::at(NOW_MS);
        let outcome = ProgressReconciler::reconcile(
            &drafts,
            &gateway,
            Some(&invitation),
            None,
            Some("tok-9"),
            WizardStep::PersonalInfo,
            &clock,
        )
        .await;

        assert!(outcome.progress.invitation_based);
        assert_eq!(
            outcome.progress.invitation_token.as_deref(),
            Some("tok-9")
        );
    }
}
