//! Onboarding session façade.
//!
//! Composes the invitation loader, reconciler, validator, draft store,
//! and auto-save scheduler behind the mutation/query surface the wizard
//! UI talks to. Transport failures never escape this layer; the UI only
//! observes validation errors and the dirty/saving flags.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use log::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::domain::{FieldValue, FormData, OnboardingProgress, WizardStep};
use crate::infrastructure::{InvitationDataLoader, LocalDraftStore};
use crate::interface::{Clock, InvitationValidationService, RemoteProgressGateway};
use crate::services::autosave::{AutoSaveScheduler, SaveSink};
use crate::services::reconciler::ProgressReconciler;
use crate::services::validator::{StepValidator, ValidationErrors};

/// Per-session identity and entry point, created by the host when the
/// wizard mounts and dropped when it exits. There is no process-global
/// current-user lookup.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub email: Option<String>,
    pub invitation_token: Option<String>,
    pub initial_step: WizardStep,
}

struct EngineState {
    progress: OnboardingProgress,
    form: FormData,
    errors: ValidationErrors,
}

struct ControllerShared {
    gateway: Arc<dyn RemoteProgressGateway>,
    drafts: Arc<LocalDraftStore>,
    clock: Arc<dyn Clock>,
    invitation_token: Option<String>,
    state: RwLock<EngineState>,
    dirty: AtomicBool,
    degraded: AtomicBool,
    /// Bumped on every edit; lets a finishing save tell whether edits
    /// arrived while it was in flight.
    edit_generation: AtomicU64,
}

#[async_trait]
impl SaveSink for ControllerShared {
    fn has_unsaved(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    async fn save(&self) -> bool {
        // Snapshot as of the trigger time; the lock is not held across
        // the gateway call.
        let (email, current_step, step_data, completed_steps, generation) = {
            let state = match self.state.read() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            (
                state.progress.email.clone(),
                state.progress.current_step,
                state.form.editable_values(),
                state.progress.completed_steps.clone(),
                self.edit_generation.load(Ordering::SeqCst),
            )
        };

        if email.is_empty() {
            // No identity to key the remote record by; keep the local
            // cache current and stay dirty for when identity appears.
            debug!("No identity; skipping remote save");
            self.persist_snapshot(step_data, None);
            return false;
        }

        let result = self
            .gateway
            .update(
                &email,
                current_step,
                &step_data,
                &completed_steps,
                self.invitation_token.as_deref(),
            )
            .await;

        match result {
            Ok(true) => {
                let saved_at = self.clock.now_ms();
                self.persist_snapshot(step_data, Some(saved_at));
                // Edits that arrived mid-flight stay dirty for the next tick
                if self.edit_generation.load(Ordering::SeqCst) == generation {
                    self.dirty.store(false, Ordering::SeqCst);
                }
                self.degraded.store(false, Ordering::SeqCst);
                info!("Progress saved for {}", email);
                true
            }
            Ok(false) => {
                warn!("Remote save rejected; will retry on next tick");
                false
            }
            Err(e) => {
                error!("Remote save failed ({}); will retry on next tick", e);
                self.degraded.store(true, Ordering::SeqCst);
                false
            }
        }
    }
}

impl ControllerShared {
    /// Fold the saved snapshot back into the progress record and mirror
    /// it to the local cache.
    fn persist_snapshot(
        &self,
        step_data: BTreeMap<String, FieldValue>,
        saved_at: Option<i64>,
    ) {
        let progress = {
            let mut state = match self.state.write() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.progress.step_data = step_data;
            if let Some(saved_at) = saved_at {
                state.progress.last_updated = saved_at.max(state.progress.last_updated);
            }
            state.progress.clone()
        };
        if let Err(e) = self.drafts.save_progress(&progress) {
            warn!("Failed to mirror progress locally: {}", e);
        }
    }
}

pub struct OnboardingController {
    shared: Arc<ControllerShared>,
    scheduler: AutoSaveScheduler,
}

impl OnboardingController {
    /// Start an onboarding session: resolve the invitation (if any),
    /// reconcile local and remote progress into one authoritative record,
    /// and arm the periodic auto-save timer.
    ///
    /// Never fails on remote unavailability; the session degrades to
    /// local-only operation instead.
    pub async fn start(
        context: SessionContext,
        gateway: Arc<dyn RemoteProgressGateway>,
        invitation_service: Arc<dyn InvitationValidationService>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let drafts = Arc::new(LocalDraftStore::new(
            &config.storage_dir,
            &config.field_prefix,
        ));

        let loader = InvitationDataLoader::new(invitation_service, Arc::clone(&drafts));
        let invitation = loader.load(context.invitation_token.as_deref()).await;

        let outcome = ProgressReconciler::reconcile(
            &drafts,
            gateway.as_ref(),
            invitation.as_ref(),
            context.email.as_deref(),
            context.invitation_token.as_deref(),
            context.initial_step,
            clock.as_ref(),
        )
        .await;
        info!(
            "Session reconciled from {:?} source (degraded: {})",
            outcome.source, outcome.degraded
        );

        let form = FormData::from_parts(&outcome.progress.step_data, invitation.as_ref());

        let shared = Arc::new(ControllerShared {
            gateway,
            drafts,
            clock,
            invitation_token: context.invitation_token,
            state: RwLock::new(EngineState {
                progress: outcome.progress,
                form,
                errors: ValidationErrors::new(),
            }),
            dirty: AtomicBool::new(false),
            degraded: AtomicBool::new(outcome.degraded),
            edit_generation: AtomicU64::new(0),
        });

        let scheduler = AutoSaveScheduler::new(
            Arc::clone(&shared) as Arc<dyn SaveSink>,
            config.debounce_delay(),
            config.autosave_interval(),
        );
        scheduler.start();

        Self { shared, scheduler }
    }

    // ========== Mutation operations ==========

    /// Update a single form field.
    ///
    /// Pre-filled invitation fields are not editable; updating one is a
    /// no-op. Editable updates mark the session dirty, clear any
    /// existing validation error for the field, mirror the value into
    /// the draft store, and re-arm the debounce timer.
    pub fn update_field(&self, name: &str, value: FieldValue) {
        if self.apply_edit(name, value) {
            self.scheduler.note_edit();
        }
    }

    /// Update several fields at once; arms the debounce timer once.
    pub fn update_fields(&self, updates: BTreeMap<String, FieldValue>) {
        let mut any_applied = false;
        for (name, value) in updates {
            any_applied |= self.apply_edit(&name, value);
        }
        if any_applied {
            self.scheduler.note_edit();
        }
    }

    fn apply_edit(&self, name: &str, value: FieldValue) -> bool {
        {
            let mut state = self.write_state();
            if !state.form.set(name, value.clone()) {
                debug!("Ignoring edit to pre-filled field '{}'", name);
                return false;
            }
            state.errors.remove(name);
        }
        self.shared.edit_generation.fetch_add(1, Ordering::SeqCst);
        self.shared.dirty.store(true, Ordering::SeqCst);
        if let Err(e) = self.shared.drafts.set_field(name, &value) {
            warn!("Failed to mirror field '{}' to draft store: {}", name, e);
        }
        true
    }

    /// Explicit, immediate save. Shares the in-flight guard with the
    /// auto-save timers: a save already running makes this a no-op that
    /// returns false.
    pub async fn save_progress(&self) -> bool {
        self.scheduler.save_now().await
    }

    /// Validate the current step and, if it passes, record it as
    /// completed (idempotent), advance to the next step, and save.
    ///
    /// Returns false and populates `errors` when validation fails; the
    /// progress record is left untouched in that case. A failed save
    /// after successful validation is retried by auto-save and does not
    /// undo the completion.
    pub async fn mark_step_complete(&self) -> bool {
        let valid = {
            let mut state = self.write_state();
            let step = state.progress.current_step;
            let errors =
                StepValidator::validate(&state.form, step.required_fields(), self.shared.clock.as_ref());
            let valid = errors.is_empty();
            state.errors = errors;
            if valid {
                if state.progress.mark_completed(step) {
                    info!("Step {:?} completed", step);
                }
                if let Some(next) = step.next() {
                    state.progress.current_step = next;
                }
            }
            valid
        };

        if !valid {
            return false;
        }

        self.shared.edit_generation.fetch_add(1, Ordering::SeqCst);
        self.shared.dirty.store(true, Ordering::SeqCst);
        self.save_progress().await;
        true
    }

    /// Move the wizard cursor without completing anything.
    pub fn go_to_step(&self, step: WizardStep) {
        {
            let mut state = self.write_state();
            if state.progress.current_step == step {
                return;
            }
            state.progress.current_step = step;
        }
        self.shared.edit_generation.fetch_add(1, Ordering::SeqCst);
        self.shared.dirty.store(true, Ordering::SeqCst);
        self.scheduler.note_edit();
    }

    // ========== Query operations ==========

    pub fn form_data(&self) -> FormData {
        self.read_state().form.clone()
    }

    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.read_state().form.get(name).cloned()
    }

    pub fn is_prefilled(&self, name: &str) -> bool {
        self.read_state().form.is_prefilled(name)
    }

    pub fn current_step(&self) -> WizardStep {
        self.read_state().progress.current_step
    }

    pub fn completed_steps(&self) -> Vec<WizardStep> {
        self.read_state().progress.completed_steps.clone()
    }

    pub fn progress_fraction(&self) -> f64 {
        self.read_state().progress.progress_fraction()
    }

    /// Epoch milliseconds of the last successful save or reconciliation
    /// decision.
    pub fn last_saved(&self) -> i64 {
        self.read_state().progress.last_updated
    }

    pub fn errors(&self) -> ValidationErrors {
        self.read_state().errors.clone()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.shared.dirty.load(Ordering::SeqCst)
    }

    pub fn is_saving(&self) -> bool {
        self.scheduler.is_saving()
    }

    /// True while the session runs local-only because the remote store
    /// was unreachable.
    pub fn is_degraded(&self) -> bool {
        self.shared.degraded.load(Ordering::SeqCst)
    }

    /// Tear down both auto-save timers. A save already in flight is
    /// allowed to finish; its result is discarded.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, EngineState> {
        match self.shared.state.read() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, EngineState> {
        match self.shared.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for OnboardingController {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}
