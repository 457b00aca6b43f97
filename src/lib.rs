//! Onboarding progress synchronization engine.
//!
//! Keeps a multi-step wizard's form data consistent across three
//! independently-evolving sources: a read-only invitation payload, a
//! locally persisted draft (survives reloads), and a remotely persisted
//! progress record (survives device loss). Background saves are
//! debounced and periodic, with at most one save in flight; concurrent
//! writers reconcile last-write-wins by timestamp.

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interface;
pub mod services;

pub use config::EngineConfig;
pub use domain::{FieldValue, FormData, InvitationData, OnboardingProgress, WizardStep};
pub use error::{AppError, Result};
pub use infrastructure::{InvitationDataLoader, LocalDraftStore};
pub use interface::{Clock, InvitationValidationService, RemoteProgressGateway, SystemClock};
pub use services::{
    OnboardingController, ProgressReconciler, SessionContext, StepValidator, ValidationErrors,
};
