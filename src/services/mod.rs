pub mod autosave;
pub mod controller;
pub mod reconciler;
pub mod validator;

pub use autosave::AutoSaveScheduler;
pub use controller::{OnboardingController, SessionContext};
pub use reconciler::{ProgressReconciler, ReconcileOutcome, ReconcileSource};
pub use validator::{StepValidator, ValidationErrors};
