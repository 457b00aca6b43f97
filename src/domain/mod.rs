//! Domain models for the onboarding flow.

pub mod form;
pub mod invitation;
pub mod progress;
pub mod step;

pub use form::FormData;
pub use invitation::InvitationData;
pub use progress::{FieldValue, OnboardingProgress};
pub use step::WizardStep;
