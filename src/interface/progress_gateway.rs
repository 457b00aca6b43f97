use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{FieldValue, OnboardingProgress, WizardStep};

/// Remote progress store, keyed by user identity.
///
/// `fetch` must fail fast (return Err) on network/auth errors rather than
/// silently returning None; None strictly means "no record exists".
/// `update` returns false for handled failures, reserving Err for
/// unexpected transport errors.
// The token lifetime is named: automock rejects anonymous lifetimes
// inside generic argument types like Option<&str>.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteProgressGateway: Send + Sync {
    async fn fetch<'a>(
        &self,
        email: &str,
        token: Option<&'a str>,
    ) -> Result<Option<OnboardingProgress>>;

    async fn update<'a>(
        &self,
        email: &str,
        current_step: WizardStep,
        step_data: &BTreeMap<String, FieldValue>,
        completed_steps: &[WizardStep],
        token: Option<&'a str>,
    ) -> Result<bool>;
}
