use std::collections::{BTreeMap, BTreeSet};

use super::invitation::InvitationData;
use super::progress::FieldValue;

/// In-memory working copy of the wizard's form.
///
/// Superset of the progress record's `step_data` plus the pre-filled
/// invitation fields. Pre-filled fields are immutable; `set` on one is a
/// no-op.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    values: BTreeMap<String, FieldValue>,
    prefilled: BTreeSet<String>,
}

impl FormData {
    /// Build a form from persisted step data, seeding and locking the
    /// invitation fields when an invitation is present.
    pub fn from_parts(
        step_data: &BTreeMap<String, FieldValue>,
        invitation: Option<&InvitationData>,
    ) -> Self {
        let mut form = FormData {
            values: step_data.clone(),
            prefilled: BTreeSet::new(),
        };
        if let Some(invitation) = invitation {
            for (name, value) in invitation.entries() {
                form.values.insert(name.to_string(), FieldValue::from(value));
                form.prefilled.insert(name.to_string());
            }
        }
        form
    }

    /// Set a field value. Returns false (and leaves the form untouched)
    /// when the field is pre-filled.
    pub fn set(&mut self, name: &str, value: FieldValue) -> bool {
        if self.prefilled.contains(name) {
            return false;
        }
        self.values.insert(name.to_string(), value);
        true
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn is_prefilled(&self, name: &str) -> bool {
        self.prefilled.contains(name)
    }

    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    /// The editable portion of the form, i.e. what belongs in the progress
    /// record's `step_data`. Pre-filled invitation fields are excluded;
    /// they are sourced from the invitation payload, not persisted edits.
    pub fn editable_values(&self) -> BTreeMap<String, FieldValue> {
        self.values
            .iter()
            .filter(|(name, _)| !self.prefilled.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation() -> InvitationData {
        InvitationData {
            email: "coach@example.com".to_string(),
            first_name: Some("Dana".to_string()),
            last_name: None,
            phone: None,
            phone_formatted: None,
            city: None,
            state: None,
            bio: None,
        }
    }

    #[test]
    fn test_prefilled_field_is_immutable() {
        let mut form = FormData::from_parts(&BTreeMap::new(), Some(&invitation()));
        assert!(!form.set("email", FieldValue::from("other@example.com")));
        assert_eq!(
            form.get("email"),
            Some(&FieldValue::from("coach@example.com"))
        );
    }

    #[test]
    fn test_editable_values_excludes_prefilled() {
        let mut form = FormData::from_parts(&BTreeMap::new(), Some(&invitation()));
        assert!(form.set("bio", FieldValue::from("Ten years coaching U12.")));
        let editable = form.editable_values();
        assert!(editable.contains_key("bio"));
        assert!(!editable.contains_key("email"));
        assert!(!editable.contains_key("first_name"));
    }

    #[test]
    fn test_set_without_invitation() {
        let mut form = FormData::from_parts(&BTreeMap::new(), None);
        assert!(form.set("email", FieldValue::from("solo@example.com")));
        assert!(!form.is_prefilled("email"));
    }
}
