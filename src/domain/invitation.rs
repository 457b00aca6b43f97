use serde::{Deserialize, Serialize};

/// Profile payload resolved from a one-time invitation token.
///
/// Read-only for the lifetime of the session. Any field present here is
/// pre-filled in the wizard and not user-editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationData {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub phone_formatted: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl InvitationData {
    /// Names of the fields that carry a value, i.e. the pre-filled,
    /// immutable fields of the session.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = vec!["email"];
        let optional: [(&'static str, &Option<String>); 7] = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("phone", &self.phone),
            ("phone_formatted", &self.phone_formatted),
            ("city", &self.city),
            ("state", &self.state),
            ("bio", &self.bio),
        ];
        for (name, value) in optional {
            if value.as_deref().is_some_and(|v| !v.is_empty()) {
                names.push(name);
            }
        }
        names
    }

    /// Present fields as (name, value) pairs for seeding the form.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![("email", self.email.clone())];
        let optional: [(&'static str, &Option<String>); 7] = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("phone", &self.phone),
            ("phone_formatted", &self.phone_formatted),
            ("city", &self.city),
            ("state", &self.state),
            ("bio", &self.bio),
        ];
        for (name, value) in optional {
            if let Some(v) = value.as_deref() {
                if !v.is_empty() {
                    entries.push((name, v.to_string()));
                }
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_skips_absent_and_empty() {
        let invitation = InvitationData {
            email: "coach@example.com".to_string(),
            first_name: Some("Dana".to_string()),
            last_name: None,
            phone: Some(String::new()),
            phone_formatted: None,
            city: Some("Austin".to_string()),
            state: None,
            bio: None,
        };
        let names = invitation.field_names();
        assert_eq!(names, vec!["email", "first_name", "city"]);
    }
}
