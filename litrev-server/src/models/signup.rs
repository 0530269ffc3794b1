//! Public sign-up request payload

use serde::Deserialize;

use super::optional_text;

pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_INSTITUTION_LEN: usize = 200;
pub const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupSubmission {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Sign-up request after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSignup {
    pub email: String,
    pub name: Option<String>,
    pub institution: Option<String>,
    pub message: Option<String>,
}

/// Structural email check: one `@`, non-empty local part, dotted domain
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

impl SignupSubmission {
    pub fn validate(&self) -> Result<ValidSignup, String> {
        let email = self.email.trim().to_lowercase();
        if email.len() > MAX_EMAIL_LEN || !is_plausible_email(&email) {
            return Err("email is not a valid address".to_string());
        }

        Ok(ValidSignup {
            email,
            name: optional_text("name", self.name.as_deref(), MAX_NAME_LEN)?,
            institution: optional_text("institution", self.institution.as_deref(), MAX_INSTITUTION_LEN)?,
            message: optional_text("message", self.message.as_deref(), MAX_MESSAGE_LEN)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(email: &str) -> SignupSubmission {
        SignupSubmission {
            email: email.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_email_rules() {
        assert!(submission("Jo.Doe@Uni.example.org").validate().is_ok());
        assert_eq!(
            submission(" A@B.CO ").validate().unwrap().email,
            "a@b.co"
        );

        for bad in ["", "plain", "@example.org", "a@b", "a@@b.org", "a b@c.org", "a@-b.org", "a@b..org"] {
            assert!(submission(bad).validate().is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_field_lengths() {
        let mut s = submission("a@b.org");
        s.name = Some("n".repeat(MAX_NAME_LEN));
        s.message = Some("m".repeat(MAX_MESSAGE_LEN));
        assert!(s.validate().is_ok());

        s.institution = Some("i".repeat(MAX_INSTITUTION_LEN + 1));
        assert!(s.validate().is_err());

        let mut s = submission("a@b.org");
        s.message = Some("m".repeat(MAX_MESSAGE_LEN + 1));
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_blank_optionals_become_none() {
        let mut s = submission("a@b.org");
        s.name = Some("   ".to_string());
        assert_eq!(s.validate().unwrap().name, None);
    }
}
