use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::auth::services::is_valid_email;
use crate::contacts::repo::Contact;
use crate::error::ApiError;

/// Request body for creating or fully rewriting a contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactPayload {
    pub name: String,
    pub sur_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: Date,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ContactPayload {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_name_bounds(&self.name, "name")?;
        check_name_bounds(&self.sur_name, "sur_name")?;
        if !is_valid_email(&self.email) {
            return Err(ApiError::Validation("Invalid email".into()));
        }
        if self.phone.trim().is_empty() {
            return Err(ApiError::Validation("Phone must not be empty".into()));
        }
        Ok(())
    }
}

/// 3..=100 characters, the same bound the lookup routes enforce.
pub(crate) fn check_name_bounds(value: &str, field: &str) -> Result<(), ApiError> {
    let len = value.chars().count();
    if !(3..=100).contains(&len) {
        return Err(ApiError::Validation(format!(
            "{field} must be between 3 and 100 characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub id: Uuid,
    pub name: String,
    pub sur_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: Date,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            name: c.name,
            sur_name: c.sur_name,
            email: c.email,
            phone: c.phone,
            birthday: c.birthday,
            notes: c.notes,
            created_at: c.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn payload() -> ContactPayload {
        ContactPayload {
            name: "Borys".into(),
            sur_name: "Johnson".into(),
            email: "bj@gmail.com".into(),
            phone: "+380123456789".into(),
            birthday: date!(1988 - 01 - 01),
            notes: None,
        }
    }

    #[test]
    fn valid_payload_passes() {
        assert!(payload().validate().is_ok());
    }

    #[test]
    fn short_name_is_rejected() {
        let mut p = payload();
        p.name = "Bo".into();
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn overlong_sur_name_is_rejected() {
        let mut p = payload();
        p.sur_name = "x".repeat(101);
        assert!(p.validate().is_err());
    }

    #[test]
    fn bad_email_is_rejected() {
        let mut p = payload();
        p.email = "nope".into();
        assert!(p.validate().is_err());
    }

    #[test]
    fn empty_phone_is_rejected() {
        let mut p = payload();
        p.phone = "  ".into();
        assert!(p.validate().is_err());
    }

    #[test]
    fn birthday_deserializes_from_iso_date() {
        let p: ContactPayload = serde_json::from_str(
            r#"{"name":"Borys","sur_name":"Johnson","email":"bj@gmail.com",
                "phone":"+380123456789","birthday":"1988-01-01"}"#,
        )
        .unwrap();
        assert_eq!(p.birthday, date!(1988 - 01 - 01));
        assert_eq!(p.notes, None);
    }
}
