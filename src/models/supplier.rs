use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Supplier {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    /// Alternate mailboxes this supplier has replied from. Appended to by
    /// orphan-thread assignment when the sender differs from `email`.
    pub aux_emails: Json<Vec<String>>,
    pub phone: Option<String>,
    pub contact_person: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Supplier {
    /// Case-insensitive test against the primary and auxiliary addresses.
    pub fn matches_address(&self, address: &str) -> bool {
        let needle = address.trim().to_lowercase();
        if let Some(ref primary) = self.email {
            if primary.trim().to_lowercase() == needle {
                return true;
            }
        }
        self.aux_emails
            .iter()
            .any(|aux| aux.trim().to_lowercase() == needle)
    }

    pub fn has_aux_email(&self, address: &str) -> bool {
        let needle = address.trim().to_lowercase();
        self.aux_emails
            .iter()
            .any(|aux| aux.trim().to_lowercase() == needle)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSupplierRequest {
    #[validate(length(min = 1, max = 255, message = "Name required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 50, message = "Phone too long"))]
    pub phone: Option<String>,
    pub contact_person: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSupplierRequest {
    #[validate(length(min = 1, max = 255, message = "Name required"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 50, message = "Phone too long"))]
    pub phone: Option<String>,
    pub contact_person: Option<String>,
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn supplier(email: Option<&str>, aux: &[&str]) -> Supplier {
        Supplier {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Acme Parts".to_string(),
            email: email.map(String::from),
            aux_emails: Json(aux.iter().map(|s| s.to_string()).collect()),
            phone: None,
            contact_person: None,
            address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn matches_primary_case_insensitively() {
        let s = supplier(Some("Main@Acme.com"), &[]);
        assert!(s.matches_address("main@acme.com"));
        assert!(!s.matches_address("other@acme.com"));
    }

    #[test]
    fn matches_auxiliary_addresses() {
        let s = supplier(Some("main@acme.com"), &["alt@acme.com"]);
        assert!(s.matches_address("ALT@acme.com"));
        assert!(s.has_aux_email("alt@acme.com"));
        assert!(!s.has_aux_email("main@acme.com"));
    }

    #[test]
    fn no_email_on_file_matches_nothing() {
        let s = supplier(None, &[]);
        assert!(!s.matches_address("anyone@acme.com"));
    }
}
