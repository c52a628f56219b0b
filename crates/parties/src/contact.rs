use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use craneledger_core::{ContactId, DomainError, DomainResult, EntityId};

/// Role a contact plays for the owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactType {
    Customer,
    Supplier,
    Intercompany,
}

impl ContactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactType::Customer => "CUSTOMER",
            ContactType::Supplier => "SUPPLIER",
            ContactType::Intercompany => "INTERCOMPANY",
        }
    }
}

impl FromStr for ContactType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(ContactType::Customer),
            "SUPPLIER" => Ok(ContactType::Supplier),
            "INTERCOMPANY" => Ok(ContactType::Intercompany),
            other => Err(DomainError::validation(format!("unknown contact type: {other}"))),
        }
    }
}

/// A customer, supplier or sister entity, scoped to one legal entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub entity_id: EntityId,
    #[serde(rename = "type")]
    pub contact_type: ContactType,
    pub name: String,
    pub email: Option<String>,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn register(
        entity_id: EntityId,
        contact_type: ContactType,
        name: &str,
        email: Option<String>,
        external_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("contact name is required"));
        }
        let email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(DomainError::validation("contact email must contain '@'"));
            }
        }

        Ok(Self {
            id: ContactId::new(),
            entity_id,
            contact_type,
            name: name.to_string(),
            email,
            external_ref,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check this contact can act in `role` for `entity_id`.
    pub fn ensure_role(&self, entity_id: EntityId, role: ContactType) -> DomainResult<()> {
        self.ensure_one_of(entity_id, &[role])
    }

    /// Like [`Contact::ensure_role`], accepting any of `roles`.
    pub fn ensure_one_of(&self, entity_id: EntityId, roles: &[ContactType]) -> DomainResult<()> {
        if self.entity_id != entity_id {
            return Err(DomainError::validation(format!(
                "contact {} does not belong to entity {}",
                self.id, entity_id
            )));
        }
        if !roles.contains(&self.contact_type) {
            let allowed: Vec<&str> = roles.iter().map(ContactType::as_str).collect();
            return Err(DomainError::validation(format!(
                "Contact must be of type {}",
                allowed.join(" or ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_entity_id() -> EntityId {
        EntityId::new()
    }

    #[test]
    fn register_trims_and_validates() {
        let contact = Contact::register(
            test_entity_id(),
            ContactType::Customer,
            "  Acme Cranes ",
            Some("ops@acme.test".into()),
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(contact.name, "Acme Cranes");

        assert!(Contact::register(test_entity_id(), ContactType::Customer, " ", None, None, Utc::now()).is_err());
        assert!(
            Contact::register(test_entity_id(), ContactType::Supplier, "Lift Co", Some("nope".into()), None, Utc::now())
                .is_err()
        );
    }

    #[test]
    fn ensure_role_checks_entity_and_type() {
        let entity_id = test_entity_id();
        let supplier =
            Contact::register(entity_id, ContactType::Supplier, "Lift Co", None, None, Utc::now()).unwrap();

        assert!(supplier.ensure_role(entity_id, ContactType::Supplier).is_ok());
        assert_eq!(
            supplier.ensure_role(entity_id, ContactType::Customer).unwrap_err(),
            DomainError::validation("Contact must be of type CUSTOMER")
        );
        assert!(supplier.ensure_role(test_entity_id(), ContactType::Supplier).is_err());
    }

    #[test]
    fn ensure_one_of_names_every_allowed_role() {
        let entity_id = test_entity_id();
        let payable_roles = [ContactType::Supplier, ContactType::Intercompany];
        let sister =
            Contact::register(entity_id, ContactType::Intercompany, "Crane Holdings", None, None, Utc::now())
                .unwrap();
        let customer =
            Contact::register(entity_id, ContactType::Customer, "Harbour Builders", None, None, Utc::now())
                .unwrap();

        assert!(sister.ensure_one_of(entity_id, &payable_roles).is_ok());
        assert_eq!(
            customer.ensure_one_of(entity_id, &payable_roles).unwrap_err(),
            DomainError::validation("Contact must be of type SUPPLIER or INTERCOMPANY")
        );
    }

    #[test]
    fn contact_type_serializes_in_upper_case() {
        let json = serde_json::to_string(&ContactType::Intercompany).unwrap();
        assert_eq!(json, "\"INTERCOMPANY\"");
    }
}
