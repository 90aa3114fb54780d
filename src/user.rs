//! Directory records for the identity collaborator surface
//!
//! Credential resolution and password handling live outside the engine; the
//! engine only keeps the records it needs for buyer-existence checks and for
//! deriving contact fields once an NDA is signed.
use crate::types::{Actor, Role, TimeStamp};
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub email: String,
    #[n(2)]
    pub username: String,
    #[n(3)]
    pub role: Role,
    #[n(4)]
    pub company_name: Option<String>,
    #[n(5)]
    pub contact_person: Option<String>,
    #[n(6)]
    pub phone: Option<String>,
    #[n(7)]
    pub is_active: bool,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
}

impl User {
    pub fn new(id: impl Into<String>, email: &str, username: &str, role: Role) -> Self {
        Self {
            id: id.into(),
            email: email.to_string(),
            username: username.to_string(),
            role,
            company_name: None,
            contact_person: None,
            phone: None,
            is_active: true,
            created_at: TimeStamp::new(),
        }
    }
    pub fn set_company_name(mut self, company_name: &str) -> Self {
        self.company_name = Some(company_name.to_string());
        self
    }
    pub fn set_contact_person(mut self, contact_person: &str) -> Self {
        self.contact_person = Some(contact_person.to_string());
        self
    }
    pub fn set_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }
    /// The identity record the engine's guard consumes.
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            role: self.role,
            active: self.is_active,
        }
    }
}
