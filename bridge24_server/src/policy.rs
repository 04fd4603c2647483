//! Declarative per-resource capability table.
//!
//! The contacts endpoint permanently disables update/delete: after initial
//! creation the CRM is the system of record for edits, and the policy makes
//! that rule a datum instead of a set of handler bodies.

use crate::error::ApiError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    List,
    Create,
    Update,
    Delete,
}

/// A denied action, carrying the fixed response message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDenial {
    pub resource: &'static str,
    pub message: &'static str,
}

impl From<PolicyDenial> for ApiError {
    fn from(denial: PolicyDenial) -> Self {
        ApiError::NotAllowed(denial.message.to_string())
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ResourcePolicy {
    pub resource: &'static str,
    pub list: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    /// Fixed message returned for every denied action.
    pub denial_message: &'static str,
}

impl ResourcePolicy {
    pub const fn allows(&self, action: Action) -> bool {
        match action {
            Action::List => self.list,
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }

    pub fn check(&self, action: Action) -> Result<(), PolicyDenial> {
        if self.allows(action) {
            Ok(())
        } else {
            Err(PolicyDenial {
                resource: self.resource,
                message: self.denial_message,
            })
        }
    }
}

/// Contacts: readable and creatable here; edits happen in the CRM.
pub const CONTACTS: ResourcePolicy = ResourcePolicy {
    resource: "contacts",
    list: true,
    create: true,
    update: false,
    delete: false,
    denial_message: "not allowed: contacts are managed in the CRM",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contacts_allow_read_and_create() {
        assert!(CONTACTS.check(Action::List).is_ok());
        assert!(CONTACTS.check(Action::Create).is_ok());
    }

    #[test]
    fn contacts_deny_mutations_with_fixed_message() {
        let update = CONTACTS.check(Action::Update).unwrap_err();
        let delete = CONTACTS.check(Action::Delete).unwrap_err();
        assert_eq!(update.message, delete.message);
        assert_eq!(update.message, "not allowed: contacts are managed in the CRM");
    }
}
