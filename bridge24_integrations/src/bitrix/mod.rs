//! Bitrix24 connector.
//!
//! Pulls contacts from `crm.contact.list` and pushes single contacts to
//! `crm.contact.add`. The CRM encodes multi-value fields (email, phone) as
//! arrays of `{VALUE, VALUE_TYPE}` records; `wire` models that shape as an
//! explicit serde schema so the mapping is testable on its own.

pub mod client;
pub mod wire;
