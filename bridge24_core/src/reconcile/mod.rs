//! Bulk reconciliation: pull remote Bitrix24 contacts, classify each against
//! the local store, and commit the resulting plan atomically.

pub mod engine;
pub mod models;
