//! Bridge24 integrations: clients for external systems.
//!
//! Currently one integration, the Bitrix24 CRM REST API.

pub mod bitrix;

pub use bitrix::client::BitrixClient;
