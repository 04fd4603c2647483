//! Bridge24 core library: contact models, store traits, and the two sync
//! engines (bulk reconcile, single-contact forward) shared by the server
//! and the CLI.

pub mod config;
pub mod error;
pub mod forward;
pub mod models;
pub mod o11y;
pub mod reconcile;
pub mod store;

pub use config::{BitrixConfig, EmailMatching, SyncSettings};
pub use error::{Error, Result};
pub use forward::{ContactForwarder, ContactSink};
pub use models::{Contact, ContactDraft, SessionToken, User, UserProfile};
pub use reconcile::engine::{ContactSource, Reconciler};
pub use reconcile::models::{Disposition, RemoteContact, SyncPlan, SyncReport};
pub use store::traits::{ContactStore, ListQuery, UserStore};
