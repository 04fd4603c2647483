pub mod auth;
pub mod cli;
pub mod error;
pub mod middleware;
pub mod policy;
pub mod routes;
pub mod server;
