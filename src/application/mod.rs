//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Dispatchers and the registry with its needs index
//! - Text domains and message rendering
//! - Reporting contexts, the report engine and try scopes
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod context;
pub mod dispatcher;
pub mod domains;
pub mod engine;
pub mod ports;
pub mod registry;
pub mod try_scope;
