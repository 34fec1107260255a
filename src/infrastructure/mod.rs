// Core infrastructure modules
pub mod database;              // Store and directory contracts
pub mod sqlite_database;       // SQLite implementation
pub mod cache;                 // Basic caching functionality
pub mod id_generator;          // ID generation system
pub mod viewer;                // Viewer context
pub mod middleware;            // Request-scoped viewer resolution
pub mod security;              // Token issue and validation

// Re-export core infrastructure components
pub use database::{CachedUserDirectory, ContentStore, UserDirectory};
pub use sqlite_database::SqliteContentStore;
pub use id_generator::ContentIdGenerator;
pub use viewer::{Session, Viewer, ViewerContext};
pub use security::{SecurityConfig, SecurityService};
