// Campus Portal - content service for announcements, events and resources

// Ent Framework - privacy rules
pub mod ent_framework;

// Content schema system
pub mod ent_schema;

// Core types and primitives
pub mod core;

// Infrastructure - store, cache, ids, security and request context
pub mod infrastructure;

// Schema Definitions - one per content kind
pub mod schemas;

// Records and populated views
pub mod entities;

// Operations and HTTP surface
pub mod content_interface;
pub mod auth_interface;
pub mod app_state;
pub mod config;

// Common utilities
pub mod error;
pub mod data_seeder;

// Re-exports for convenience
pub use error::{AppError, AppResult};
