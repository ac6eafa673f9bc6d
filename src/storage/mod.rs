//! Durable storage for the module host
//!
//! Provides the key-value abstraction backing applied-version and
//! migration-history records. Supports multiple database backends via
//! feature flags (sled, redb).

pub mod database;

pub use database::{
    create_database, default_backend, fallback_backend, open_database, Database, DatabaseBackend,
    Tree,
};
