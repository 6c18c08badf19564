//! # CompanySync Shared Library
//!
//! Domain types, persistence, and policy used by the CompanySync API server.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool and migrations
//! - `models`: Database models for every table
//! - `auth`: Passwords, sessions, the mutation policy evaluator and its store-backed guards
//! - `audit`: Audit log writer, filtered reads, and CSV export
//! - `storage`: Blob storage for uploaded files

pub mod audit;
pub mod auth;
pub mod db;
pub mod models;
pub mod storage;

/// Current version of the CompanySync shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
