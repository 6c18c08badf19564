//! # CompanySync API Server Library
//!
//! HTTP surface for CompanySync: companies, their employees, finance
//! records, notes, tasks, files, support chat, and the admin panel.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Session authentication and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
