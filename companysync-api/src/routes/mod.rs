/// API route handlers, organized by resource
///
/// - `health`: Health check
/// - `auth`: Register, login, logout, current identity
/// - `companies`, `employees`: Companies and their memberships
/// - `finance`, `notes`, `tasks`, `files`: Company resources
/// - `support`: Support chat
/// - `admin`: Admin panel (users, companies, audit log, settings)
///
/// Mutating handlers share one shape: open a transaction, authorize against
/// row-locked state, mutate, append the audit entry, commit.

pub mod admin;
pub mod auth;
pub mod companies;
pub mod employees;
pub mod files;
pub mod finance;
pub mod health;
pub mod notes;
pub mod support;
pub mod tasks;

use companysync_shared::models::page::Pagination;
use serde::Deserialize;

/// `?page=&per_page=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl From<PageQuery> for Pagination {
    fn from(query: PageQuery) -> Self {
        Pagination::new(query.page, query.per_page)
    }
}

/// Trims a string and maps blank to `None`
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trims an update value, turning blank into `Some("")`
///
/// The models store an empty update value as NULL, so blank clears the
/// field the same way a blank value is dropped on create.
pub(crate) fn clearable(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}
