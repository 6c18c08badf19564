/// Filtered reads over the audit log
///
/// Filters combine with AND:
///
/// - `username`: case-insensitive substring of the actor's username
/// - `action`: case-insensitive substring of the action tag
/// - `from` / `to`: inclusive calendar dates (UTC) on `created_at`
///
/// Results are ordered `created_at DESC, id DESC`, so entries written in the
/// same instant still page deterministically.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Transaction};

use crate::models::page::{like_pattern, Page, Pagination};

/// Audit log row joined with the actor's current username
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LogEntry {
    pub id: i64,
    pub actor_id: Option<i64>,
    /// `None` for system actions or deleted actors
    pub actor_username: Option<String>,
    pub action: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Audit log filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditFilter {
    pub username: Option<String>,
    pub action: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AuditFilter {
    fn username_pattern(&self) -> Option<String> {
        non_blank(self.username.as_deref()).map(like_pattern)
    }

    fn action_pattern(&self) -> Option<String> {
        non_blank(self.action.as_deref()).map(like_pattern)
    }

    /// Lower bound: start of `from`
    fn lower_bound(&self) -> Option<DateTime<Utc>> {
        self.from.map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    /// Exclusive upper bound: start of the day after `to`
    fn upper_bound(&self) -> Option<DateTime<Utc>> {
        self.to
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");

        if let Some(pattern) = self.username_pattern() {
            qb.push(" AND u.username ILIKE ").push_bind(pattern);
        }
        if let Some(pattern) = self.action_pattern() {
            qb.push(" AND l.action ILIKE ").push_bind(pattern);
        }
        if let Some(lower) = self.lower_bound() {
            qb.push(" AND l.created_at >= ").push_bind(lower);
        }
        if let Some(upper) = self.upper_bound() {
            qb.push(" AND l.created_at < ").push_bind(upper);
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

const FROM_CLAUSE: &str = " FROM logs l LEFT JOIN users u ON u.id = l.actor_id";

fn select_query(filter: &AuditFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT l.id, l.actor_id, u.username AS actor_username, l.action, l.metadata, l.created_at",
    );
    qb.push(FROM_CLAUSE);
    filter.push_where(&mut qb);
    qb.push(" ORDER BY l.created_at DESC, l.id DESC");
    qb
}

fn count_query(filter: &AuditFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*)");
    qb.push(FROM_CLAUSE);
    filter.push_where(&mut qb);
    qb
}

/// Read-only `REPEATABLE READ` transaction
///
/// Every statement inside it sees the same snapshot, so [`list`] run on it
/// reports a `total` that agrees with its items under concurrent writes.
pub async fn read_snapshot(pool: &PgPool) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// One page of matching entries, most recent first
///
/// `total` counts every matching entry regardless of the page requested.
/// The count and the page are two statements; run this on a
/// [`read_snapshot`] transaction when they must agree.
pub async fn list(
    conn: &mut PgConnection,
    filter: &AuditFilter,
    pagination: Pagination,
) -> Result<Page<LogEntry>, sqlx::Error> {
    let total: i64 = count_query(filter)
        .build_query_scalar()
        .fetch_one(&mut *conn)
        .await?;

    let mut qb = select_query(filter);
    qb.push(" LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let items = qb.build_query_as::<LogEntry>().fetch_all(&mut *conn).await?;

    Ok(Page::new(items, total, pagination))
}

/// Every matching entry, for CSV export
pub async fn export(conn: &mut PgConnection, filter: &AuditFilter) -> Result<Vec<LogEntry>, sqlx::Error> {
    let mut qb = select_query(filter);
    qb.build_query_as::<LogEntry>().fetch_all(&mut *conn).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_has_no_conditions() {
        let qb = select_query(&AuditFilter::default());
        let sql = qb.sql();
        assert!(sql.contains("WHERE TRUE ORDER BY l.created_at DESC, l.id DESC"));
        assert!(!sql.contains('$'));
    }

    #[test]
    fn test_all_filters_bind_in_order() {
        let filter = AuditFilter {
            username: Some("ali".to_string()),
            action: Some("ban".to_string()),
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            to: NaiveDate::from_ymd_opt(2024, 1, 31),
        };

        let qb = count_query(&filter);
        let sql = qb.sql();
        assert!(sql.starts_with("SELECT COUNT(*) FROM logs l LEFT JOIN users u"));
        assert!(sql.contains("u.username ILIKE $1"));
        assert!(sql.contains("l.action ILIKE $2"));
        assert!(sql.contains("l.created_at >= $3"));
        assert!(sql.contains("l.created_at < $4"));
    }

    #[test]
    fn test_blank_filters_ignored() {
        let filter = AuditFilter {
            username: Some("   ".to_string()),
            action: Some(String::new()),
            ..Default::default()
        };
        assert!(!count_query(&filter).sql().contains("ILIKE"));
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let filter = AuditFilter {
            from: NaiveDate::from_ymd_opt(2024, 3, 10),
            to: NaiveDate::from_ymd_opt(2024, 3, 10),
            ..Default::default()
        };

        let lower = filter.lower_bound().unwrap();
        let upper = filter.upper_bound().unwrap();
        assert_eq!(lower.to_rfc3339(), "2024-03-10T00:00:00+00:00");
        assert_eq!(upper.to_rfc3339(), "2024-03-11T00:00:00+00:00");
    }

    #[test]
    fn test_patterns_escape_wildcards() {
        let filter = AuditFilter {
            action: Some("set_".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.action_pattern().as_deref(), Some("%set\\_%"));
    }
}
