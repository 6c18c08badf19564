/// Company model and database operations
///
/// A company has no owner column; ownership is the membership row with
/// `role_in_company = 'owner'`. Deleting a company cascades to memberships,
/// finance records, notes and tasks. File rows are left in place.
///
/// # Example
///
/// ```no_run
/// use companysync_shared::models::company::{Company, CreateCompany};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, user_id: i64) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
/// let company = Company::create_with_owner(&mut tx, CreateCompany {
///     name: "Acme".to_string(),
///     description: None,
/// }, user_id).await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};

use super::membership::MembershipRole;
use super::page::{Page, Pagination};

/// Company row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Company as seen by one of its members
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberCompany {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub role_in_company: MembershipRole,
}

/// Company with aggregate counts, for the admin panel
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompanySummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub member_count: i64,
    pub owner_username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCompany {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateCompany {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Company {
    /// Creates a company and makes `owner_id` its owner
    ///
    /// Both inserts run on the given connection, so callers pass a
    /// transaction to keep them atomic.
    pub async fn create_with_owner(
        conn: &mut PgConnection,
        data: CreateCompany,
        owner_id: i64,
    ) -> Result<Self, sqlx::Error> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(data.name)
        .bind(data.description)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO company_users (company_id, user_id, role_in_company) VALUES ($1, $2, 'owner')",
        )
        .bind(company.id)
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;

        Ok(company)
    }

    pub async fn find_by_id(executor: impl PgExecutor<'_>, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Company>(
            "SELECT id, name, description, created_at FROM companies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists the companies a user belongs to, with their role in each
    pub async fn list_for_user(
        executor: impl PgExecutor<'_>,
        user_id: i64,
    ) -> Result<Vec<MemberCompany>, sqlx::Error> {
        sqlx::query_as::<_, MemberCompany>(
            r#"
            SELECT c.id, c.name, c.description, c.created_at, cu.role_in_company
            FROM companies c
            JOIN company_users cu ON cu.company_id = c.id
            WHERE cu.user_id = $1
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    pub async fn update(
        executor: impl PgExecutor<'_>,
        id: i64,
        data: UpdateCompany,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies
            SET name = COALESCE($2, name),
                description = NULLIF(COALESCE($3, description), '')
            WHERE id = $1
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.description)
        .fetch_optional(executor)
        .await
    }

    /// Deletes a company; returns true if a row was deleted
    pub async fn delete(executor: impl PgExecutor<'_>, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists all companies with member counts, newest first
    pub async fn list_all(
        pool: &PgPool,
        pagination: Pagination,
    ) -> Result<Page<CompanySummary>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(pool)
            .await?;

        let items = sqlx::query_as::<_, CompanySummary>(
            r#"
            SELECT c.id, c.name, c.description, c.created_at,
                   (SELECT COUNT(*) FROM company_users cu WHERE cu.company_id = c.id) AS member_count,
                   (SELECT u.username FROM company_users cu
                      JOIN users u ON u.id = cu.user_id
                     WHERE cu.company_id = c.id AND cu.role_in_company = 'owner'
                     LIMIT 1) AS owner_username
            FROM companies c
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(items, total, pagination))
    }
}
