/// Company membership model (`company_users`)
///
/// Links a user to a company with a role and optional HR attributes.
/// A user has at most one membership row per company (composite primary key).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE company_users (
///     company_id BIGINT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role_in_company TEXT NOT NULL DEFAULT 'member',
///     salary NUMERIC(14, 2),
///     note TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (company_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **owner**: Full control, deletes the company, promotes admins
/// - **admin**: Manages employees and every company resource
/// - **member**: Creates resources and edits their own
///
/// # Example
///
/// ```no_run
/// use companysync_shared::models::membership::{CreateMembership, Membership, MembershipRole};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// Membership::create(&pool, CreateMembership {
///     company_id: 1,
///     user_id: 2,
///     role: MembershipRole::Member,
///     salary: None,
///     note: None,
/// }).await?;
///
/// let role = Membership::get_role(&pool, 1, 2).await?;
/// assert_eq!(role, Some(MembershipRole::Member));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

/// Role within one company
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Owner,
    Admin,
    Member,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Owner => "owner",
            MembershipRole::Admin => "admin",
            MembershipRole::Member => "member",
        }
    }

    /// Owner and admin may act on any resource in the company
    pub fn is_manager(&self) -> bool {
        matches!(self, MembershipRole::Owner | MembershipRole::Admin)
    }

    /// Can change finance record status
    pub fn can_set_finance_status(&self) -> bool {
        self.is_manager()
    }

    /// Can grant the admin role to another member
    pub fn can_promote_admin(&self) -> bool {
        matches!(self, MembershipRole::Owner)
    }

    /// Can delete the company
    pub fn can_delete_company(&self) -> bool {
        matches!(self, MembershipRole::Owner)
    }
}

/// Membership row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub company_id: i64,

    pub user_id: i64,

    #[sqlx(rename = "role_in_company")]
    #[serde(rename = "role_in_company")]
    pub role: MembershipRole,

    pub salary: Option<Decimal>,

    pub note: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Membership joined with the member's account details, for employee lists
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub role_in_company: MembershipRole,
    pub salary: Option<Decimal>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a membership
#[derive(Debug, Clone)]
pub struct CreateMembership {
    pub company_id: i64,
    pub user_id: i64,
    pub role: MembershipRole,
    pub salary: Option<Decimal>,
    pub note: Option<String>,
}

/// Partial update; `None` leaves the column unchanged and an empty `note`
/// clears it
#[derive(Debug, Clone, Default)]
pub struct UpdateMembership {
    pub role: Option<MembershipRole>,
    pub salary: Option<Decimal>,
    pub note: Option<String>,
}

impl Membership {
    /// Adds a user to a company
    ///
    /// # Errors
    ///
    /// Returns a unique violation if the user is already a member, or a
    /// foreign key violation if the company or user does not exist.
    pub async fn create(executor: impl PgExecutor<'_>, data: CreateMembership) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO company_users (company_id, user_id, role_in_company, salary, note)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING company_id, user_id, role_in_company, salary, note, created_at
            "#,
        )
        .bind(data.company_id)
        .bind(data.user_id)
        .bind(data.role)
        .bind(data.salary)
        .bind(data.note)
        .fetch_one(executor)
        .await
    }

    pub async fn find(
        executor: impl PgExecutor<'_>,
        company_id: i64,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT company_id, user_id, role_in_company, salary, note, created_at
            FROM company_users
            WHERE company_id = $1 AND user_id = $2
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Locks and returns a membership row for the rest of the transaction
    pub async fn find_for_update(
        executor: impl PgExecutor<'_>,
        company_id: i64,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT company_id, user_id, role_in_company, salary, note, created_at
            FROM company_users
            WHERE company_id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Gets a user's role in a company, `None` if not a member
    pub async fn get_role(
        executor: impl PgExecutor<'_>,
        company_id: i64,
        user_id: i64,
    ) -> Result<Option<MembershipRole>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT role_in_company FROM company_users WHERE company_id = $1 AND user_id = $2",
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Lists a company's employees with account details, owners first
    pub async fn list_employees(
        executor: impl PgExecutor<'_>,
        company_id: i64,
    ) -> Result<Vec<Employee>, sqlx::Error> {
        sqlx::query_as::<_, Employee>(
            r#"
            SELECT cu.user_id, u.username, u.email, cu.role_in_company,
                   cu.salary, cu.note, cu.created_at
            FROM company_users cu
            JOIN users u ON u.id = cu.user_id
            WHERE cu.company_id = $1
            ORDER BY CASE cu.role_in_company
                         WHEN 'owner' THEN 0 WHEN 'admin' THEN 1 ELSE 2
                     END,
                     u.username
            "#,
        )
        .bind(company_id)
        .fetch_all(executor)
        .await
    }

    /// Lists every membership of one user
    pub async fn list_for_user(
        executor: impl PgExecutor<'_>,
        user_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT company_id, user_id, role_in_company, salary, note, created_at
            FROM company_users
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Applies a partial update
    ///
    /// Returns the updated row, or `None` if the membership does not exist.
    pub async fn update(
        executor: impl PgExecutor<'_>,
        company_id: i64,
        user_id: i64,
        data: UpdateMembership,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            UPDATE company_users
            SET role_in_company = COALESCE($3, role_in_company),
                salary = COALESCE($4, salary),
                note = NULLIF(COALESCE($5, note), '')
            WHERE company_id = $1 AND user_id = $2
            RETURNING company_id, user_id, role_in_company, salary, note, created_at
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .bind(data.role)
        .bind(data.salary)
        .bind(data.note)
        .fetch_optional(executor)
        .await
    }

    /// Removes a user from a company; returns true if a row was deleted
    pub async fn delete(
        executor: impl PgExecutor<'_>,
        company_id: i64,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM company_users WHERE company_id = $1 AND user_id = $2")
            .bind(company_id)
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
