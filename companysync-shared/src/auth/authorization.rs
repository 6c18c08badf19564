/// Store-backed authorization guards
///
/// Every company resource mutation runs the same sequence inside one
/// transaction:
///
/// 1. Read the resource state and the actor's membership role in a single
///    query, locking the resource row (`FOR UPDATE`).
/// 2. Evaluate [`policy::can_mutate`](super::policy::can_mutate).
/// 3. Apply the mutation and write the audit entry on the same transaction.
///
/// A resource that cannot be found never authorizes anything: mutation
/// guards turn `NotFound` into `Forbidden` via [`AuthzError::fail_closed`].
///
/// # Example
///
/// ```no_run
/// use companysync_shared::auth::authorization::{authorize_mutation, AuthzError};
/// use companysync_shared::auth::policy::{MutationAction, ResourceKind};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, actor_id: i64, note_id: i64) -> Result<(), AuthzError> {
/// let mut tx = pool.begin().await?;
/// let guard = authorize_mutation(&mut *tx, ResourceKind::Note, note_id, actor_id, MutationAction::Delete).await?;
/// // ... delete the note and record the audit entry on `tx` ...
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgExecutor;
use tracing::debug;

use super::policy::{can_mutate, Decision, DenyReason, MutationAction, ResourceKind, ResourceState};
use crate::models::finance_record::FinanceStatus;
use crate::models::membership::MembershipRole;

/// Authorization failure taxonomy
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// No valid identity on the request
    #[error("Authentication required")]
    Unauthenticated,

    /// Identity is valid but the action is not permitted
    #[error("{0}")]
    Forbidden(String),

    /// Resource or membership row absent
    #[error("{0} not found")]
    NotFound(String),

    /// Required input missing or malformed
    #[error("{0}")]
    Validation(String),

    /// Underlying store operation failed
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

impl AuthzError {
    /// Treats a missing resource as a denial
    pub fn fail_closed(self) -> Self {
        match self {
            AuthzError::NotFound(what) => {
                debug!(resource = %what, "Resource not found during authorization, denying");
                AuthzError::Forbidden("You do not have permission to modify this resource".to_string())
            }
            other => other,
        }
    }

    pub fn denied(reason: DenyReason) -> Self {
        AuthzError::Forbidden(reason.message().to_string())
    }
}

/// Converts a policy decision into a guard result
pub fn enforce(decision: Decision) -> Result<(), AuthzError> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => Err(AuthzError::denied(reason)),
    }
}

/// Result of a successful mutation check
#[derive(Debug, Clone)]
pub struct MutationGuard {
    pub resource_id: i64,
    pub state: ResourceState,
    /// Actor's role in the resource's company
    pub role: MembershipRole,
}

#[derive(Debug, sqlx::FromRow)]
struct GuardRow {
    company_id: Option<i64>,
    author_id: Option<i64>,
    status: Option<FinanceStatus>,
    role_in_company: Option<MembershipRole>,
}

fn guard_query(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::FinanceRecord => {
            r#"
            SELECT r.company_id, r.created_by AS author_id, r.status, cu.role_in_company
            FROM finance_records r
            LEFT JOIN company_users cu ON cu.company_id = r.company_id AND cu.user_id = $2
            WHERE r.id = $1
            FOR UPDATE OF r
            "#
        }
        ResourceKind::Note => {
            r#"
            SELECT r.company_id, r.created_by AS author_id, NULL::TEXT AS status, cu.role_in_company
            FROM notes r
            LEFT JOIN company_users cu ON cu.company_id = r.company_id AND cu.user_id = $2
            WHERE r.id = $1
            FOR UPDATE OF r
            "#
        }
        ResourceKind::Task => {
            r#"
            SELECT r.company_id, r.created_by AS author_id, NULL::TEXT AS status, cu.role_in_company
            FROM tasks r
            LEFT JOIN company_users cu ON cu.company_id = r.company_id AND cu.user_id = $2
            WHERE r.id = $1
            FOR UPDATE OF r
            "#
        }
        ResourceKind::CompanyFile => {
            r#"
            SELECT r.company_id, r.uploaded_by AS author_id, NULL::TEXT AS status, cu.role_in_company
            FROM company_files r
            LEFT JOIN company_users cu ON cu.company_id = r.company_id AND cu.user_id = $2
            WHERE r.id = $1
            FOR UPDATE OF r
            "#
        }
    }
}

/// Reads resource state and the actor's membership in one query
///
/// Locks the resource row until the surrounding transaction ends.
///
/// # Errors
///
/// `NotFound` if the resource does not exist, `Store` on database failure.
pub async fn load_resource(
    executor: impl PgExecutor<'_>,
    kind: ResourceKind,
    resource_id: i64,
    actor_id: i64,
) -> Result<(ResourceState, Option<MembershipRole>), AuthzError> {
    let row = sqlx::query_as::<_, GuardRow>(guard_query(kind))
        .bind(resource_id)
        .bind(actor_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AuthzError::NotFound(format!("{} {}", kind.as_str(), resource_id)))?;

    let (Some(company_id), Some(author_id)) = (row.company_id, row.author_id) else {
        return Err(AuthzError::NotFound(format!("{} {}", kind.as_str(), resource_id)));
    };

    let state = ResourceState {
        kind,
        company_id,
        author_id,
        status: row.status,
    };

    Ok((state, row.role_in_company))
}

/// Checks whether `actor_id` may update or delete a company resource
///
/// # Errors
///
/// `Forbidden` when the policy denies or the resource does not exist,
/// `Store` on database failure.
pub async fn authorize_mutation(
    executor: impl PgExecutor<'_>,
    kind: ResourceKind,
    resource_id: i64,
    actor_id: i64,
    action: MutationAction,
) -> Result<MutationGuard, AuthzError> {
    let (state, membership) = load_resource(executor, kind, resource_id, actor_id)
        .await
        .map_err(AuthzError::fail_closed)?;

    let decision = can_mutate(actor_id, &state, membership, action);

    debug!(
        actor_id,
        resource = kind.as_str(),
        resource_id,
        action = action.as_str(),
        ?decision,
        "Mutation policy evaluated"
    );

    enforce(decision)?;

    // Allow implies membership
    let role = membership.ok_or_else(|| AuthzError::denied(DenyReason::NotMember))?;

    Ok(MutationGuard {
        resource_id,
        state,
        role,
    })
}

/// Finance file state: the file row plus its parent record, if it still exists
#[derive(Debug, sqlx::FromRow)]
struct FinanceFileRow {
    finance_record_id: i64,
    company_id: Option<i64>,
    author_id: Option<i64>,
    status: Option<FinanceStatus>,
    role_in_company: Option<MembershipRole>,
}

/// Checks whether `actor_id` may delete a finance file
///
/// The decision is the parent finance record's, status gate included. A
/// file whose parent record is gone cannot be authorized.
pub async fn authorize_finance_file_mutation(
    executor: impl PgExecutor<'_>,
    file_id: i64,
    actor_id: i64,
    action: MutationAction,
) -> Result<MutationGuard, AuthzError> {
    let row = sqlx::query_as::<_, FinanceFileRow>(
        r#"
        SELECT f.finance_record_id, r.company_id, r.created_by AS author_id, r.status,
               cu.role_in_company
        FROM finance_files f
        LEFT JOIN finance_records r ON r.id = f.finance_record_id
        LEFT JOIN company_users cu ON cu.company_id = r.company_id AND cu.user_id = $2
        WHERE f.id = $1
        FOR UPDATE OF f
        "#,
    )
    .bind(file_id)
    .bind(actor_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AuthzError::NotFound(format!("finance_file {}", file_id)).fail_closed())?;

    let (Some(company_id), Some(author_id)) = (row.company_id, row.author_id) else {
        debug!(file_id, finance_record_id = row.finance_record_id, "Finance file has no parent record");
        return Err(AuthzError::NotFound(format!("finance_record {}", row.finance_record_id)).fail_closed());
    };

    let state = ResourceState {
        kind: ResourceKind::FinanceRecord,
        company_id,
        author_id,
        status: row.status,
    };

    enforce(can_mutate(actor_id, &state, row.role_in_company, action))?;

    let role = row
        .role_in_company
        .ok_or_else(|| AuthzError::denied(DenyReason::NotMember))?;

    Ok(MutationGuard {
        resource_id: file_id,
        state,
        role,
    })
}

/// Requires any membership in a company; returns the actor's role
pub async fn require_member(
    executor: impl PgExecutor<'_>,
    company_id: i64,
    user_id: i64,
) -> Result<MembershipRole, AuthzError> {
    let role: Option<MembershipRole> = sqlx::query_scalar(
        "SELECT role_in_company FROM company_users WHERE company_id = $1 AND user_id = $2",
    )
    .bind(company_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    role.ok_or_else(|| AuthzError::denied(DenyReason::NotMember))
}

/// Requires the owner or admin role in a company
pub async fn require_manager(
    executor: impl PgExecutor<'_>,
    company_id: i64,
    user_id: i64,
) -> Result<MembershipRole, AuthzError> {
    let role = require_member(executor, company_id, user_id).await?;

    if role.is_manager() {
        Ok(role)
    } else {
        Err(AuthzError::Forbidden(
            "Only a company owner or admin can do this".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_closed_converts_not_found() {
        let err = AuthzError::NotFound("note 5".to_string()).fail_closed();
        assert!(matches!(err, AuthzError::Forbidden(_)));
    }

    #[test]
    fn test_fail_closed_keeps_other_errors() {
        assert!(matches!(
            AuthzError::Validation("title is required".to_string()).fail_closed(),
            AuthzError::Validation(_)
        ));
        assert!(matches!(AuthzError::Unauthenticated.fail_closed(), AuthzError::Unauthenticated));
    }

    #[test]
    fn test_enforce() {
        assert!(enforce(Decision::Allow).is_ok());

        match enforce(Decision::Deny(DenyReason::StatusLocked)) {
            Err(AuthzError::Forbidden(msg)) => assert!(msg.contains("no longer pending")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_every_kind_has_a_locking_query() {
        for kind in [
            ResourceKind::FinanceRecord,
            ResourceKind::Note,
            ResourceKind::Task,
            ResourceKind::CompanyFile,
        ] {
            let sql = guard_query(kind);
            assert!(sql.contains("FOR UPDATE OF r"));
            assert!(sql.contains("LEFT JOIN company_users"));
        }
    }
}
