/// Mutation policy for company-scoped resources
///
/// Pure decision functions over state the caller has already loaded. Nothing
/// here touches the database; `auth::authorization` performs the combined
/// read and feeds the result in.
///
/// # Rule
///
/// For finance records, notes, tasks and company files:
///
/// 1. No membership in the resource's company: deny.
/// 2. Company owner or admin: allow, whatever the author or status.
/// 3. Author, when the resource kind has no status gate or its status is
///    `pending`: allow.
/// 4. Anything else: deny.
///
/// Only finance records carry a status gate. Notes, tasks and company files
/// stay editable by their author indefinitely.
///
/// # Example
///
/// ```
/// use companysync_shared::auth::policy::{can_mutate, MutationAction, ResourceKind, ResourceState};
/// use companysync_shared::models::finance_record::FinanceStatus;
/// use companysync_shared::models::membership::MembershipRole;
///
/// let record = ResourceState {
///     kind: ResourceKind::FinanceRecord,
///     company_id: 1,
///     author_id: 10,
///     status: Some(FinanceStatus::Approved),
/// };
///
/// // The author lost edit rights once the record was approved
/// let decision = can_mutate(10, &record, Some(MembershipRole::Member), MutationAction::Update);
/// assert!(decision.is_denied());
///
/// // The owner keeps them
/// let decision = can_mutate(20, &record, Some(MembershipRole::Owner), MutationAction::Update);
/// assert!(decision.is_allowed());
/// ```

use serde::Serialize;

use crate::models::finance_record::FinanceStatus;
use crate::models::membership::MembershipRole;

/// Company-scoped resource kinds subject to the mutation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    FinanceRecord,
    Note,
    Task,
    CompanyFile,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::FinanceRecord => "finance_record",
            ResourceKind::Note => "note",
            ResourceKind::Task => "task",
            ResourceKind::CompanyFile => "company_file",
        }
    }

    /// Whether author rights end once the resource leaves `pending`
    pub fn has_status_gate(&self) -> bool {
        matches!(self, ResourceKind::FinanceRecord)
    }
}

/// Current state of a resource, as read from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    pub kind: ResourceKind,
    pub company_id: i64,
    pub author_id: i64,
    /// Review status; only meaningful for gated kinds
    pub status: Option<FinanceStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Update,
    Delete,
}

impl MutationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationAction::Update => "update",
            MutationAction::Delete => "delete",
        }
    }
}

/// Why a mutation was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Actor has no membership row in the resource's company
    NotMember,

    /// Actor is a plain member and not the author
    NotAuthor,

    /// Actor is the author but the resource is no longer pending
    StatusLocked,

    /// An account may not delete itself
    SelfDeletion,
}

impl DenyReason {
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::NotMember => "You are not a member of this company",
            DenyReason::NotAuthor => "Only the author or a company owner/admin can change this",
            DenyReason::StatusLocked => "This record is no longer pending and can only be changed by an owner or admin",
            DenyReason::SelfDeletion => "You cannot delete your own account",
        }
    }
}

/// Outcome of a policy check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }
}

/// Decides whether `actor_id` may update or delete `resource`
///
/// `membership` is the actor's role in `resource.company_id`, or `None` if
/// the actor is not a member. Update and delete are governed by the same
/// rule; the action is accepted so call sites read as the contract does.
///
/// A gated resource with no recorded status is treated as not pending.
pub fn can_mutate(
    actor_id: i64,
    resource: &ResourceState,
    membership: Option<MembershipRole>,
    _action: MutationAction,
) -> Decision {
    let Some(role) = membership else {
        return Decision::Deny(DenyReason::NotMember);
    };

    if role.is_manager() {
        return Decision::Allow;
    }

    if resource.author_id != actor_id {
        return Decision::Deny(DenyReason::NotAuthor);
    }

    if !resource.kind.has_status_gate() || resource.status == Some(FinanceStatus::Pending) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::StatusLocked)
    }
}

/// Self-protection for account deletion
///
/// Denies whenever the target is the actor, independent of the actor's
/// global role. Role checks happen separately.
pub fn can_delete_user(actor_id: i64, target_id: i64) -> Decision {
    if actor_id == target_id {
        Decision::Deny(DenyReason::SelfDeletion)
    } else {
        Decision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHOR: i64 = 10;
    const OTHER: i64 = 20;

    const KINDS: [ResourceKind; 4] = [
        ResourceKind::FinanceRecord,
        ResourceKind::Note,
        ResourceKind::Task,
        ResourceKind::CompanyFile,
    ];

    const STATUSES: [Option<FinanceStatus>; 4] = [
        None,
        Some(FinanceStatus::Pending),
        Some(FinanceStatus::Approved),
        Some(FinanceStatus::Rejected),
    ];

    const ACTIONS: [MutationAction; 2] = [MutationAction::Update, MutationAction::Delete];

    fn resource(kind: ResourceKind, status: Option<FinanceStatus>) -> ResourceState {
        ResourceState {
            kind,
            company_id: 1,
            author_id: AUTHOR,
            status,
        }
    }

    #[test]
    fn test_non_member_always_denied() {
        for kind in KINDS {
            for status in STATUSES {
                for action in ACTIONS {
                    for actor in [AUTHOR, OTHER] {
                        assert_eq!(
                            can_mutate(actor, &resource(kind, status), None, action),
                            Decision::Deny(DenyReason::NotMember),
                            "{:?} {:?} {:?} actor={}",
                            kind,
                            status,
                            action,
                            actor
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_owner_and_admin_always_allowed() {
        for role in [MembershipRole::Owner, MembershipRole::Admin] {
            for kind in KINDS {
                for status in STATUSES {
                    for action in ACTIONS {
                        for actor in [AUTHOR, OTHER] {
                            assert!(
                                can_mutate(actor, &resource(kind, status), Some(role), action).is_allowed(),
                                "{:?} {:?} {:?} {:?}",
                                role,
                                kind,
                                status,
                                action
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_finance_author_allowed_only_while_pending() {
        let member = Some(MembershipRole::Member);

        for action in ACTIONS {
            let pending = resource(ResourceKind::FinanceRecord, Some(FinanceStatus::Pending));
            assert_eq!(can_mutate(AUTHOR, &pending, member, action), Decision::Allow);

            for status in [FinanceStatus::Approved, FinanceStatus::Rejected] {
                let locked = resource(ResourceKind::FinanceRecord, Some(status));
                assert_eq!(
                    can_mutate(AUTHOR, &locked, member, action),
                    Decision::Deny(DenyReason::StatusLocked)
                );
            }
        }
    }

    #[test]
    fn test_finance_without_status_fails_closed() {
        let record = resource(ResourceKind::FinanceRecord, None);
        assert!(can_mutate(AUTHOR, &record, Some(MembershipRole::Member), MutationAction::Update).is_denied());
    }

    #[test]
    fn test_note_author_allowed_regardless_of_status() {
        // Notes have no status gate, unlike finance records
        for status in STATUSES {
            let note = resource(ResourceKind::Note, status);
            let record = resource(ResourceKind::FinanceRecord, status);

            assert_eq!(
                can_mutate(AUTHOR, &note, Some(MembershipRole::Member), MutationAction::Update),
                Decision::Allow
            );

            let expected = if status == Some(FinanceStatus::Pending) {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::StatusLocked)
            };
            assert_eq!(
                can_mutate(AUTHOR, &record, Some(MembershipRole::Member), MutationAction::Update),
                expected
            );
        }
    }

    #[test]
    fn test_tasks_and_files_follow_note_rule() {
        for kind in [ResourceKind::Task, ResourceKind::CompanyFile] {
            assert!(!kind.has_status_gate());
            let res = resource(kind, Some(FinanceStatus::Approved));
            assert!(can_mutate(AUTHOR, &res, Some(MembershipRole::Member), MutationAction::Delete).is_allowed());
        }
    }

    #[test]
    fn test_member_cannot_touch_others_resources() {
        for kind in KINDS {
            let res = resource(kind, Some(FinanceStatus::Pending));
            assert_eq!(
                can_mutate(OTHER, &res, Some(MembershipRole::Member), MutationAction::Update),
                Decision::Deny(DenyReason::NotAuthor)
            );
        }
    }

    #[test]
    fn test_author_member_then_owner_approves() {
        let a = 1;
        let owner = 2;
        let mut record = ResourceState {
            kind: ResourceKind::FinanceRecord,
            company_id: 7,
            author_id: a,
            status: Some(FinanceStatus::Pending),
        };

        assert!(can_mutate(a, &record, Some(MembershipRole::Member), MutationAction::Update).is_allowed());

        record.status = Some(FinanceStatus::Approved);

        assert!(can_mutate(a, &record, Some(MembershipRole::Member), MutationAction::Update).is_denied());
        assert!(can_mutate(owner, &record, Some(MembershipRole::Owner), MutationAction::Update).is_allowed());
    }

    #[test]
    fn test_self_deletion_always_denied() {
        for id in [1, 42, i64::MAX] {
            assert_eq!(can_delete_user(id, id), Decision::Deny(DenyReason::SelfDeletion));
        }
        assert_eq!(can_delete_user(1, 2), Decision::Allow);
    }

    #[test]
    fn test_only_finance_records_are_gated() {
        let gated: Vec<_> = KINDS.iter().filter(|k| k.has_status_gate()).collect();
        assert_eq!(gated, vec![&ResourceKind::FinanceRecord]);
    }
}
