/// Audit log
///
/// An append-only record of every administrative or company mutation.
/// Entries are written on the same transaction as the mutation they
/// describe, behind a savepoint: a failed audit insert is rolled back on its
/// own, logged at `warn`, and never fails the mutation.
///
/// # Modules
///
/// - `writer`: Appending entries
/// - `query`: Filtered, paginated reads
/// - `csv`: CSV rendering for exports
///
/// # Example
///
/// ```no_run
/// use companysync_shared::audit::{writer::record_or_warn, AuditAction};
/// use serde_json::json;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
/// // ... mutation on `tx` ...
/// record_or_warn(&mut tx, Some(42), AuditAction::BanUser, json!({"targetUserId": 7})).await;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

pub mod csv;
pub mod query;
pub mod writer;

use serde::{Deserialize, Serialize};

pub use query::{AuditFilter, LogEntry};

/// Action tags written to `logs.action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreateCompany,
    UpdateCompany,
    DeleteCompany,
    AddEmployee,
    UpdateEmployee,
    RemoveEmployee,
    CreateFinanceRecord,
    UpdateFinanceRecord,
    DeleteFinanceRecord,
    SetFinanceStatus,
    UploadFinanceFile,
    DeleteFinanceFile,
    CreateNote,
    UpdateNote,
    DeleteNote,
    CreateTask,
    UpdateTask,
    DeleteTask,
    UploadCompanyFile,
    DeleteCompanyFile,
    BanUser,
    UnbanUser,
    ChangeUserRole,
    DeleteUser,
    UpdateSetting,
    PurgeSupportMessages,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateCompany => "create_company",
            AuditAction::UpdateCompany => "update_company",
            AuditAction::DeleteCompany => "delete_company",
            AuditAction::AddEmployee => "add_employee",
            AuditAction::UpdateEmployee => "update_employee",
            AuditAction::RemoveEmployee => "remove_employee",
            AuditAction::CreateFinanceRecord => "create_finance_record",
            AuditAction::UpdateFinanceRecord => "update_finance_record",
            AuditAction::DeleteFinanceRecord => "delete_finance_record",
            AuditAction::SetFinanceStatus => "set_finance_status",
            AuditAction::UploadFinanceFile => "upload_finance_file",
            AuditAction::DeleteFinanceFile => "delete_finance_file",
            AuditAction::CreateNote => "create_note",
            AuditAction::UpdateNote => "update_note",
            AuditAction::DeleteNote => "delete_note",
            AuditAction::CreateTask => "create_task",
            AuditAction::UpdateTask => "update_task",
            AuditAction::DeleteTask => "delete_task",
            AuditAction::UploadCompanyFile => "upload_company_file",
            AuditAction::DeleteCompanyFile => "delete_company_file",
            AuditAction::BanUser => "ban_user",
            AuditAction::UnbanUser => "unban_user",
            AuditAction::ChangeUserRole => "change_user_role",
            AuditAction::DeleteUser => "delete_user",
            AuditAction::UpdateSetting => "update_setting",
            AuditAction::PurgeSupportMessages => "purge_support_messages",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
