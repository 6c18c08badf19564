/// Database models for CompanySync
///
/// Each model owns the SQL for its table. Functions that run a single
/// statement take any `PgExecutor`, so handlers can call them on the pool or
/// inside a transaction.
///
/// # Models
///
/// - `user`: Accounts with a global role (`user`, `admin`, `support`)
/// - `session`: Login sessions (hashed tokens)
/// - `company`: Companies
/// - `membership`: User-company links with a role in the company
/// - `finance_record`: Income/expense entries with a review status
/// - `note`: Company notes
/// - `task`: Company tasks
/// - `file`: Metadata of uploaded company and finance files
/// - `setting`: Key/value application settings
/// - `support_chat`: Support chat threads
/// - `page`: Pagination shared by list queries
///
/// Audit log entries are read and written by the `audit` module.
///
/// # Example
///
/// ```no_run
/// use companysync_shared::models::note::{CreateNote, Note};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let note = Note::create(&pool, CreateNote {
///     company_id: 1,
///     created_by: 2,
///     title: "Quarterly plan".to_string(),
///     content: String::new(),
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod company;
pub mod file;
pub mod finance_record;
pub mod membership;
pub mod note;
pub mod page;
pub mod session;
pub mod setting;
pub mod support_chat;
pub mod task;
pub mod user;
