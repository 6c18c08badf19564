/// File endpoints
///
/// - `GET    /v1/companies/:company_id/files`: List company files (members)
/// - `POST   /v1/companies/:company_id/files`: Upload (members)
/// - `DELETE /v1/company-files/:file_id`: Delete (uploader, owner, or admin)
/// - `GET    /v1/finance/:record_id/files`: List a record's files (members)
/// - `POST   /v1/finance/:record_id/files`: Upload (same rule as editing the record)
/// - `DELETE /v1/finance-files/:file_id`: Delete (same rule as editing the record)
///
/// Uploads are `multipart/form-data` with the file in a field named `file`.
/// Bytes go to the blob store first; if the database write then fails the
/// blob is removed again. Blob removal after a row delete is best effort.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use bytes::Bytes;
use companysync_shared::{
    audit::{writer::record_or_warn, AuditAction},
    auth::{
        authorization::{authorize_finance_file_mutation, authorize_mutation, require_member},
        identity::Identity,
        policy::{MutationAction, ResourceKind},
    },
    models::{
        file::{CompanyFile, FinanceFile, NewFile},
        finance_record::FinanceRecord,
    },
    storage::{BlobStore, StoredBlob},
};
use serde_json::json;

/// Multipart field carrying the file
pub const FILE_FIELD: &str = "file";

const MAX_FILENAME_CHARS: usize = 255;
const DEFAULT_MIMETYPE: &str = "application/octet-stream";

/// A file read out of a multipart body
#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub mimetype: String,
    pub data: Bytes,
}

/// Display name for an upload: the last path component, trimmed and
/// length-limited
pub fn clean_filename(raw: &str) -> String {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILENAME_CHARS)
        .collect::<String>();

    if name.is_empty() || name == "." || name == ".." {
        "upload".to_string()
    } else {
        name
    }
}

/// Reads the `file` field, ignoring any other fields
async fn read_upload(multipart: &mut Multipart, max_bytes: usize) -> ApiResult<Upload> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = clean_filename(field.file_name().unwrap_or_default());
        let mimetype = field
            .content_type()
            .unwrap_or(DEFAULT_MIMETYPE)
            .to_string();
        let data = field.bytes().await?;

        if data.is_empty() {
            return Err(ApiError::invalid(FILE_FIELD, "Empty file provided"));
        }
        if data.len() > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "File exceeds the {} byte limit",
                max_bytes
            )));
        }

        return Ok(Upload {
            filename,
            mimetype,
            data,
        });
    }

    Err(ApiError::invalid(FILE_FIELD, "No 'file' field found"))
}

/// Best-effort blob removal
async fn discard_blob(storage: &dyn BlobStore, key: &str) {
    if let Err(e) = storage.delete(key).await {
        tracing::warn!(key, error = %e, "Failed to remove blob");
    }
}

fn new_file(uploaded_by: i64, upload: &Upload, blob: &StoredBlob) -> NewFile {
    NewFile {
        uploaded_by,
        filename: upload.filename.clone(),
        storage_key: blob.key.clone(),
        url: blob.url.clone(),
        mimetype: upload.mimetype.clone(),
        size_bytes: upload.data.len() as i64,
    }
}

pub async fn list_company_files(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
) -> ApiResult<Json<Vec<CompanyFile>>> {
    require_member(&state.db, company_id, identity.user_id).await?;
    Ok(Json(CompanyFile::list_for_company(&state.db, company_id).await?))
}

pub async fn upload_company_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<CompanyFile>)> {
    // Check membership before reading the body
    require_member(&state.db, company_id, identity.user_id).await?;

    let upload = read_upload(&mut multipart, state.config.uploads.max_bytes).await?;
    let blob = state.storage.save(&upload.filename, upload.data.clone()).await?;

    let result: ApiResult<CompanyFile> = async {
        let mut tx = state.db.begin().await?;

        require_member(&mut *tx, company_id, identity.user_id).await?;

        let file = CompanyFile::create(&mut *tx, company_id, new_file(identity.user_id, &upload, &blob)).await?;

        record_or_warn(
            &mut tx,
            Some(identity.user_id),
            AuditAction::UploadCompanyFile,
            json!({
                "companyId": company_id,
                "fileId": file.id,
                "filename": file.filename,
                "size": file.size_bytes,
            }),
        )
        .await;

        tx.commit().await?;
        Ok(file)
    }
    .await;

    match result {
        Ok(file) => Ok((StatusCode::CREATED, Json(file))),
        Err(e) => {
            discard_blob(state.storage.as_ref(), &blob.key).await;
            Err(e)
        }
    }
}

pub async fn delete_company_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(file_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let guard = authorize_mutation(
        &mut *tx,
        ResourceKind::CompanyFile,
        file_id,
        identity.user_id,
        MutationAction::Delete,
    )
    .await?;

    let file = CompanyFile::delete(&mut *tx, file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found".to_string()))?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::DeleteCompanyFile,
        json!({
            "companyId": guard.state.company_id,
            "fileId": file_id,
            "filename": file.filename,
        }),
    )
    .await;

    tx.commit().await?;

    discard_blob(state.storage.as_ref(), &file.storage_key).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_finance_files(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(record_id): Path<i64>,
) -> ApiResult<Json<Vec<FinanceFile>>> {
    let record = FinanceRecord::find_by_id(&state.db, record_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Finance record not found".to_string()))?;

    require_member(&state.db, record.company_id, identity.user_id).await?;

    Ok(Json(FinanceFile::list_for_record(&state.db, record_id).await?))
}

pub async fn upload_finance_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(record_id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<FinanceFile>)> {
    let upload = read_upload(&mut multipart, state.config.uploads.max_bytes).await?;

    let mut tx = state.db.begin().await?;

    // Attaching a file edits the record
    let guard = authorize_mutation(
        &mut *tx,
        ResourceKind::FinanceRecord,
        record_id,
        identity.user_id,
        MutationAction::Update,
    )
    .await?;

    let blob = state.storage.save(&upload.filename, upload.data.clone()).await?;

    let result: ApiResult<FinanceFile> = async {
        let file = FinanceFile::create(&mut *tx, record_id, new_file(identity.user_id, &upload, &blob)).await?;

        record_or_warn(
            &mut tx,
            Some(identity.user_id),
            AuditAction::UploadFinanceFile,
            json!({
                "companyId": guard.state.company_id,
                "recordId": record_id,
                "fileId": file.id,
                "filename": file.filename,
                "size": file.size_bytes,
            }),
        )
        .await;

        tx.commit().await?;
        Ok(file)
    }
    .await;

    match result {
        Ok(file) => Ok((StatusCode::CREATED, Json(file))),
        Err(e) => {
            discard_blob(state.storage.as_ref(), &blob.key).await;
            Err(e)
        }
    }
}

/// Deletes a finance file under its parent record's rules
///
/// Files whose record no longer exists are refused.
pub async fn delete_finance_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(file_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let guard = authorize_finance_file_mutation(&mut *tx, file_id, identity.user_id, MutationAction::Delete).await?;

    let file = FinanceFile::delete(&mut *tx, file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found".to_string()))?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::DeleteFinanceFile,
        json!({
            "companyId": guard.state.company_id,
            "recordId": file.finance_record_id,
            "fileId": file_id,
            "filename": file.filename,
        }),
    )
    .await;

    tx.commit().await?;

    discard_blob(state.storage.as_ref(), &file.storage_key).await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_filename() {
        assert_eq!(clean_filename("report.pdf"), "report.pdf");
        assert_eq!(clean_filename("C:\\Users\\me\\scan.png"), "scan.png");
        assert_eq!(clean_filename("../../etc/passwd"), "passwd");
        assert_eq!(clean_filename("  "), "upload");
        assert_eq!(clean_filename("dir/"), "upload");
        assert_eq!(clean_filename(&"x".repeat(400)).chars().count(), MAX_FILENAME_CHARS);
    }
}
