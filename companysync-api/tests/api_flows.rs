/// End-to-end API flows against PostgreSQL
///
/// Each test returns early when `DATABASE_URL` is unset. Accounts and
/// companies use unique names, so tests can share one database.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{empty_request, json_request, read_json, read_text, unique_name, TestContext, TEST_PASSWORD};
use companysync_shared::auth::password::validate_password_strength;
use companysync_shared::models::user::{GlobalRole, User};
use serde_json::json;

const BOUNDARY: &str = "companysync-test-boundary";

#[test]
fn test_fixture_password_is_accepted() {
    assert_eq!(validate_password_strength(TEST_PASSWORD), Ok(()));
}

fn multipart_request(uri: &str, token: &str, filename: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/plain\r\n\r\n{c}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = filename,
        c = content,
    );

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Creates a company as `token` and returns its id
async fn create_company(ctx: &TestContext, token: &str) -> i64 {
    let response = ctx
        .send(json_request(
            "POST",
            "/v1/companies",
            Some(token),
            json!({ "name": unique_name("Company") }),
        ))
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["role_in_company"], "owner");
    body["id"].as_i64().unwrap()
}

/// Adds the account behind `user_id` to a company as a member
async fn add_employee(ctx: &TestContext, owner_token: &str, company_id: i64, user_id: i64) {
    let user = User::find_by_id(&ctx.db, user_id).await.unwrap().unwrap();
    let response = ctx
        .send(json_request(
            "POST",
            &format!("/v1/companies/{}/employees", company_id),
            Some(owner_token),
            json!({ "email": user.email }),
        ))
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["user_created"], false);
}

async fn audit_count(ctx: &TestContext, action: &str, key: &str, id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM logs WHERE action = $1 AND metadata->>$2 = $3")
        .bind(action)
        .bind(key)
        .bind(id.to_string())
        .fetch_one(&ctx.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_register_login_me_logout() {
    let Some(ctx) = TestContext::new().await else { return };

    let (user_id, token) = ctx.register("flow").await;

    let (status, me) = read_json(ctx.send(empty_request("GET", "/v1/auth/me", Some(&token))).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user_id"], user_id);
    assert_eq!(me["role"], "user");
    assert_eq!(me["companies"], json!([]));

    // Email lookup is case-insensitive
    let user = User::find_by_id(&ctx.db, user_id).await.unwrap().unwrap();
    let login = ctx
        .send(json_request(
            "POST",
            "/v1/auth/login",
            None,
            json!({ "email": user.email.to_uppercase(), "password": TEST_PASSWORD }),
        ))
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    let cookie = login.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("session=cs_"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    // The cookie alone authenticates, quoted or not
    let cookie_token = cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("session="))
        .unwrap()
        .to_string();
    for value in [cookie_token.clone(), format!("\"{}\"", cookie_token)] {
        let request = Request::builder()
            .uri("/v1/auth/me")
            .header(header::COOKIE, format!("theme=dark; session={}", value))
            .body(Body::empty())
            .unwrap();
        assert_eq!(ctx.send(request).await.status(), StatusCode::OK, "{}", value);
    }

    let cookie_logout = ctx
        .send(
            Request::builder()
                .method("POST")
                .uri("/v1/auth/logout")
                .header(header::COOKIE, format!("session={}", cookie_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(cookie_logout.status(), StatusCode::NO_CONTENT);
    let cleared = cookie_logout.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.starts_with("session=;"));
    assert!(cleared.contains("Max-Age=0"));

    let wrong = ctx
        .send(json_request(
            "POST",
            "/v1/auth/login",
            None,
            json!({ "email": user.email, "password": "wrong password!" }),
        ))
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let logout = ctx.send(empty_request("POST", "/v1/auth/logout", Some(&token))).await;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let after = ctx.send(empty_request("GET", "/v1/auth/me", Some(&token))).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let Some(ctx) = TestContext::new().await else { return };

    let (user_id, _) = ctx.register("dup").await;
    let user = User::find_by_id(&ctx.db, user_id).await.unwrap().unwrap();

    let response = ctx
        .send(json_request(
            "POST",
            "/v1/auth/register",
            None,
            json!({
                "username": unique_name("other"),
                "email": user.email,
                "password": TEST_PASSWORD,
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_finance_approval_flow() {
    let Some(ctx) = TestContext::new().await else { return };

    let (_, owner) = ctx.register("owner").await;
    let (member_id, member) = ctx.register("member").await;
    let (_, outsider) = ctx.register("outsider").await;

    let company_id = create_company(&ctx, &owner).await;
    add_employee(&ctx, &owner, company_id, member_id).await;

    // Member creates a pending record
    let (status, record) = read_json(
        ctx.send(json_request(
            "POST",
            &format!("/v1/companies/{}/finance", company_id),
            Some(&member),
            json!({ "kind": "expense", "amount": "120.50", "category": "Travel" }),
        ))
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", record);
    assert_eq!(record["status"], "pending");
    let record_id = record["id"].as_i64().unwrap();
    let record_uri = format!("/v1/finance/{}", record_id);

    // Outsiders see nothing and change nothing
    let listed = ctx
        .send(empty_request("GET", &format!("/v1/companies/{}/finance", company_id), Some(&outsider)))
        .await;
    assert_eq!(listed.status(), StatusCode::FORBIDDEN);
    let edit = ctx
        .send(json_request("PUT", &record_uri, Some(&outsider), json!({ "amount": "1.00" })))
        .await;
    assert_eq!(edit.status(), StatusCode::FORBIDDEN);

    // The author edits while pending
    let edit = ctx
        .send(json_request("PUT", &record_uri, Some(&member), json!({ "amount": "99.99" })))
        .await;
    assert_eq!(edit.status(), StatusCode::OK);

    // Members cannot approve
    let approve = ctx
        .send(json_request(
            "PUT",
            &format!("{}/status", record_uri),
            Some(&member),
            json!({ "status": "approved" }),
        ))
        .await;
    assert_eq!(approve.status(), StatusCode::FORBIDDEN);

    // The owner approves
    let (status, approved) = read_json(
        ctx.send(json_request(
            "PUT",
            &format!("{}/status", record_uri),
            Some(&owner),
            json!({ "status": "approved" }),
        ))
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");

    // After approval the author loses edit and delete rights
    let edit = ctx
        .send(json_request("PUT", &record_uri, Some(&member), json!({ "amount": "1.00" })))
        .await;
    assert_eq!(edit.status(), StatusCode::FORBIDDEN);
    let delete = ctx.send(empty_request("DELETE", &record_uri, Some(&member))).await;
    assert_eq!(delete.status(), StatusCode::FORBIDDEN);

    // The owner keeps them
    let edit = ctx
        .send(json_request("PUT", &record_uri, Some(&owner), json!({ "category": "Flights" })))
        .await;
    assert_eq!(edit.status(), StatusCode::OK);

    assert_eq!(audit_count(&ctx, "create_finance_record", "recordId", record_id).await, 1);
    assert_eq!(audit_count(&ctx, "update_finance_record", "recordId", record_id).await, 2);
    assert_eq!(audit_count(&ctx, "set_finance_status", "recordId", record_id).await, 1);

    let delete = ctx.send(empty_request("DELETE", &record_uri, Some(&owner))).await;
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);

    // A deleted record is indistinguishable from a forbidden one
    let again = ctx.send(empty_request("DELETE", &record_uri, Some(&owner))).await;
    assert_eq!(again.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_note_author_and_owner_rights() {
    let Some(ctx) = TestContext::new().await else { return };

    let (_, owner) = ctx.register("owner").await;
    let (author_id, author) = ctx.register("author").await;
    let (other_id, other) = ctx.register("other").await;

    let company_id = create_company(&ctx, &owner).await;
    add_employee(&ctx, &owner, company_id, author_id).await;
    add_employee(&ctx, &owner, company_id, other_id).await;

    let (status, note) = read_json(
        ctx.send(json_request(
            "POST",
            &format!("/v1/companies/{}/notes", company_id),
            Some(&author),
            json!({ "title": "Standup", "content": "Ship it" }),
        ))
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let note_uri = format!("/v1/notes/{}", note["id"].as_i64().unwrap());

    let by_other = ctx
        .send(json_request("PUT", &note_uri, Some(&other), json!({ "title": "Mine" })))
        .await;
    assert_eq!(by_other.status(), StatusCode::FORBIDDEN);

    let by_author = ctx
        .send(json_request("PUT", &note_uri, Some(&author), json!({ "title": "Standup notes" })))
        .await;
    assert_eq!(by_author.status(), StatusCode::OK);

    let by_owner = ctx.send(empty_request("DELETE", &note_uri, Some(&owner))).await;
    assert_eq!(by_owner.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_company_file_upload_and_delete() {
    let Some(ctx) = TestContext::new().await else { return };

    let (_, owner) = ctx.register("owner").await;
    let company_id = create_company(&ctx, &owner).await;

    let (status, file) = read_json(
        ctx.send(multipart_request(
            &format!("/v1/companies/{}/files", company_id),
            &owner,
            "notes.txt",
            "hello files",
        ))
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", file);
    assert_eq!(file["filename"], "notes.txt");
    assert_eq!(file["mimetype"], "text/plain");
    assert_eq!(file["size_bytes"], 11);

    let url = file["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/"));
    assert!(url.ends_with(".txt"));

    let served = ctx.send(empty_request("GET", &url, None)).await;
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(read_text(served).await, "hello files");

    let file_id = file["id"].as_i64().unwrap();
    let delete = ctx
        .send(empty_request("DELETE", &format!("/v1/company-files/{}", file_id), Some(&owner)))
        .await;
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);

    let gone = ctx.send(empty_request("GET", &url, None)).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_without_file_field_rejected() {
    let Some(ctx) = TestContext::new().await else { return };

    let (_, owner) = ctx.register("owner").await;
    let company_id = create_company(&ctx, &owner).await;

    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/companies/{}/files", company_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", owner))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap();

    let (status, body) = read_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "file");
}

#[tokio::test]
async fn test_support_thread_unread_count() {
    let Some(ctx) = TestContext::new().await else { return };

    let (user_id, user) = ctx.register("customer").await;
    let (staff_id, staff) = ctx.register("staff").await;
    User::set_role(&ctx.db, staff_id, GlobalRole::Support).await.unwrap();

    // Regular users cannot open the inbox
    let inbox = ctx.send(empty_request("GET", "/v1/support/threads", Some(&user))).await;
    assert_eq!(inbox.status(), StatusCode::FORBIDDEN);

    let sent = ctx
        .send(json_request("POST", "/v1/support/messages", Some(&user), json!({ "body": "Help!" })))
        .await;
    assert_eq!(sent.status(), StatusCode::CREATED);

    let (status, thread) = read_json(
        ctx.send(empty_request("GET", &format!("/v1/support/threads/{}", user_id), Some(&staff)))
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread.as_array().unwrap().len(), 1);

    let replied = ctx
        .send(json_request(
            "POST",
            &format!("/v1/support/threads/{}", user_id),
            Some(&staff),
            json!({ "body": "On it" }),
        ))
        .await;
    assert_eq!(replied.status(), StatusCode::CREATED);

    let (_, unread) = read_json(ctx.send(empty_request("GET", "/v1/support/unread", Some(&user))).await).await;
    assert_eq!(unread["unread"], 1);

    let (_, messages) = read_json(ctx.send(empty_request("GET", "/v1/support/messages", Some(&user))).await).await;
    assert_eq!(messages.as_array().unwrap().len(), 2);

    let (_, unread) = read_json(ctx.send(empty_request("GET", "/v1/support/unread", Some(&user))).await).await;
    assert_eq!(unread["unread"], 0);
}

#[tokio::test]
async fn test_admin_ban_and_log_export() {
    let Some(ctx) = TestContext::new().await else { return };

    let (admin_id, admin) = ctx.register("admin").await;
    let (target_id, target) = ctx.register("target").await;
    let (_, regular) = ctx.register("regular").await;
    User::set_role(&ctx.db, admin_id, GlobalRole::Admin).await.unwrap();

    let denied = ctx.send(empty_request("GET", "/v1/admin/users", Some(&regular))).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let self_delete = ctx
        .send(empty_request("DELETE", &format!("/v1/admin/users/{}", admin_id), Some(&admin)))
        .await;
    assert_eq!(self_delete.status(), StatusCode::FORBIDDEN);

    let (status, banned) = read_json(
        ctx.send(empty_request("POST", &format!("/v1/admin/users/{}/ban", target_id), Some(&admin)))
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(banned["active"], false);

    // Banning revokes existing sessions
    let me = ctx.send(empty_request("GET", "/v1/auth/me", Some(&target))).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    let admin_user = User::find_by_id(&ctx.db, admin_id).await.unwrap().unwrap();

    let (status, page) = read_json(
        ctx.send(empty_request(
            "GET",
            &format!("/v1/admin/logs?action=ban_user&username={}", admin_user.username),
            Some(&admin),
        ))
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["metadata"]["userId"], target_id);

    let export = ctx
        .send(empty_request(
            "GET",
            &format!("/v1/admin/logs/export?action=ban_user&username={}", admin_user.username),
            Some(&admin),
        ))
        .await;
    assert_eq!(export.status(), StatusCode::OK);
    assert_eq!(export.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");
    assert!(export.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment;"));

    let csv = read_text(export).await;
    let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines[0], "id,created_at,actor_id,actor_username,action,metadata");
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains(&format!(",{},ban_user,", admin_user.username)));
    assert!(lines[1].contains(&format!("\"\"userId\"\":{}", target_id)));
    assert!(lines[1].ends_with("}\""));
}
