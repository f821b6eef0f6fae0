//! Storage API integration tests.
//!
//! Run with: `cargo test -p lmsadmin-api --test storage_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::{default_tenants, nsg_url, rmw_url, setup_test_app, ADMIN_URL, DEBUG_SECRET};
use lmsadmin_storage::testing::TestTenants;
use serde_json::{json, Value};

const NSG_BUCKET: &str = "NSG-LMS";

#[tokio::test]
async fn test_health_counts_usable_tenants() {
    let app = setup_test_app(default_tenants());

    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tenants"], 2);
}

#[tokio::test]
async fn test_buckets_all_lists_usable_tenants_in_order() {
    let app = setup_test_app(default_tenants());

    let response = app.client().get("/api/storage/buckets-all").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(
        body["buckets"],
        json!([
            { "id": "NSG-LMS", "name": "NSG-LMS", "public": true, "created_at": null, "_account": "NSG" },
            { "id": "RMW-LMS", "name": "RMW-LMS", "public": true, "created_at": null, "_account": "RMW" }
        ])
    );
    assert_eq!(app.backend.list_requests(), 0);
}

#[tokio::test]
async fn test_buckets_lists_admin_project() {
    let app = setup_test_app(default_tenants());
    app.backend.create_bucket(ADMIN_URL, "avatars");
    app.backend.create_bucket(ADMIN_URL, "NSG-LMS");

    let response = app.client().get("/api/storage/buckets").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let names: Vec<&str> = body["buckets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["NSG-LMS", "avatars"]);
}

#[tokio::test]
async fn test_files_lists_one_level() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "a.txt", 10);
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "docs/b.txt", 20);
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "docs/deep/c.txt", 30);

    let response = app
        .client()
        .get("/api/storage/files")
        .add_query_param("bucket", NSG_BUCKET)
        .add_query_param("path", "docs")
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["name"], "b.txt");
    assert_eq!(files[0]["path"], "docs/b.txt");
    assert_eq!(files[0]["isFile"], true);
    assert_eq!(files[0]["sizeBytes"], 20);
    assert_eq!(files[1]["name"], "deep");
    assert_eq!(files[1]["isFile"], false);
}

#[tokio::test]
async fn test_files_by_account_uses_default_bucket() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&rmw_url(), "RMW-LMS", "report.pdf", 5);

    let response = app
        .client()
        .get("/api/storage/files")
        .add_query_param("account", "rmw")
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["files"][0]["name"], "report.pdf");
}

#[tokio::test]
async fn test_files_without_bucket_is_rejected() {
    let app = setup_test_app(default_tenants());

    let response = app.client().get("/api/storage/files").await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(app.backend.list_requests(), 0);
}

#[tokio::test]
async fn test_usage_escalates_when_anon_hides_sizes() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "a.txt", 100);
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "docs/b.txt", 200);
    app.backend
        .hide_size_from_anon(&nsg_url(), NSG_BUCKET, "docs/b.txt");

    let response = app
        .client()
        .get("/api/storage/usage")
        .add_query_param("bucket", NSG_BUCKET)
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["usedBytes"], 300);
    assert_eq!(body["totalBytes"], 1024u64 * 1024 * 1024);
    assert_eq!(body["source"], "service");
    assert_eq!(body["incomplete"], false);
}

#[tokio::test]
async fn test_usage_incomplete_without_service_credential() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&rmw_url(), "RMW-LMS", "a.txt", 100);
    app.backend.put_object(&rmw_url(), "RMW-LMS", "b.txt", 50);
    app.backend.hide_size_from_anon(&rmw_url(), "RMW-LMS", "b.txt");

    let response = app
        .client()
        .get("/api/storage/usage")
        .add_query_param("bucket", "RMW-LMS")
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["usedBytes"], 100);
    assert_eq!(body["source"], "anon");
    assert_eq!(body["incomplete"], true);
}

#[tokio::test]
async fn test_usage_unconfigured_tenant_names_missing_key() {
    let app = setup_test_app(default_tenants());

    let response = app
        .client()
        .get("/api/storage/usage")
        .add_query_param("bucket", "DQW-LMS")
        .await;

    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert_eq!(body["code"], "TENANT_NOT_CONFIGURED");
    assert!(body["error"].as_str().unwrap().contains("SUPABASE_URL_DQW"));
    assert_eq!(app.backend.list_requests(), 0);
}

#[tokio::test]
async fn test_usage_listing_failure_names_directory() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "a.txt", 1);
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "docs/b.txt", 1);
    app.backend.fail_listing(&nsg_url(), NSG_BUCKET, "docs");

    let response = app
        .client()
        .get("/api/storage/usage")
        .add_query_param("bucket", NSG_BUCKET)
        .await;

    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert_eq!(body["code"], "LISTING_FAILED");
    assert!(body["error"].as_str().unwrap().contains("docs"));
}

#[tokio::test]
async fn test_usage_debug_requires_secret() {
    let app = setup_test_app(default_tenants());
    app.backend.create_bucket(&nsg_url(), NSG_BUCKET);

    let missing = app
        .client()
        .get("/api/storage/usage-debug")
        .add_query_param("bucket", NSG_BUCKET)
        .await;
    assert_eq!(missing.status_code(), 403);

    let wrong = app
        .client()
        .get("/api/storage/usage-debug")
        .add_query_param("bucket", NSG_BUCKET)
        .add_header("x-usage-debug-secret", "not-the-secret")
        .await;
    assert_eq!(wrong.status_code(), 403);
    assert_eq!(app.backend.list_requests(), 0);
}

#[tokio::test]
async fn test_usage_debug_returns_raw_page() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "a.txt", 1);
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "b.txt", 2);
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "c.txt", 3);

    let response = app
        .client()
        .get("/api/storage/usage-debug")
        .add_query_param("bucket", NSG_BUCKET)
        .add_query_param("limit", "2")
        .add_query_param("secret", DEBUG_SECRET)
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["source"], "anon");
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "a.txt");
    assert_eq!(entries[0]["metadata"]["size"], 1);
}

#[tokio::test]
async fn test_usage_debug_falls_back_to_admin_project() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(ADMIN_URL, "shared", "x.bin", 9);

    let response = app
        .client()
        .get("/api/storage/usage-debug")
        .add_query_param("bucket", "shared")
        .add_header("x-usage-debug-secret", DEBUG_SECRET)
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["source"], "service");
    assert_eq!(body["entries"][0]["name"], "x.bin");
}

#[tokio::test]
async fn test_delete_folder_removes_every_object() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "keep.txt", 1);
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "course/a.txt", 1);
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "course/b.txt", 1);
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "course/unit/c.txt", 1);

    let response = app
        .client()
        .post("/api/storage/delete")
        .json(&json!({ "bucket": NSG_BUCKET, "path": "course", "type": "folder" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["deleted"], 3);
    assert_eq!(body["usedBucket"], NSG_BUCKET);
    assert_eq!(
        body["examples"],
        json!(["course/a.txt", "course/b.txt", "course/unit/c.txt"])
    );
    assert!(body.get("fallbackUsed").is_none());
    assert_eq!(
        app.backend.object_paths(&nsg_url(), NSG_BUCKET),
        vec!["keep.txt".to_string()]
    );
    assert_eq!(app.backend.remove_requests(), 1);
}

#[tokio::test]
async fn test_delete_file_defaults_type() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "docs/a.txt", 1);

    let response = app
        .client()
        .post("/api/storage/delete")
        .json(&json!({ "bucket": NSG_BUCKET, "path": "/docs/a.txt" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["deleted"], 1);
    assert_eq!(app.backend.list_requests(), 0);
    assert!(app.backend.object_paths(&nsg_url(), NSG_BUCKET).is_empty());
}

#[tokio::test]
async fn test_delete_empty_folder_skips_removal() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "other/a.txt", 1);

    let response = app
        .client()
        .post("/api/storage/delete")
        .json(&json!({ "bucket": NSG_BUCKET, "path": "empty", "type": "folder" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["deleted"], 0);
    assert_eq!(body["message"], "Nothing to delete");
    assert_eq!(app.backend.remove_requests(), 0);
}

#[tokio::test]
async fn test_delete_requires_bucket_and_path() {
    let app = setup_test_app(default_tenants());

    let response = app
        .client()
        .post("/api/storage/delete")
        .json(&json!({ "bucket": NSG_BUCKET }))
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(app.backend.list_requests(), 0);
    assert_eq!(app.backend.remove_requests(), 0);
}

#[tokio::test]
async fn test_delete_rejects_unknown_type() {
    let app = setup_test_app(default_tenants());

    let response = app
        .client()
        .post("/api/storage/delete")
        .json(&json!({ "bucket": NSG_BUCKET, "path": "a", "type": "bucket" }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_delete_without_service_credential_fails() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&rmw_url(), "RMW-LMS", "a.txt", 1);

    let response = app
        .client()
        .post("/api/storage/delete")
        .json(&json!({ "bucket": "RMW-LMS", "path": "a.txt" }))
        .await;

    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("SUPABASE_SERVICE_ROLE_KEY_RMW"));
    assert_eq!(app.backend.remove_requests(), 0);
}

#[tokio::test]
async fn test_delete_falls_back_to_other_tenant() {
    let tenants = TestTenants::new()
        .tenant("NSG", true, true)
        .tenant("RMW", true, true);
    let app = setup_test_app(tenants);
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "a.txt", 1);
    app.backend.put_object(&rmw_url(), NSG_BUCKET, "a.txt", 1);
    app.backend.deny_removal(&nsg_url());

    let response = app
        .client()
        .post("/api/storage/delete")
        .json(&json!({ "bucket": NSG_BUCKET, "path": "a.txt" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["fallbackUsed"], "RMW");
    assert_eq!(app.backend.remove_targets(), vec![nsg_url(), rmw_url()]);
}

#[tokio::test]
async fn test_delete_removal_failure_is_reported() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "a.txt", 1);
    app.backend.deny_removal(&nsg_url());

    let response = app
        .client()
        .post("/api/storage/delete")
        .json(&json!({ "bucket": NSG_BUCKET, "path": "a.txt" }))
        .await;

    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert_eq!(body["code"], "REMOVAL_FAILED");
    assert_eq!(
        app.backend.object_paths(&nsg_url(), NSG_BUCKET),
        vec!["a.txt".to_string()]
    );
}

#[tokio::test]
async fn test_upload_with_account_targets_default_bucket() {
    let app = setup_test_app(default_tenants());
    app.backend.create_bucket(&rmw_url(), "RMW-LMS");

    let form = MultipartForm::new()
        .add_text("bucket", "ignored")
        .add_text("account", "rmw")
        .add_text("path", "//course/intro.txt")
        .add_part(
            "file",
            Part::bytes(b"hello".to_vec())
                .file_name("local.txt")
                .mime_type("text/plain"),
        );

    let response = app
        .client()
        .post("/api/storage/upload")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body, json!({ "success": true }));

    let stored = app
        .backend
        .object(&rmw_url(), "RMW-LMS", "course/intro.txt")
        .unwrap();
    assert_eq!(stored.size, 5);
    assert_eq!(stored.content_type, "text/plain");
}

#[tokio::test]
async fn test_upload_uses_file_name_when_path_missing() {
    let app = setup_test_app(default_tenants());
    app.backend.create_bucket(&nsg_url(), NSG_BUCKET);

    let form = MultipartForm::new()
        .add_text("bucket", NSG_BUCKET)
        .add_part("file", Part::bytes(vec![0u8; 3]).file_name("blob.bin"));

    let response = app
        .client()
        .post("/api/storage/upload")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 200);
    assert!(app.backend.object(&nsg_url(), NSG_BUCKET, "blob.bin").is_some());
}

#[tokio::test]
async fn test_upload_existing_object_is_rejected() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "a.txt", 1);

    let form = MultipartForm::new()
        .add_text("bucket", NSG_BUCKET)
        .add_text("path", "a.txt")
        .add_part("file", Part::bytes(b"new".to_vec()).file_name("a.txt"));

    let response = app
        .client()
        .post("/api/storage/upload")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("already exists"));
    assert_eq!(
        app.backend.object(&nsg_url(), NSG_BUCKET, "a.txt").unwrap().size,
        1
    );
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let app = setup_test_app(default_tenants());

    let form = MultipartForm::new().add_text("bucket", NSG_BUCKET);

    let response = app
        .client()
        .post("/api/storage/upload")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(app.backend.upload_requests(), 0);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = setup_test_app(default_tenants());

    let response = app.client().get("/api/openapi.json").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert!(body["paths"]["/api/storage/usage"].is_object());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = setup_test_app(default_tenants());

    let response = app
        .client()
        .get("/health")
        .add_header("X-Request-ID", "req-123")
        .await;

    assert_eq!(response.header("X-Request-ID"), "req-123");
}

#[tokio::test]
async fn test_delete_bucket_root_is_rejected() {
    let app = setup_test_app(default_tenants());
    app.backend.put_object(&nsg_url(), NSG_BUCKET, "a.txt", 1);

    let response = app
        .client()
        .post("/api/storage/delete")
        .json(&json!({ "bucket": NSG_BUCKET, "path": "/", "type": "folder" }))
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(app.backend.object_paths(&nsg_url(), NSG_BUCKET).len(), 1);
}
