//! End-to-end tests for the acknowledgment HTTP API.
//!
//! Each test seeds a fresh SQLite database, starts the server on a free
//! port and talks to it over HTTP.

use chrono::{TimeZone, Utc};
use grc_ack::config::Config;
use grc_ack::server::{run_server, CALLER_HEADER};
use grc_ack::sqlite_store::SqliteStore;
use grc_ack::{db, migrate};
use grc_ack_core::models::{Document, DocumentStatus, Role, StaffRosterEntry, User};
use grc_ack_core::store::AckStore;
use serde_json::{json, Value};
use tempfile::TempDir;

const DOC_1: &str = "550e8400-e29b-41d4-a716-446655440001";
const DOC_2: &str = "550e8400-e29b-41d4-a716-446655440002";
const DRAFT: &str = "550e8400-e29b-41d4-a716-446655440003";

const ALICE: &str = "alice@example.com";
const EDITOR: &str = "editor@example.com";

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn test_config(tmp: &TempDir, port: u16) -> Config {
    Config::from_toml(&format!(
        r#"
[db]
path = "{}"

[server]
bind = "127.0.0.1:{}"
"#,
        tmp.path().join("grcack.sqlite").display(),
        port
    ))
    .unwrap()
}

fn user(id: &str, email: &str, external_id: Option<&str>, role: Role) -> User {
    User {
        id: id.to_string(),
        email: email.to_string(),
        external_id: external_id.map(str::to_string),
        display_name: None,
        role,
    }
}

fn document(id: &str, title: &str, version: &str, status: DocumentStatus) -> Document {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Document {
        id: id.to_string(),
        title: title.to_string(),
        version: version.to_string(),
        status,
        requires_acknowledgement: true,
        owner_id: None,
        created_at: created,
        updated_at: created,
        last_changed_at: None,
    }
}

fn roster_entry(external_id: &str, email: &str) -> StaffRosterEntry {
    StaffRosterEntry {
        external_id: external_id.to_string(),
        email: email.to_string(),
        display_name: None,
    }
}

struct TestServer {
    _tmp: TempDir,
    base: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Seed users (alice: staff, editor: editor) plus `documents` and
    /// `roster`, then start the server.
    async fn start(documents: Vec<Document>, roster: Vec<StaffRosterEntry>) -> TestServer {
        let port = find_free_port();
        let tmp = TempDir::new().unwrap();
        let cfg = test_config(&tmp, port);
        migrate::run_migrations(&cfg).await.unwrap();

        let pool = db::connect(&cfg).await.unwrap();
        let store = SqliteStore::new(pool.clone());
        store
            .upsert_user(&user("u-alice", ALICE, Some("ext-alice"), Role::Staff))
            .await
            .unwrap();
        store
            .upsert_user(&user("u-editor", EDITOR, None, Role::Editor))
            .await
            .unwrap();
        for doc in &documents {
            store.upsert_document(doc).await.unwrap();
        }
        store.replace_roster(&roster, Utc::now()).await.unwrap();
        pool.close().await;

        let handle = tokio::spawn(async move {
            run_server(&cfg).await.ok();
        });
        wait_for_server(port).await;

        TestServer {
            _tmp: tmp,
            base: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn get(&self, path: &str, caller: Option<&str>) -> (u16, Value) {
        let mut req = self.client.get(format!("{}{}", self.base, path));
        if let Some(email) = caller {
            req = req.header(CALLER_HEADER, email);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, caller: Option<&str>, body: String) -> (u16, Value) {
        let mut req = self
            .client
            .post(format!("{}{}", self.base, path))
            .header("content-type", "application/json")
            .body(body);
        if let Some(email) = caller {
            req = req.header(CALLER_HEADER, email);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn acknowledge(&self, caller: &str, document_id: &str) -> (u16, Value) {
        self.post(
            "/acknowledgments",
            Some(caller),
            json!({ "documentId": document_id }).to_string(),
        )
        .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn ids(pending: &Value) -> Vec<&str> {
    pending
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let server = TestServer::start(vec![], vec![]).await;
    let (status, body) = server.get("/health", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_pending_then_acknowledged() {
    let server = TestServer::start(
        vec![document(DOC_1, "Acceptable Use", "2.0", DocumentStatus::Approved)],
        vec![],
    )
    .await;

    let (status, pending) = server.get("/acknowledgments/pending", Some(ALICE)).await;
    assert_eq!(status, 200);
    assert_eq!(ids(&pending), vec![DOC_1]);
    assert_eq!(pending[0]["version"], "2.0");
    assert_eq!(pending[0]["requiresAcknowledgement"], true);

    let (status, created) = server.acknowledge(ALICE, DOC_1).await;
    assert_eq!(status, 201);
    assert_eq!(created["documentId"], DOC_1);
    assert_eq!(created["documentVersion"], "2.0");

    let (status, pending) = server.get("/acknowledgments/pending", Some(ALICE)).await;
    assert_eq!(status, 200);
    assert!(ids(&pending).is_empty());

    let (status, existing) = server.acknowledge(ALICE, DOC_1).await;
    assert_eq!(status, 200);
    assert_eq!(existing["id"], created["id"]);
}

#[tokio::test]
async fn test_acknowledge_rejections() {
    let server = TestServer::start(
        vec![
            document(DOC_1, "Acceptable Use", "2.0", DocumentStatus::Approved),
            document(DRAFT, "Remote Work", "0.3", DocumentStatus::Draft),
        ],
        vec![],
    )
    .await;

    let (status, body) = server.acknowledge(ALICE, DRAFT).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "invalid_state");
    assert_eq!(body["error"]["message"], "Document is not approved");

    let (status, body) = server.acknowledge(ALICE, "doc-1").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["fields"], json!(["documentId"]));

    let (status, body) = server
        .post("/acknowledgments", Some(ALICE), "{oops".to_string())
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = server
        .acknowledge(ALICE, "550e8400-e29b-41d4-a716-4466554400ff")
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = server.acknowledge("nobody@example.com", DOC_1).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_identity_required() {
    let server = TestServer::start(vec![], vec![]).await;

    let (status, body) = server.get("/acknowledgments/pending", None).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "unauthenticated");

    let (status, _) = server
        .post("/acknowledgments/bulk", None, "{}".to_string())
        .await;
    assert_eq!(status, 401);

    let (status, _) = server
        .get("/acknowledgments/pending", Some("stranger@example.com"))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_bulk_acknowledges_everything_pending() {
    let server = TestServer::start(
        vec![
            document(DOC_1, "Acceptable Use", "2.0", DocumentStatus::Approved),
            document(DOC_2, "Clean Desk", "1.0", DocumentStatus::Approved),
        ],
        vec![],
    )
    .await;

    let (status, body) = server
        .post("/acknowledgments/bulk", Some(ALICE), "{}".to_string())
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["acknowledged"], 2);
    assert_eq!(body["acknowledgments"].as_array().unwrap().len(), 2);

    let (_, pending) = server.get("/acknowledgments/pending", Some(ALICE)).await;
    assert!(ids(&pending).is_empty());
}

#[tokio::test]
async fn test_bulk_with_ids_is_partially_idempotent() {
    let server = TestServer::start(
        vec![
            document(DOC_1, "Acceptable Use", "2.0", DocumentStatus::Approved),
            document(DOC_2, "Clean Desk", "1.0", DocumentStatus::Approved),
        ],
        vec![],
    )
    .await;

    let (_, first) = server.acknowledge(ALICE, DOC_1).await;

    let (status, body) = server
        .post(
            "/acknowledgments/bulk",
            Some(ALICE),
            json!({ "documentIds": [DOC_1, DOC_2] }).to_string(),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["acknowledged"], 2);
    let records = body["acknowledgments"].as_array().unwrap();
    assert!(records.iter().any(|r| r["id"] == first["id"]));

    let (status, body) = server
        .post(
            "/acknowledgments/bulk",
            Some(ALICE),
            json!({ "documentIds": [DOC_1, "bogus"] }).to_string(),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["fields"], json!(["documentIds[1]"]));
}

#[tokio::test]
async fn test_stats_reconciles_roster() {
    let server = TestServer::start(
        vec![document(DOC_1, "Acceptable Use", "2.0", DocumentStatus::Approved)],
        vec![
            roster_entry("ext-alice", ALICE),
            roster_entry("ext-bob", "bob@example.com"),
        ],
    )
    .await;
    server.acknowledge(ALICE, DOC_1).await;

    let (status, body) = server.get("/acknowledgments/stats", Some(EDITOR)).await;
    assert_eq!(status, 200);
    let doc = &body["documents"][0];
    assert_eq!(doc["acknowledgedCount"], 1);
    assert_eq!(doc["notAcknowledgedCount"], 1);
    assert_eq!(doc["percentage"].as_f64(), Some(50.0));
    assert!(doc.get("acknowledgedUsers").is_none());
    assert_eq!(body["summary"]["totalUsers"], 2);
    assert!(body["dataAsOf"].is_string());

    let (status, body) = server
        .get("/acknowledgments/stats?includeUsers=true", Some(EDITOR))
        .await;
    assert_eq!(status, 200);
    let doc = &body["documents"][0];
    assert_eq!(doc["acknowledgedUsers"][0]["email"], ALICE);
    assert_eq!(doc["notAcknowledgedUsers"][0]["email"], "bob@example.com");
}

#[tokio::test]
async fn test_stats_requires_admin_or_editor() {
    let server = TestServer::start(vec![], vec![]).await;

    let (status, body) = server.get("/acknowledgments/stats", Some(ALICE)).await;
    assert_eq!(status, 403);
    assert_eq!(body["error"]["code"], "forbidden");

    let (status, _) = server
        .get(&format!("/acknowledgments/document/{}", DOC_1), Some(ALICE))
        .await;
    assert_eq!(status, 403);

    let (status, _) = server.get("/acknowledgments/stats", None).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_detail_page_size_capped() {
    let roster: Vec<StaffRosterEntry> = (0..250)
        .map(|i| roster_entry(&format!("ext-{:03}", i), &format!("staff{:03}@example.com", i)))
        .collect();
    let server = TestServer::start(
        vec![document(DOC_1, "Acceptable Use", "2.0", DocumentStatus::Approved)],
        roster,
    )
    .await;

    let (status, body) = server
        .get(
            &format!("/acknowledgments/document/{}?pageSize=500", DOC_1),
            Some(EDITOR),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["notAcknowledgedUsers"].as_array().unwrap().len(), 200);
    assert_eq!(body["notAcknowledgedCount"], 250);
    assert_eq!(body["pagination"]["pageSize"], 200);
    assert_eq!(body["pagination"]["notAcknowledgedPages"], 2);

    let (status, body) = server
        .get(
            &format!("/acknowledgments/document/{}?page=2&pageSize=oops", DOC_1),
            Some(EDITOR),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["pageSize"], 50);
    assert_eq!(body["notAcknowledgedUsers"].as_array().unwrap().len(), 50);

    let (status, _) = server
        .get("/acknowledgments/document/unknown", Some(EDITOR))
        .await;
    assert_eq!(status, 404);
}
