use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use legisci::auth::create_user;
use legisci::config::Config;
use legisci::db;
use legisci::llm::{ChatModel, CompletionRequest};
use legisci::migrate::migrate_pool;
use legisci::seed::seed_reference_data;
use legisci::server::{app, AppState};

const ANSWER: &str = "Selon la Constitution, les droits fondamentaux sont garantis à tous.";
const BOUNDARY: &str = "legisci-test-boundary";

struct StubModel;

#[async_trait]
impl ChatModel for StubModel {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<Option<String>> {
        Ok(Some(ANSWER.to_string()))
    }
}

struct TestApp {
    _tmp: TempDir,
    state: Arc<AppState>,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let config = Config::for_data_dir(tmp.path());
        let pool = db::connect(&config).await.unwrap();
        migrate_pool(&pool).await.unwrap();
        seed_reference_data(&pool).await.unwrap();

        let state = Arc::new(AppState {
            pool,
            config: Arc::new(config),
            model: Arc::new(StubModel),
        });
        let router = app(state.clone());
        Self {
            _tmp: tmp,
            state,
            router,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let response = self.send(builder.body(Body::empty()).unwrap()).await;
        read_json(response).await
    }

    async fn post_json(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let response = self
            .send(builder.body(Body::from(body.to_string())).unwrap())
            .await;
        read_json(response).await
    }

    async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
        token: &str,
    ) -> (StatusCode, Value) {
        self.multipart(Method::POST, uri, fields, file, token).await
    }

    async fn multipart(
        &self,
        method: Method,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
        token: &str,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(multipart_body(fields, file)))
            .unwrap();
        read_json(self.send(request).await).await
    }

    async fn login_as(&self, email: &str, admin: bool) -> String {
        create_user(&self.state.pool, "Test", email, "motdepasse", admin)
            .await
            .unwrap();
        let (status, body) = self
            .post_json(
                "/api/auth/login",
                json!({ "email": email, "password": "motdepasse" }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }
}

async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"pdf_file\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn public_legal_endpoints() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/legal/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 5);

    let (status, body) = app.get("/api/legal/documents", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["current_page"], 1);

    let (status, body) = app
        .get(
            "/api/legal/documents/constitution-de-la-republique-de-cote-divoire",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["type"], "constitution");
    assert!(!body["data"]["sections"].as_array().unwrap().is_empty());

    let (status, _) = app.get("/api/legal/documents/inexistant", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/legal/documents/type/circulaire", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn huge_page_numbers_return_empty_pages() {
    let app = TestApp::new().await;
    let token = app.login_as("admin@legisci.ci", true).await;

    for uri in [
        "/api/legal/documents?page=9223372036854775807",
        "/api/legal/documents/type/loi?page=9223372036854775807",
        "/api/legal/search?q=code&page=9223372036854775807",
        "/api/legal/search/advanced?q=code&page=9223372036854775807",
    ] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::OK, "{}: {}", uri, body);
    }

    let (status, body) = app
        .get("/api/legal/documents?page=9223372036854775807", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["total"], 3);

    let (status, body) = app
        .get("/api/admin/documents?page=9223372036854775807", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn search_requires_a_term() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/legal/search?q=", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Veuillez saisir un terme de recherche");
    assert_eq!(body["documents"], json!([]));

    let (status, body) = app.get("/api/legal/search?q=travail", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "travail");

    let (status, body) = app.get("/api/legal/search/suggestions?q=c", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn chat_session_flow() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::post("/api/ai/chat/sessions")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers()["x-tracking-consent"], "required");
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["data"]["session_id"].as_str().unwrap().to_string();

    let uri = format!("/api/ai/chat/sessions/{}/messages", session_id);
    let (status, body) = app.post_json(&uri, json!({ "content": "" }), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["content"].is_array());

    let (status, body) = app
        .post_json(&uri, json!({ "content": "Que dit la constitution ?" }), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["role"], "assistant");
    assert_eq!(body["data"]["content"], ANSWER);
    assert_eq!(body["data"]["metadata"]["model"], "stub");

    let (status, body) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let session_uri = format!("/api/ai/chat/sessions/{}", session_id);
    let response = app
        .send(Request::delete(&session_uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = app.login_as("visiteur@legisci.ci", false).await;
    let response = app
        .send(
            Request::delete(&session_uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Non autorisé");

    let (status, _) = app.get("/api/ai/chat/sessions/inconnue", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_deletes_own_session() {
    let app = TestApp::new().await;
    let token = app.login_as("awa@legisci.ci", false).await;

    let (status, body) = app
        .post_json("/api/ai/chat/sessions", json!({}), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let session_uri = format!(
        "/api/ai/chat/sessions/{}",
        body["data"]["session_id"].as_str().unwrap()
    );

    let response = app
        .send(
            Request::delete(&session_uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Session supprimée avec succès");

    let (status, _) = app.get(&session_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_sets_cookie_and_rejects_bad_password() {
    let app = TestApp::new().await;
    create_user(&app.state.pool, "Awa", "awa@legisci.ci", "motdepasse", false)
        .await
        .unwrap();

    let (status, body) = app
        .post_json(
            "/api/auth/login",
            json!({ "email": "awa@legisci.ci", "password": "mauvais" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["message"],
        "Ces identifiants ne correspondent à aucun compte."
    );

    let response = app
        .send(
            Request::post("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": "AWA@legisci.ci", "password": "motdepasse" }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    let cookie = response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("legisci_session="));
    assert!(cookie.contains("HttpOnly"));

    let session = cookie.split(';').next().unwrap().to_string();
    let response = app
        .send(
            Request::get("/api/user")
                .header(header::COOKIE, session)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "awa@legisci.ci");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn admin_routes_are_guarded() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/api/admin/documents", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.login_as("lecteur@legisci.ci", false).await;
    let (status, _) = app.get("/api/admin/documents", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/admin/analytics/dashboard", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_creates_and_imports_documents() {
    let app = TestApp::new().await;
    let token = app.login_as("admin@legisci.ci", true).await;

    let (status, body) = app
        .post_multipart(
            "/api/admin/documents",
            &[("title", "Loi sur le numérique"), ("type", "loi")],
            None,
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["status"].is_array());

    let (status, body) = app
        .post_multipart(
            "/api/admin/documents",
            &[
                ("title", "Loi sur le numérique"),
                ("type", "loi"),
                ("status", "published"),
                ("content", "Article 1 : Le numérique est encadré."),
            ],
            None,
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "active");
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .post_json(&format!("/api/admin/documents/{}/duplicate", id), json!({}), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "draft");

    let (status, body) = app
        .post_multipart(
            "/api/admin/documents/import",
            &[],
            Some(("arrete_2024.pdf", &b"%PDF-1.4\nnot parseable"[..])),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["analysis"]["analysis_source"], "basic");
    assert_eq!(body["data"]["type"], "arrete");

    let (status, body) = app
        .post_multipart("/api/admin/documents/import", &[], None, &token)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["pdf_file"].is_array());

    let (status, body) = app.get("/api/admin/documents", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 6);
}

#[tokio::test]
async fn admin_update_renames_and_replaces_pdf() {
    let app = TestApp::new().await;
    let token = app.login_as("admin@legisci.ci", true).await;
    let root = app.state.config.storage.root.clone();
    let stored_path = |url: &Value| root.join(url.as_str().unwrap().trim_start_matches("/storage/"));

    let (status, body) = app
        .post_multipart(
            "/api/admin/documents",
            &[
                ("title", "Loi minière"),
                ("type", "loi"),
                ("status", "draft"),
                ("summary", "Régime des mines"),
            ],
            Some(("ancien.pdf", &b"%PDF-1.4\nancien"[..])),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_i64().unwrap();
    let old_pdf = stored_path(&body["data"]["pdf_url"]);
    assert!(old_pdf.exists());

    let uri = format!("/api/admin/documents/{}", id);
    let (status, body) = app
        .multipart(
            Method::PUT,
            &uri,
            &[("title", "Loi minière révisée"), ("type", "loi"), ("status", "published")],
            Some(("nouveau.pdf", &b"%PDF-1.4\nnouveau"[..])),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["slug"], "loi-miniere-revisee");
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["pdf_file_name"], "nouveau.pdf");
    assert_eq!(body["data"]["summary"], "Régime des mines");
    assert!(!old_pdf.exists());
    assert!(stored_path(&body["data"]["pdf_url"]).exists());

    let (status, body) = app
        .post_multipart(
            &uri,
            &[("title", "Loi minière révisée"), ("type", "code"), ("status", "active")],
            None,
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["type"], "code");
    assert_eq!(body["data"]["pdf_file_name"], "nouveau.pdf");

    let (status, body) = app
        .multipart(Method::PUT, &uri, &[("title", "Loi minière révisée")], None, &token)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["type"].is_array());
}

#[tokio::test]
async fn analytics_export() {
    let app = TestApp::new().await;
    let token = app.login_as("admin@legisci.ci", true).await;

    let response = app
        .send(
            Request::get("/api/admin/analytics/export?type=countries")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("attachment"));

    let (status, body) = app
        .get("/api/admin/analytics/export?format=xlsx", Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Format non supporté");

    let (status, _) = app
        .get("/api/admin/analytics/dashboard?start_date=hier", Some(&token))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn dashboard_depends_on_role() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/api/dashboard", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let reader = app.login_as("lecteur@legisci.ci", false).await;
    let (status, body) = app.get("/api/dashboard", Some(&reader)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAdmin"], false);
    assert!(body.get("adminStats").is_none());

    let admin = app.login_as("admin@legisci.ci", true).await;
    let (status, body) = app.get("/api/dashboard", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAdmin"], true);
    assert_eq!(body["adminStats"]["total"], 3);
}
