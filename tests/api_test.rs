use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use recruitment_pipeline::{
    database::{CandidateStore, MemoryCandidateStore},
    error::{Error, Result},
    middleware::auth::issue_token,
    models::hr_user::HrUser,
    routes::build_router,
    services::{
        ai_service::DisabledEnricher,
        field_extractor::FieldAliasMap,
        form_client::{SubmissionPage, SubmissionSource},
        import_service::ImportSettings,
        notification_service::Notifier,
    },
    utils::signature::sign_payload,
    AppState, AuthSettings, Collaborators, PipelineSettings,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const JWT_SECRET: &str = "test_secret_key";
const WEBHOOK_SECRET: &str = "whsec_test";

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl Notifier for RecordingNotifier {
    fn send(&self, phone: &str, message: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));
    }
}

struct OnePageSource;

#[async_trait]
impl SubmissionSource for OnePageSource {
    async fn list_submissions(&self, form_id: &str, page: u32) -> Result<SubmissionPage> {
        match (form_id, page) {
            ("ynFUyrAc", 1) => Ok(SubmissionPage {
                items: vec![
                    serde_json::from_value(application("imp-1", "Joana Prado", "111.222.333-44"))?,
                    serde_json::from_value(application("imp-2", "Joana Prado", "11122233344"))?,
                ],
                has_more: false,
            }),
            _ => Err(Error::Upstream("form unavailable".into())),
        }
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryCandidateStore>,
    notifier: Arc<RecordingNotifier>,
}

fn setup_app_with(
    alias_map: FieldAliasMap,
    source: Option<Arc<dyn SubmissionSource>>,
    signature_secret: Option<&str>,
) -> TestApp {
    setup_app_over(MemoryCandidateStore::new(), alias_map, source, signature_secret)
}

fn setup_app_over(
    store: MemoryCandidateStore,
    alias_map: FieldAliasMap,
    source: Option<Arc<dyn SubmissionSource>>,
    signature_secret: Option<&str>,
) -> TestApp {
    let store = Arc::new(store);
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState::assemble(
        Collaborators {
            store: store.clone(),
            enricher: Arc::new(DisabledEnricher),
            notifier: notifier.clone(),
            source,
        },
        alias_map,
        AuthSettings {
            jwt_secret: JWT_SECRET.into(),
            webhook_secret: WEBHOOK_SECRET.into(),
            form_signature_secret: signature_secret.map(str::to_string),
        },
        PipelineSettings {
            name_scan_limit: 100,
            default_country_code: "55".into(),
            webhook_rps: 100,
            import: ImportSettings {
                form_ids: vec!["ynFUyrAc".into(), "i6GB06nW".into()],
                batch_size: 10,
                batch_delay: Duration::ZERO,
                page_delay: Duration::ZERO,
            },
        },
    );
    TestApp {
        router: build_router(state),
        store,
        notifier,
    }
}

fn setup_app() -> TestApp {
    setup_app_with(FieldAliasMap::builtin(), None, None)
}

fn application(token: &str, name: &str, cpf: &str) -> Value {
    json!({
        "form_id": "ynFUyrAc",
        "token": token,
        "answers": [
            { "field": { "id": "6VkDMDJph5Jc", "type": "short_text" }, "type": "text", "text": name },
            { "field": { "id": "f-cpf", "ref": "cpf" }, "type": "text", "text": cpf },
            { "field": { "id": "f-tel", "ref": "telefone" }, "type": "text", "text": "(67) 99299-2381" },
            { "field": { "id": "f-nasc", "ref": "data_nascimento" }, "type": "text", "text": "15/03/1990" }
        ]
    })
}

fn bearer() -> String {
    let token = tokio_test::assert_ok!(issue_token(
        JWT_SECRET,
        "recruiter",
        Some("hr"),
        chrono::Duration::minutes(10)
    ));
    format!("Bearer {}", token)
}

fn webhook(path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .header("x-webhook-secret", WEBHOOK_SECRET)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authorized(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", bearer());
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_is_public() {
    let app = setup_app();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn form_webhook_requires_the_shared_secret() {
    let app = setup_app();
    let body = json!({ "form_response": application("tok-1", "Maria Souza", "529.982.247-25") });

    let missing = Request::builder()
        .method("POST")
        .uri("/webhooks/form-response")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _) = send(&app.router, missing).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .method("POST")
        .uri("/webhooks/form-response")
        .header("x-webhook-secret", "nope")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = send(&app.router, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_webhook_secret");
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn form_webhook_creates_candidate_and_redelivery_is_idempotent() {
    let app = setup_app();
    let body = json!({
        "event_id": "evt-1",
        "event_type": "form_response",
        "form_response": application("tok-1", "Maria Souza", "529.982.247-25")
    });

    let (status, report) = send(&app.router, webhook("/webhooks/form-response", &body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["outcome"], "created");
    assert_eq!(report["submission_id"], "tok-1");

    let (status, candidate) = send(&app.router, authorized("GET", "/api/candidates/tok-1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(candidate["name"], "Maria Souza");
    assert_eq!(candidate["cpf"], "52998224725");
    assert_eq!(candidate["birth_date"], "1990-03-15");
    assert_eq!(candidate["status"], "Analisado por IA");
    assert_eq!(candidate["status_history"].as_array().unwrap().len(), 1);
    assert!(candidate["age"].is_u64());
    assert_eq!(candidate["has_resume"], false);
    let updated_at = candidate["updated_at"].clone();

    let (status, again) = send(&app.router, webhook("/webhooks/form-response", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["outcome"], "merged");
    assert_eq!(again["matched_by"], "submission_id");
    assert_eq!(app.store.len().await, 1);

    let (_, after) = send(&app.router, authorized("GET", "/api/candidates/tok-1", None)).await;
    assert_eq!(after["updated_at"], updated_at);
    assert_eq!(after["status_history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn second_application_with_same_cpf_is_skipped() {
    let app = setup_app();
    let first = application("tok-1", "Maria Souza", "529.982.247-25");
    let second = application("tok-2", "Maria S.", "52998224725");

    send(&app.router, webhook("/webhooks/form-response", &first)).await;
    let (status, report) = send(&app.router, webhook("/webhooks/form-response", &second)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["outcome"], "duplicate_skipped");
    assert_eq!(report["existing_submission_id"], "tok-1");
    assert_eq!(report["matched_by"], "cpf");
    assert_eq!(app.store.len().await, 1);
    assert!(app.store.find_by_submission_id("tok-2").await.unwrap().is_none());
}

#[tokio::test]
async fn form_webhook_without_any_id_is_rejected() {
    let app = setup_app();
    let mut body = application("", "Maria Souza", "529.982.247-25");
    body.as_object_mut().unwrap().remove("token");

    let (status, _) = send(&app.router, webhook("/webhooks/form-response", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn legacy_alias_submission_creates_new_candidate() {
    let alias_map = FieldAliasMap::from_json_str(
        r#"{
            "schemas": {
                "formA": {
                    "version": 3,
                    "label": "Form A",
                    "fields": {
                        "name": [ { "alias": "name_v3" }, { "alias": "name_legacy" } ],
                        "cpf": [ { "alias": "cpf_v3" } ]
                    }
                }
            }
        }"#,
    )
    .unwrap();
    let app = setup_app_with(alias_map, None, None);
    let body = json!({
        "form_response": {
            "form_id": "formA",
            "response_id": "resp-a1",
            "answers": [
                { "field": { "id": "name_legacy" }, "type": "text", "text": "Carlos Mendes" },
                { "field": { "id": "cpf_v3" }, "type": "text", "text": "123.456.789-01" }
            ]
        }
    });

    let (status, report) = send(&app.router, webhook("/webhooks/form-response", &body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["outcome"], "created");

    let stored = app.store.find_by_submission_id("resp-a1").await.unwrap().unwrap();
    assert_eq!(stored.name, "Carlos Mendes");
    assert_eq!(stored.cpf.as_deref(), Some("12345678901"));
    assert_eq!(stored.form_id.as_deref(), Some("formA"));
    assert_eq!(stored.status.as_str(), "Analisado por IA");
    assert_eq!(stored.status_history.len(), 1);
}

#[tokio::test]
async fn signed_deliveries_are_verified_when_a_signing_secret_is_set() {
    let app = setup_app_with(FieldAliasMap::builtin(), None, Some("sig-secret"));
    let body = application("tok-9", "Maria Souza", "529.982.247-25").to_string();
    let signature = sign_payload("sig-secret", body.as_bytes()).unwrap();

    let signed = Request::builder()
        .method("POST")
        .uri("/webhooks/form-response")
        .header("typeform-signature", signature)
        .body(Body::from(body.clone()))
        .unwrap();
    let (status, _) = send(&app.router, signed).await;
    assert_eq!(status, StatusCode::CREATED);

    let tampered = Request::builder()
        .method("POST")
        .uri("/webhooks/form-response")
        .header("typeform-signature", "sha256=AAAA")
        .body(Body::from(body))
        .unwrap();
    let (status, body) = send(&app.router, tampered).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_signature");
}

#[tokio::test]
async fn exam_score_is_attached_to_resolved_candidate() {
    let app = setup_app();
    send(
        &app.router,
        webhook("/webhooks/form-response", &application("tok-1", "Maria Souza", "529.982.247-25")),
    )
    .await;

    let exam = json!({
        "form_response": {
            "form_id": "OrKerl6D",
            "token": "exam-1",
            "answers": [
                { "field": { "id": "syzxhm3Z3iGG" }, "type": "text", "text": "Maria Souza" },
                { "field": { "id": "dcpqtJoWbXds" }, "type": "text", "text": "529.982.247-25" }
            ],
            "variables": [ { "key": "quiz_score", "type": "number", "number": 7 } ]
        }
    });
    let (status, recorded) = send(&app.router, webhook("/webhooks/exam-score", &exam)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recorded["submission_id"], "tok-1");
    assert_eq!(recorded["matched_by"], "cpf");

    let stored = app.store.find_by_submission_id("tok-1").await.unwrap().unwrap();
    assert_eq!(stored.exam_scores.get("OrKerl6D"), Some(&7.0));
    assert_eq!(stored.status.as_str(), "Analisado por IA");

    let stranger = json!({
        "form_id": "OrKerl6D",
        "answers": [ { "field": { "id": "syzxhm3Z3iGG" }, "type": "text", "text": "Pedro Alves" } ],
        "variables": [ { "key": "quiz_score", "type": "number", "number": 4 } ]
    });
    let (status, _) = send(&app.router, webhook("/webhooks/exam-score", &stranger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let unknown_form = json!({ "form_id": "ynFUyrAc", "answers": [] });
    let (status, _) = send(&app.router, webhook("/webhooks/exam-score", &unknown_form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_update_requires_token_and_notifies_once() {
    let app = setup_app();
    send(
        &app.router,
        webhook("/webhooks/form-response", &application("tok-1", "Maria Souza", "529.982.247-25")),
    )
    .await;

    let anonymous = Request::builder()
        .method("PATCH")
        .uri("/api/candidates/tok-1/status")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "status": "Reprovado" }).to_string()))
        .unwrap();
    let (status, body) = send(&app.router, anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_authorization");

    let patch = || {
        authorized(
            "PATCH",
            "/api/candidates/tok-1/status",
            Some(json!({ "status": "Reprovado" })),
        )
    };
    let (status, change) = send(&app.router, patch()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["changed"], true);
    assert_eq!(change["notified"], true);
    assert_eq!(change["candidate"]["status"], "Reprovado");

    let (_, repeat) = send(&app.router, patch()).await;
    assert_eq!(repeat["changed"], false);
    assert_eq!(repeat["candidate"]["status_history"].as_array().unwrap().len(), 2);

    let sent = app.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+5567992992381");
    assert!(sent[0].1.contains("Maria"));

    let (status, _) = send(
        &app.router,
        authorized("PATCH", "/api/candidates/tok-1/status", Some(json!({ "status": "" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, authorized("GET", "/api/candidates/missing", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn import_runs_only_with_a_configured_source() {
    let app = setup_app();
    let (status, _) = send(&app.router, authorized("POST", "/api/imports", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let source: Arc<dyn SubmissionSource> = Arc::new(OnePageSource);
    let app = setup_app_with(FieldAliasMap::builtin(), Some(source), None);
    let (status, summary) = send(&app.router, authorized("POST", "/api/imports", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["processed"], 2);
    assert_eq!(summary["created"], 1);
    assert_eq!(summary["skipped_duplicate"], 1);
    assert_eq!(summary["page_errors"][0]["form_id"], "i6GB06nW");

    let (status, list) = send(&app.router, authorized("GET", "/api/candidates?limit=10", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn exam_status_repair_is_exposed_behind_auth() {
    let app = setup_app();
    let (status, summary) = send(
        &app.router,
        authorized("POST", "/api/maintenance/exam-statuses", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["corrected"], 0);
}

fn hr_user(name: &str, email: &str) -> HrUser {
    HrUser {
        id: uuid::Uuid::new_v4(),
        name: name.into(),
        email: email.into(),
        role: Some("recrutador".into()),
        image_url: None,
    }
}

#[tokio::test]
async fn hr_users_are_listed_by_name_behind_auth() {
    let store = MemoryCandidateStore::new().with_hr_users(vec![
        hr_user("Paula Reis", "paula@empresa.com"),
        hr_user("Carlos Mota", "carlos@empresa.com"),
    ]);
    let app = setup_app_over(store, FieldAliasMap::builtin(), None, None);

    let anonymous = Request::builder()
        .uri("/api/hr-users")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app.router, anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app.router, authorized("GET", "/api/hr-users", None)).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Carlos Mota", "Paula Reis"]);
    assert_eq!(body[0]["email"], "carlos@empresa.com");
}
