use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub name: String,
    pub created: i64,
    pub html: String,
    pub text: String,
    pub subject: String,
    pub published: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub created: i64,
    pub versions: Vec<Version>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Log {
    pub id: String,
    pub object: String,
    pub created: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub recipient_name: String,
    pub recipient_address: String,
    pub status: String,
    pub email_id: String,
    pub email_name: String,
    pub email_version: String,
    pub events_url: String,
}

#[derive(Deserialize)]
pub struct VersionInput {
    pub name: Option<String>,
    pub html: Option<String>,
    pub text: Option<String>,
    pub subject: Option<String>,
    pub published: Option<bool>,
}

#[derive(Deserialize, Default)]
pub struct RecipientInput {
    #[serde(default)]
    pub address: String,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct SendInput {
    #[serde(default)]
    pub email_id: String,
    pub recipient: Option<RecipientInput>,
    #[serde(default)]
    pub email_data: Map<String, Value>,
    pub version_name: Option<String>,
}

#[derive(Deserialize)]
pub struct DripInput {
    pub recipient: Option<RecipientInput>,
}

#[derive(Deserialize)]
pub struct DripDeactivation {
    #[serde(default)]
    pub recipient_address: String,
}

#[derive(Deserialize)]
pub struct ResendInput {
    #[serde(default)]
    pub log_id: String,
}

#[derive(Deserialize)]
pub struct RenderInput {
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub template_data: Map<String, Value>,
    pub version_id: Option<String>,
    pub version_name: Option<String>,
    pub locale: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct LogFilter {
    pub count: Option<usize>,
    pub offset: Option<usize>,
    pub created_gt: Option<i64>,
    pub created_gte: Option<i64>,
    pub created_lt: Option<i64>,
    pub created_lte: Option<i64>,
}

/// In-memory state of the fake service.
#[derive(Debug, Default)]
pub struct Store {
    pub templates: Vec<Template>,
    pub logs: Vec<Log>,
    /// Active recipient addresses per drip campaign id.
    pub drips: HashMap<String, HashSet<String>>,
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    expected_auth: Arc<str>,
}

type HandlerResult<T> = Result<Json<T>, (StatusCode, String)>;

const DEFAULT_LOG_COUNT: usize = 100;

pub fn app(api_key: &str) -> Router {
    app_with_store(api_key, Store::default())
}

pub fn app_with_store(api_key: &str, store: Store) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(store)),
        expected_auth: format!("Basic {}", STANDARD.encode(format!("{api_key}:"))).into(),
    };
    let api = Router::new()
        .route("/templates", get(list_templates).post(create_template))
        .route("/templates/{id}", get(get_template))
        .route("/templates/{id}/versions", post(create_version))
        .route(
            "/templates/{id}/versions/{version}",
            get(get_version).put(update_version),
        )
        .route("/send", post(send))
        .route("/render", post(render))
        .route("/drip_campaigns/{id}/activate", post(activate_drip))
        .route("/drip_campaigns/{id}/deactivate", post(deactivate_drip))
        .route("/logs", get(list_logs))
        .route("/logs/{id}", get(get_log))
        .route("/logs/{id}/events", get(get_log_events))
        .route("/resend", post(resend))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);
    Router::new().nest("/api/v1", api)
}

pub async fn run(listener: TcpListener, api_key: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(api_key)).await
}

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == &*state.expected_auth);
    if !authorized {
        return (StatusCode::FORBIDDEN, "API key unauthorized").into_response();
    }
    next.run(request).await
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

fn not_found(what: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

fn bad_request(message: &str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.to_string())
}

fn version_from(input: VersionInput) -> Version {
    Version {
        id: new_id("ver"),
        name: input.name.unwrap_or_default(),
        created: now(),
        html: input.html.unwrap_or_default(),
        text: input.text.unwrap_or_default(),
        subject: input.subject.unwrap_or_default(),
        published: input.published.unwrap_or(false),
    }
}

/// Replace `{{ key }}` and `{{key}}` with string or scalar values from `data`.
fn substitute(source: &str, data: &Map<String, Value>) -> String {
    let mut out = source.to_string();
    for (key, value) in data {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out = out
            .replace(&format!("{{{{ {key} }}}}"), &rendered)
            .replace(&format!("{{{{{key}}}}}"), &rendered);
    }
    out
}

// --- templates ---

async fn list_templates(State(state): State<AppState>) -> Json<Vec<Template>> {
    Json(state.db.read().await.templates.clone())
}

async fn get_template(State(state): State<AppState>, Path(id): Path<String>) -> HandlerResult<Template> {
    let store = state.db.read().await;
    store
        .templates
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("Template"))
}

async fn create_template(
    State(state): State<AppState>,
    Json(input): Json<VersionInput>,
) -> HandlerResult<Template> {
    let Some(name) = input.name.clone().filter(|n| !n.is_empty()) else {
        return Err(bad_request("Missing template name"));
    };
    let template = Template {
        id: new_id("tem"),
        name,
        tags: Vec::new(),
        created: now(),
        versions: vec![version_from(input)],
    };
    state.db.write().await.templates.push(template.clone());
    Ok(Json(template))
}

async fn create_version(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<VersionInput>,
) -> HandlerResult<Template> {
    let mut store = state.db.write().await;
    let template = store
        .templates
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| not_found("Template"))?;
    template.versions.push(version_from(input));
    Ok(Json(template.clone()))
}

async fn get_version(
    State(state): State<AppState>,
    Path((id, version)): Path<(String, String)>,
) -> HandlerResult<Version> {
    let store = state.db.read().await;
    store
        .templates
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| not_found("Template"))?
        .versions
        .iter()
        .find(|v| v.id == version)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("Version"))
}

async fn update_version(
    State(state): State<AppState>,
    Path((id, version)): Path<(String, String)>,
    Json(input): Json<VersionInput>,
) -> HandlerResult<Version> {
    let mut store = state.db.write().await;
    let version = store
        .templates
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| not_found("Template"))?
        .versions
        .iter_mut()
        .find(|v| v.id == version)
        .ok_or_else(|| not_found("Version"))?;
    if let Some(name) = input.name {
        version.name = name;
    }
    if let Some(html) = input.html {
        version.html = html;
    }
    if let Some(text) = input.text {
        version.text = text;
    }
    if let Some(subject) = input.subject {
        version.subject = subject;
    }
    if let Some(published) = input.published {
        version.published = published;
    }
    Ok(Json(version.clone()))
}

// --- sending ---

async fn send(State(state): State<AppState>, Json(input): Json<SendInput>) -> HandlerResult<Value> {
    let recipient = input.recipient.unwrap_or_default();
    if recipient.address.is_empty() {
        return Err(bad_request("Missing recipient address"));
    }
    let mut store = state.db.write().await;
    let template = store
        .templates
        .iter()
        .find(|t| t.id == input.email_id)
        .ok_or_else(|| bad_request("Unknown email_id"))?;
    let version = match &input.version_name {
        Some(name) => template.versions.iter().find(|v| &v.name == name),
        None => template.versions.first(),
    }
    .ok_or_else(|| bad_request("Unknown version_name"))?;

    let log_id = new_id("log");
    let log = Log {
        id: log_id.clone(),
        object: "log".to_string(),
        created: now(),
        kind: "sent".to_string(),
        message: format!("Sent: {}", substitute(&version.subject, &input.email_data)),
        recipient_name: recipient.name.unwrap_or_default(),
        recipient_address: recipient.address,
        status: "sent".to_string(),
        email_id: template.id.clone(),
        email_name: template.name.clone(),
        email_version: version.name.clone(),
        events_url: format!("/api/v1/logs/{log_id}/events"),
    };
    let response = json!({
        "success": true,
        "status": "OK",
        "receipt_id": log_id,
        "email": {
            "name": template.name,
            "version_name": version.name,
            "locale": "en-US",
        },
    });
    store.logs.push(log);
    Ok(Json(response))
}

async fn render(State(state): State<AppState>, Json(input): Json<RenderInput>) -> HandlerResult<Value> {
    let store = state.db.read().await;
    let template = store
        .templates
        .iter()
        .find(|t| t.id == input.template)
        .ok_or_else(|| bad_request("Unknown template"))?;
    let version = match (&input.version_id, &input.version_name) {
        (Some(id), _) => template.versions.iter().find(|v| &v.id == id),
        (None, Some(name)) => template.versions.iter().find(|v| &v.name == name),
        (None, None) => template.versions.first(),
    }
    .ok_or_else(|| bad_request("Unknown version"))?;
    Ok(Json(json!({
        "success": true,
        "status": "OK",
        "template": {
            "id": template.id,
            "name": template.name,
            "version_name": version.name,
            "locale": input.locale.unwrap_or_else(|| "en-US".to_string()),
        },
        "subject": substitute(&version.subject, &input.template_data),
        "html": substitute(&version.html, &input.template_data),
        "text": substitute(&version.text, &input.template_data),
    })))
}

// --- drip campaigns ---

async fn activate_drip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<DripInput>,
) -> HandlerResult<Value> {
    let recipient = input.recipient.unwrap_or_default();
    if recipient.address.is_empty() {
        return Err(bad_request("Missing recipient address"));
    }
    let mut store = state.db.write().await;
    store.drips.entry(id.clone()).or_default().insert(recipient.address.clone());
    Ok(Json(json!({
        "success": true,
        "status": "OK",
        "drip_campaign": { "id": id },
        "recipient_address": recipient.address,
    })))
}

async fn deactivate_drip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<DripDeactivation>,
) -> HandlerResult<Value> {
    if input.recipient_address.is_empty() {
        return Err(bad_request("Missing recipient_address"));
    }
    let mut store = state.db.write().await;
    let removed = store
        .drips
        .get_mut(&id)
        .is_some_and(|recipients| recipients.remove(&input.recipient_address));
    if !removed {
        return Err(not_found("Drip campaign recipient"));
    }
    Ok(Json(json!({
        "success": true,
        "status": "OK",
        "drip_campaign": { "id": id },
        "recipient_address": input.recipient_address,
    })))
}

// --- logs ---

async fn list_logs(State(state): State<AppState>, Query(filter): Query<LogFilter>) -> Json<Vec<Log>> {
    let store = state.db.read().await;
    let logs = store
        .logs
        .iter()
        .filter(|log| filter.created_gt.map_or(true, |bound| log.created > bound))
        .filter(|log| filter.created_gte.map_or(true, |bound| log.created >= bound))
        .filter(|log| filter.created_lt.map_or(true, |bound| log.created < bound))
        .filter(|log| filter.created_lte.map_or(true, |bound| log.created <= bound))
        .skip(filter.offset.unwrap_or(0))
        .take(filter.count.unwrap_or(DEFAULT_LOG_COUNT))
        .cloned()
        .collect();
    Json(logs)
}

async fn get_log(State(state): State<AppState>, Path(id): Path<String>) -> HandlerResult<Log> {
    let store = state.db.read().await;
    store
        .logs
        .iter()
        .find(|log| log.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("Log"))
}

async fn get_log_events(State(state): State<AppState>, Path(id): Path<String>) -> HandlerResult<Value> {
    let store = state.db.read().await;
    let log = store
        .logs
        .iter()
        .find(|log| log.id == id)
        .ok_or_else(|| not_found("Log"))?;
    Ok(Json(json!({
        "object": "event",
        "created": log.created,
        "type": log.kind,
        "message": log.message,
    })))
}

async fn resend(State(state): State<AppState>, Json(input): Json<ResendInput>) -> HandlerResult<Value> {
    let mut store = state.db.write().await;
    let original = store
        .logs
        .iter()
        .find(|log| log.id == input.log_id)
        .cloned()
        .ok_or_else(|| not_found("Log"))?;
    let log_id = new_id("log");
    let response = json!({
        "success": true,
        "status": "OK",
        "log_id": log_id,
        "email": {
            "name": original.email_name,
            "version_name": original.email_version,
        },
    });
    store.logs.push(Log {
        id: log_id.clone(),
        created: now(),
        events_url: format!("/api/v1/logs/{log_id}/events"),
        ..original
    });
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_replaces_spaced_and_tight_placeholders() {
        let mut data = Map::new();
        data.insert("name".to_string(), json!("Ada"));
        data.insert("count".to_string(), json!(3));
        assert_eq!(
            substitute("Hi {{ name }}, you have {{count}} messages", &data),
            "Hi Ada, you have 3 messages"
        );
    }

    #[test]
    fn version_from_defaults_missing_fields() {
        let input: VersionInput = serde_json::from_str(r#"{"name":"v1"}"#).unwrap();
        let version = version_from(input);
        assert_eq!(version.name, "v1");
        assert!(version.html.is_empty());
        assert!(!version.published);
        assert!(version.id.starts_with("ver_"));
    }

    #[test]
    fn log_serializes_kind_as_type() {
        let log = Log {
            id: "log_1".to_string(),
            object: "log".to_string(),
            created: 1,
            kind: "sent".to_string(),
            message: String::new(),
            recipient_name: String::new(),
            recipient_address: "a@example.com".to_string(),
            status: "sent".to_string(),
            email_id: "tem_1".to_string(),
            email_name: "Welcome".to_string(),
            email_version: "v1".to_string(),
            events_url: String::new(),
        };
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["type"], "sent");
        assert!(json.get("kind").is_none());
    }
}
