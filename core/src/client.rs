//! Authenticated request routine and the typed sendwithus operations.
//!
//! # Design
//! Every operation is a path, a verb and an optional JSON body handed to
//! `execute`, which builds the request, runs it through the transport and
//! checks the status. `build_request` and `parse_response` are public so a
//! caller that wants to do its own I/O can use the same wire format.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ApiError, Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::transport::UreqTransport;
use crate::types::{
    Drip, Email, Log, LogEvent, LogQuery, LogResend, RenderRequest, RenderResponse, SendResponse,
    Template, Version,
};

/// Production API root.
pub const DEFAULT_ENDPOINT: &str = "https://api.sendwithus.com/api/v1";

/// Header identifying this library to the service.
pub const API_CLIENT_HEADER: (&str, &str) = (
    "X-SWU-API-CLIENT",
    concat!("rust-", env!("CARGO_PKG_VERSION")),
);

/// Configures a `Client` before construction.
pub struct ClientBuilder<T = UreqTransport> {
    api_key: String,
    base_url: String,
    transport: T,
}

impl ClientBuilder<UreqTransport> {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_transport(api_key, UreqTransport::new())
    }
}

impl<T: Transport> ClientBuilder<T> {
    /// Start from a caller-supplied transport; no default agent is built.
    pub fn with_transport(api_key: impl Into<String>, transport: T) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_ENDPOINT.to_string(),
            transport,
        }
    }
}

impl<T> ClientBuilder<T> {
    /// Point the client at another API root, e.g. a local mock server.
    pub fn base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.base_url = base_url.as_ref().trim_end_matches('/').to_string();
        self
    }

    /// Replace the HTTP transport.
    pub fn transport<U: Transport>(self, transport: U) -> ClientBuilder<U> {
        ClientBuilder {
            api_key: self.api_key,
            base_url: self.base_url,
            transport,
        }
    }

    pub fn build(self) -> Client<T> {
        Client {
            api_key: self.api_key,
            base_url: self.base_url,
            transport: self.transport,
        }
    }
}

/// Blocking client for the sendwithus API.
///
/// Holds no mutable state; it is as shareable as its transport.
pub struct Client<T = UreqTransport> {
    api_key: String,
    base_url: String,
    transport: T,
}

impl Client<UreqTransport> {
    /// Client for the production endpoint using the default transport.
    pub fn new(api_key: impl Into<String>) -> Self {
        ClientBuilder::new(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> ClientBuilder<UreqTransport> {
        ClientBuilder::new(api_key)
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Client<T> {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // --- templates ---

    pub fn list_templates(&self) -> Result<Vec<Template>> {
        self.request(HttpMethod::Get, "/templates", None)
    }

    pub fn get_template(&self, id: &str) -> Result<Template> {
        self.request(HttpMethod::Get, &format!("/templates/{id}"), None)
    }

    pub fn get_template_version(&self, id: &str, version: &str) -> Result<Version> {
        self.request(
            HttpMethod::Get,
            &format!("/templates/{id}/versions/{version}"),
            None,
        )
    }

    /// Replace the fields set in `update`; `None` fields are left untouched
    /// on the service.
    pub fn update_template_version(
        &self,
        id: &str,
        version: &str,
        update: &Version,
    ) -> Result<Version> {
        let body = encode(update)?;
        self.request(
            HttpMethod::Put,
            &format!("/templates/{id}/versions/{version}"),
            Some(body),
        )
    }

    /// Create a template whose first version is `version`.
    pub fn create_template(&self, version: &Version) -> Result<Template> {
        let body = encode(version)?;
        self.request(HttpMethod::Post, "/templates", Some(body))
    }

    pub fn create_template_version(&self, id: &str, version: &Version) -> Result<Template> {
        let body = encode(version)?;
        self.request(
            HttpMethod::Post,
            &format!("/templates/{id}/versions"),
            Some(body),
        )
    }

    // --- sending ---

    pub fn send(&self, email: &Email) -> Result<SendResponse> {
        let body = encode(email)?;
        self.request(HttpMethod::Post, "/send", Some(body))
    }

    /// Render a template with data without sending anything.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderResponse> {
        let body = encode(request)?;
        self.request(HttpMethod::Post, "/render", Some(body))
    }

    // --- drip campaigns ---

    /// Start drip campaign `drip_id` for the drip's recipient.
    pub fn activate_drip(&self, drip_id: &str, drip: &Drip) -> Result<()> {
        let body = encode(drip)?;
        self.request_empty(
            HttpMethod::Post,
            &format!("/drip_campaigns/{drip_id}/activate"),
            Some(body),
        )
    }

    /// Remove `recipient_address` from drip campaign `drip_id`.
    pub fn deactivate_drip(&self, drip_id: &str, recipient_address: &str) -> Result<()> {
        let body = encode(&DripDeactivation { recipient_address })?;
        self.request_empty(
            HttpMethod::Post,
            &format!("/drip_campaigns/{drip_id}/deactivate"),
            Some(body),
        )
    }

    // --- logs ---

    pub fn list_logs(&self, query: &LogQuery) -> Result<Vec<Log>> {
        let query = query.to_query_string();
        let path = if query.is_empty() {
            "/logs".to_string()
        } else {
            format!("/logs?{query}")
        };
        self.request(HttpMethod::Get, &path, None)
    }

    pub fn get_log(&self, id: &str) -> Result<Log> {
        self.request(HttpMethod::Get, &format!("/logs/{id}"), None)
    }

    pub fn get_log_events(&self, id: &str) -> Result<LogEvent> {
        self.request(HttpMethod::Get, &format!("/logs/{id}/events"), None)
    }

    /// Resend a logged email. If the service omits `log_id` in its reply,
    /// the requested id is reported back.
    pub fn resend_log(&self, id: &str) -> Result<LogResend> {
        let body = encode(&ResendRequest { log_id: id })?;
        let mut resend: LogResend = self.request(HttpMethod::Post, "/resend", Some(body))?;
        if resend.id.is_empty() {
            resend.id = id.to_string();
        }
        Ok(resend)
    }

    // --- wire format ---

    /// Build the authenticated request for `path` (relative to the base URL).
    pub fn build_request(&self, method: HttpMethod, path: &str, body: Option<String>) -> HttpRequest {
        let credentials = STANDARD.encode(format!("{}:", self.api_key));
        let mut headers = vec![
            ("authorization".to_string(), format!("Basic {credentials}")),
            (API_CLIENT_HEADER.0.to_string(), API_CLIENT_HEADER.1.to_string()),
        ];
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        HttpRequest {
            method,
            url: format!("{}{path}", self.base_url),
            headers,
            body,
        }
    }

    /// Check the status of `response` and decode its body as `R`.
    pub fn parse_response<R: DeserializeOwned>(&self, response: HttpResponse) -> Result<R> {
        check_status(&response)?;
        decode(&response)
    }

    fn request<R: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<String>,
    ) -> Result<R> {
        let response = self.execute(method, path, body)?;
        decode(&response)
    }

    fn request_empty(&self, method: HttpMethod, path: &str, body: Option<String>) -> Result<()> {
        self.execute(method, path, body)?;
        Ok(())
    }

    fn execute(&self, method: HttpMethod, path: &str, body: Option<String>) -> Result<HttpResponse> {
        debug!("{method} {path}");
        let request = self.build_request(method, path, body);
        let response = self.transport.execute(request)?;
        trace!("{method} {path} -> {}", response.status);
        check_status(&response)?;
        Ok(response)
    }
}

#[derive(Serialize)]
struct DripDeactivation<'a> {
    recipient_address: &'a str,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    log_id: &'a str,
}

fn encode<B: Serialize>(body: &B) -> Result<String> {
    serde_json::to_string(body).map_err(Error::Encode)
}

fn decode<R: DeserializeOwned>(response: &HttpResponse) -> Result<R> {
    serde_json::from_slice(&response.body).map_err(Error::Decode)
}

/// Statuses of 300 and above fail with the raw body as the message.
fn check_status(response: &HttpResponse) -> std::result::Result<(), ApiError> {
    if response.status < 300 {
        return Ok(());
    }
    Err(ApiError::new(
        response.status,
        String::from_utf8_lossy(&response.body),
    ))
}
