//! Blocking client for the sendwithus transactional email API.
//!
//! # Overview
//! Every operation funnels through one routine: build an authenticated
//! `HttpRequest`, hand it to a `Transport`, then turn the `HttpResponse`
//! into either a typed value or an `Error`. Nothing is retried, cached or
//! logged as an error; failures come back as values.
//!
//! # Design
//! - `Client` holds only the API key, the base URL and a transport, so a
//!   single value can serve many callers if its transport can.
//! - Request building and response parsing are pure and public, keeping the
//!   I/O boundary explicit. The default transport is `UreqTransport`; tests
//!   substitute their own.
//! - Request DTOs wrap text fields in `Option` so "unset" is never sent as an
//!   empty string, which matters for partial version updates.

pub mod client;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use client::{Client, ClientBuilder, API_CLIENT_HEADER, DEFAULT_ENDPOINT};
pub use error::{ApiError, Error, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use transport::UreqTransport;
pub use types::{
    Attachment, Drip, Email, Log, LogEvent, LogQuery, LogResend, RenderRequest, RenderResponse,
    RenderedTemplate, Recipient, ResentEmail, SendResponse, SentEmail, Sender, Template,
    TemplateData, Version,
};
