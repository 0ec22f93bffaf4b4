//! Microsoft Graph client
//!
//! Single attempt per call: no retries, no timeouts, no rate-limit backoff.

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::auth::AuthSession;
use crate::error::{ReportError, Result};
use crate::models::{DirectoryObject, Group, ODataCollection, SendMailRequest};

/// Fields requested for every group in the listing
pub const GROUP_FIELDS: &[&str] = &[
    "id",
    "displayName",
    "mail",
    "groupTypes",
    "mailEnabled",
    "resourceProvisioningOptions",
];

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Install the process-wide rustls crypto provider
///
/// Safe to call more than once; later calls are no-ops.
pub fn install_crypto_provider() {
    #[cfg(not(windows))]
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    #[cfg(windows)]
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Graph operations the report pipeline uses
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// List groups with the report's field projection (first page only)
    async fn list_groups(&self) -> Result<Vec<Group>>;

    /// List the direct members of a group
    async fn list_group_members(&self, group_id: &str) -> Result<Vec<DirectoryObject>>;

    /// Send a mail message as the signed-in user
    async fn send_mail(&self, request: &SendMailRequest) -> Result<()>;
}

/// `GET /groups` endpoint with the `$select` projection
pub fn groups_endpoint() -> String {
    format!("/groups?$select={}", GROUP_FIELDS.join(","))
}

pub fn members_endpoint(group_id: &str) -> String {
    format!("/groups/{}/members", group_id)
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.map_or(false, |ct| ct.contains("application/json"))
}

/// Decode a JSON payload into one of the typed Graph shapes
fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ReportError::ParseError(format!("Unexpected {} payload: {}", what, e)))
}

/// Graph client over hyper, authenticated through the shared [`AuthSession`]
pub struct HttpGraphClient {
    http: HttpsClient,
    session: Arc<AuthSession>,
    base_url: String,
}

impl HttpGraphClient {
    /// Create a client against `base_url` (e.g. `https://graph.microsoft.com/v1.0`)
    pub fn new(session: Arc<AuthSession>, base_url: impl Into<String>) -> Self {
        install_crypto_provider();

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let http = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            http,
            session,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Issue one authenticated request
    ///
    /// Returns an empty JSON object when the response carries no JSON
    /// content-type (e.g. `202 Accepted` from `sendMail`).
    pub async fn call<B>(&self, endpoint: &str, method: Method, body: Option<&B>) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let credential = self.session.get_credential().await?;
        let url = self.url_for(endpoint);

        let payload = match body {
            Some(body) => Bytes::from(serde_json::to_vec(body)?),
            None => Bytes::new(),
        };

        let request = Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .header(AUTHORIZATION, format!("Bearer {}", credential.access_token))
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(payload))?;

        debug!("{} {}", method, url);
        let response = self.http.request(request).await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.into_body().collect().await?.to_bytes();

        if !status.is_success() {
            let error_text = String::from_utf8_lossy(&bytes).into_owned();
            error!("Graph API error response ({} {}): {}", method, url, error_text);
            return Err(ReportError::ApiError {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body: error_text,
            });
        }

        if !is_json_content_type(content_type.as_deref()) {
            warn!("No JSON content in response from {} {}", method, url);
            return Ok(Value::Object(Default::default()));
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            error!("Error parsing JSON response from {}: {}", url, e);
            ReportError::ParseError(e.to_string())
        })
    }
}

#[async_trait]
impl GraphClient for HttpGraphClient {
    async fn list_groups(&self) -> Result<Vec<Group>> {
        let value = self
            .call::<Value>(&groups_endpoint(), Method::GET, None)
            .await?;
        let groups: ODataCollection<Group> = decode(value, "group list")?;
        debug!("Graph returned {} groups", groups.value.len());
        Ok(groups.value)
    }

    async fn list_group_members(&self, group_id: &str) -> Result<Vec<DirectoryObject>> {
        let value = self
            .call::<Value>(&members_endpoint(group_id), Method::GET, None)
            .await?;
        let members: ODataCollection<DirectoryObject> = decode(value, "member list")?;
        Ok(members.value)
    }

    async fn send_mail(&self, request: &SendMailRequest) -> Result<()> {
        self.call("/me/sendMail", Method::POST, Some(request)).await?;
        Ok(())
    }
}
