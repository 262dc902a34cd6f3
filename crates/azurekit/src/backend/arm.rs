//! Resource Manager REST backend.
//!
//! Talks to `https://management.azure.com` (or the endpoint of the
//! configured cloud) with a bearer token obtained from Active Directory.
//!
//! The token is acquired on first use and cached for the lifetime of the
//! backend. It is never refreshed, so a backend should not outlive a
//! single run.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{ConnectionAuth, ResourceGroup, ResourceGroupSpec};
use crate::{Client, Connector};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use ureq::Body;
use ureq::http::Response;

/// Resource Manager API version for resource group calls.
pub const API_VERSION: &str = "2021-04-01";

/// Public client id of the Azure CLI, used for the password grant.
const CLI_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

/// Maximum length of a resource group name.
const MAX_NAME_LEN: usize = 90;

/// Timeouts for the REST backend.
#[derive(Debug, Clone)]
pub struct ArmConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// How long to wait for an asynchronous delete to finish
    pub operation_timeout: Duration,
    /// Delay between status polls when the server sends no `Retry-After`
    pub poll_interval: Duration,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Backend that calls the Resource Manager REST API.
pub struct ArmBackend {
    agent: ureq::Agent,
    auth: ConnectionAuth,
    config: ArmConfig,
    /// Resource Manager base URL
    management_base: String,
    /// Active Directory base URL
    login_base: String,
    token: Mutex<Option<String>>,
}

impl ArmBackend {
    /// Create a backend for the cloud named in the credentials.
    pub fn new(auth: ConnectionAuth, config: ArmConfig) -> Self {
        let cloud = auth.cloud_environment();
        Self::with_endpoints(
            auth,
            config,
            cloud.resource_manager_endpoint(),
            cloud.active_directory_endpoint(),
        )
    }

    /// Create a backend with custom endpoints (for testing or private clouds).
    pub fn with_endpoints(
        auth: ConnectionAuth,
        config: ArmConfig,
        management_base: impl Into<String>,
        login_base: impl Into<String>,
    ) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            auth,
            config,
            management_base: management_base.into().trim_end_matches('/').to_string(),
            login_base: login_base.into().trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        }
    }

    /// Build the URL of a resource group.
    fn group_url(&self, name: &str) -> Result<String> {
        validate_name(name)?;
        Ok(format!(
            "{}/subscriptions/{}/resourcegroups/{}?api-version={}",
            self.management_base,
            self.auth.subscription_id(),
            urlencoding::encode(name),
            API_VERSION
        ))
    }

    /// `Authorization` header value, acquiring a token on first use.
    fn bearer(&self) -> Result<String> {
        let mut cached = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = cached.as_ref() {
            return Ok(format!("Bearer {token}"));
        }

        let token = self.acquire_token()?;
        let header = format!("Bearer {token}");
        *cached = Some(token);
        Ok(header)
    }

    fn acquire_token(&self) -> Result<String> {
        let request = token_request(&self.auth, &self.login_base);
        log::debug!(
            "requesting {} token from {}",
            self.auth.kind(),
            request.url
        );

        let mut response = self
            .agent
            .post(&request.url)
            .send_form(request.form.iter().map(|(k, v)| (*k, v.as_str())))?;

        let status = response.status().as_u16();
        let body = read_body(&mut response);
        parse_token_response(status, &body)
    }

    /// Poll `url` until `target` reports the operation finished.
    fn wait_for_operation(
        &self,
        url: &str,
        target: PollTarget,
        mut delay: Duration,
        what: &str,
    ) -> Result<()> {
        let deadline = Instant::now() + self.config.operation_timeout;

        loop {
            if Instant::now() + delay > deadline {
                return Err(Error::Timeout {
                    operation: what.to_string(),
                });
            }
            std::thread::sleep(delay);

            let bearer = self.bearer()?;
            let request = match target {
                PollTarget::Operation => self.agent.get(url),
                PollTarget::Group => self.agent.head(url),
            };
            let mut response = request.header("Authorization", bearer.as_str()).call()?;

            let status = response.status().as_u16();
            match target.progress(status) {
                Some(Progress::Running) => {
                    delay = retry_after(&response).unwrap_or(self.config.poll_interval);
                    log::debug!("{what} still running, next poll in {}s", delay.as_secs());
                }
                Some(Progress::Done) => return Ok(()),
                None => return Err(api_error(status, &read_body(&mut response))),
            }
        }
    }
}

impl Backend for ArmBackend {
    fn exists(&self, name: &str) -> Result<bool> {
        let url = self.group_url(name)?;
        let bearer = self.bearer()?;
        let response = self
            .agent
            .head(&url)
            .header("Authorization", bearer.as_str())
            .call()?;

        match response.status().as_u16() {
            200 | 204 => Ok(true),
            404 => Ok(false),
            status => Err(Error::Api {
                status,
                code: "UnexpectedStatus".to_string(),
                message: format!("existence check for {name} returned HTTP {status}"),
            }),
        }
    }

    fn get(&self, name: &str) -> Result<ResourceGroup> {
        let url = self.group_url(name)?;
        let bearer = self.bearer()?;
        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", bearer.as_str())
            .call()?;

        match response.status().as_u16() {
            200 => Ok(response.body_mut().read_json::<WireGroup>()?.into()),
            404 => Err(Error::NotFound {
                name: name.to_string(),
            }),
            status => Err(api_error(status, &read_body(&mut response))),
        }
    }

    fn create_or_update(&self, spec: &ResourceGroupSpec) -> Result<ResourceGroup> {
        let url = self.group_url(&spec.name)?;
        let bearer = self.bearer()?;
        let mut response = self
            .agent
            .put(&url)
            .header("Authorization", bearer.as_str())
            .send_json(create_body(spec))?;

        match response.status().as_u16() {
            200 | 201 => Ok(response.body_mut().read_json::<WireGroup>()?.into()),
            status => Err(api_error(status, &read_body(&mut response))),
        }
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let url = self.group_url(name)?;
        let bearer = self.bearer()?;
        let mut response = self
            .agent
            .delete(&url)
            .header("Authorization", bearer.as_str())
            .call()?;

        match response.status().as_u16() {
            200 | 204 => Ok(true),
            404 => Ok(false),
            202 => {
                let delay = retry_after(&response).unwrap_or(self.config.poll_interval);
                let what = format!("deletion of {name}");
                match header_str(&response, "location").map(str::to_string) {
                    Some(location) => {
                        self.wait_for_operation(&location, PollTarget::Operation, delay, &what)?;
                    }
                    None => self.wait_for_operation(&url, PollTarget::Group, delay, &what)?,
                }
                Ok(true)
            }
            status => Err(api_error(status, &read_body(&mut response))),
        }
    }
}

/// Connects [`ArmBackend`]s for the given credentials.
#[derive(Debug, Clone, Default)]
pub struct ArmConnector {
    /// Timeouts for every backend this connector creates
    pub config: ArmConfig,
}

impl ArmConnector {
    /// Create a connector with custom timeouts.
    pub fn new(config: ArmConfig) -> Self {
        Self { config }
    }
}

impl Connector for ArmConnector {
    fn connect(&self, auth: &ConnectionAuth) -> Result<Client> {
        Ok(ArmBackend::new(auth.clone(), self.config.clone()).into())
    }
}

/// What is polled while waiting for an asynchronous delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollTarget {
    /// The operation status URL from the `Location` header
    Operation,
    /// The resource group itself, when no `Location` was given
    Group,
}

#[derive(Debug, PartialEq, Eq)]
enum Progress {
    Running,
    Done,
}

impl PollTarget {
    /// Interpret a poll status; `None` means the poll failed.
    fn progress(self, status: u16) -> Option<Progress> {
        match (self, status) {
            (Self::Operation, 202) | (Self::Group, 200 | 204) => Some(Progress::Running),
            (Self::Operation, 200 | 204) | (Self::Group, 404) => Some(Progress::Done),
            _ => None,
        }
    }
}

/// Reject names Resource Manager would refuse.
///
/// Letters and digits may be any Unicode alphanumeric; the name is
/// percent-encoded when it goes into a URL.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(invalid("longer than 90 characters"));
    }
    if name.ends_with('.') {
        return Err(invalid("must not end with a period"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '(' | ')')))
    {
        return Err(invalid(&format!("character '{c}' is not allowed")));
    }
    Ok(())
}

// =============================================================================
// Token endpoint
// =============================================================================

struct TokenRequest {
    url: String,
    form: Vec<(&'static str, String)>,
}

fn token_request(auth: &ConnectionAuth, login_base: &str) -> TokenRequest {
    let resource = auth.cloud_environment().token_audience().to_string();
    match auth {
        ConnectionAuth::ServicePrincipal {
            tenant,
            client_id,
            secret,
            ..
        } => TokenRequest {
            url: format!("{login_base}/{tenant}/oauth2/token"),
            form: vec![
                ("grant_type", "client_credentials".to_string()),
                ("client_id", client_id.clone()),
                ("client_secret", secret.clone()),
                ("resource", resource),
            ],
        },
        ConnectionAuth::UserPass {
            username, password, ..
        } => TokenRequest {
            url: format!("{login_base}/common/oauth2/token"),
            form: vec![
                ("grant_type", "password".to_string()),
                ("client_id", CLI_CLIENT_ID.to_string()),
                ("username", username.clone()),
                ("password", password.clone()),
                ("resource", resource),
            ],
        },
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn parse_token_response(status: u16, body: &str) -> Result<String> {
    let fallback = || format!("token endpoint returned HTTP {status}");
    let parsed: TokenResponse = serde_json::from_str(body).map_err(|_| Error::Authentication {
        message: fallback(),
    })?;

    match parsed.access_token {
        Some(token) if status == 200 => Ok(token),
        _ => Err(Error::Authentication {
            // AAD descriptions carry trace ids on later lines
            message: parsed
                .error_description
                .as_deref()
                .and_then(|d| d.lines().next())
                .map(str::to_string)
                .or(parsed.error)
                .unwrap_or_else(fallback),
        }),
    }
}

// =============================================================================
// Resource Manager payloads
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGroup {
    id: String,
    name: String,
    location: String,
    managed_by: Option<String>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    properties: Option<WireProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProperties {
    provisioning_state: Option<String>,
}

impl From<WireGroup> for ResourceGroup {
    fn from(g: WireGroup) -> Self {
        Self {
            id: g.id,
            name: g.name,
            location: g.location,
            managed_by: g.managed_by,
            tags: g.tags.unwrap_or_default(),
            provisioning_state: g.properties.and_then(|p| p.provisioning_state),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    code: String,
    message: String,
}

fn create_body(spec: &ResourceGroupSpec) -> Value {
    let mut body = json!({
        "location": spec.location,
        "tags": spec.tags,
    });
    if let Some(managed_by) = &spec.managed_by {
        body["managedBy"] = json!(managed_by);
    }
    body
}

fn api_error(status: u16, body: &str) -> Error {
    match serde_json::from_str::<WireErrorEnvelope>(body) {
        Ok(envelope) => Error::Api {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => Error::Api {
            status,
            code: "HttpError".to_string(),
            message: if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body.trim().to_string()
            },
        },
    }
}

fn read_body(response: &mut Response<Body>) -> String {
    response.body_mut().read_to_string().unwrap_or_default()
}

fn header_str<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn retry_after(response: &Response<Body>) -> Option<Duration> {
    header_str(response, "retry-after").and_then(parse_retry_after)
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_principal() -> ConnectionAuth {
        ConnectionAuth::ServicePrincipal {
            subscription_id: "sub-1".into(),
            tenant: "tenant-1".into(),
            client_id: "client-1".into(),
            secret: "s3cret".into(),
            cloud_environment: None,
        }
    }

    #[test]
    fn test_group_url() {
        let backend = ArmBackend::with_endpoints(
            service_principal(),
            ArmConfig::default(),
            "http://127.0.0.1:9/",
            "http://127.0.0.1:9",
        );
        assert_eq!(
            backend.group_url("my_rg").unwrap(),
            "http://127.0.0.1:9/subscriptions/sub-1/resourcegroups/my_rg?api-version=2021-04-01"
        );
        assert!(backend.group_url("bad/name").is_err());
    }

    #[test]
    fn test_new_uses_cloud_endpoints() {
        let auth = ConnectionAuth::UserPass {
            subscription_id: "sub".into(),
            username: "u".into(),
            password: "p".into(),
            cloud_environment: Some(crate::CloudEnvironment::China),
        };
        let backend = ArmBackend::new(auth, ArmConfig::default());
        assert_eq!(backend.management_base, "https://management.chinacloudapi.cn");
        assert_eq!(backend.login_base, "https://login.chinacloudapi.cn");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("rg-prod_01(east).v2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("trailing.").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name(&"a".repeat(91)).is_err());
        assert!(validate_name(&"a".repeat(90)).is_ok());
    }

    #[test]
    fn test_validate_unicode_name() {
        assert!(validate_name("grupo-ñ").is_ok());
        assert!(validate_name("Grüße(Ä)").is_ok());
        assert!(validate_name(&"ñ".repeat(90)).is_ok());
        assert!(validate_name(&"ñ".repeat(91)).is_err());
        assert!(validate_name("grupo/ñ").is_err());
    }

    #[test]
    fn test_group_url_encodes_name() {
        let backend = ArmBackend::with_endpoints(
            service_principal(),
            ArmConfig::default(),
            "https://management.azure.com",
            "https://login.microsoftonline.com",
        );
        assert_eq!(
            backend.group_url("grupo-ñ").unwrap(),
            "https://management.azure.com/subscriptions/sub-1/resourcegroups/grupo-%C3%B1?api-version=2021-04-01"
        );
    }

    #[test]
    fn test_poll_operation_status() {
        assert_eq!(PollTarget::Operation.progress(202), Some(Progress::Running));
        assert_eq!(PollTarget::Operation.progress(200), Some(Progress::Done));
        assert_eq!(PollTarget::Operation.progress(204), Some(Progress::Done));
        assert_eq!(PollTarget::Operation.progress(404), None);
        assert_eq!(PollTarget::Operation.progress(500), None);
    }

    #[test]
    fn test_poll_group_until_gone() {
        assert_eq!(PollTarget::Group.progress(200), Some(Progress::Running));
        assert_eq!(PollTarget::Group.progress(204), Some(Progress::Running));
        assert_eq!(PollTarget::Group.progress(404), Some(Progress::Done));
        assert_eq!(PollTarget::Group.progress(202), None);
        assert_eq!(PollTarget::Group.progress(409), None);
    }

    #[test]
    fn test_token_request_service_principal() {
        let request = token_request(&service_principal(), "https://login.microsoftonline.com");
        assert_eq!(
            request.url,
            "https://login.microsoftonline.com/tenant-1/oauth2/token"
        );
        assert!(request
            .form
            .contains(&("grant_type", "client_credentials".to_string())));
        assert!(request.form.contains(&("client_secret", "s3cret".to_string())));
        assert!(request.form.contains(&(
            "resource",
            "https://management.core.windows.net/".to_string()
        )));
    }

    #[test]
    fn test_token_request_user_pass() {
        let auth = ConnectionAuth::UserPass {
            subscription_id: "sub".into(),
            username: "fletch".into(),
            password: "123pass".into(),
            cloud_environment: None,
        };
        let request = token_request(&auth, "https://login.microsoftonline.com");
        assert_eq!(
            request.url,
            "https://login.microsoftonline.com/common/oauth2/token"
        );
        assert!(request.form.contains(&("grant_type", "password".to_string())));
        assert!(request.form.contains(&("client_id", CLI_CLIENT_ID.to_string())));
    }

    #[test]
    fn test_parse_token_response() {
        let token = parse_token_response(200, r#"{"token_type":"Bearer","access_token":"abc"}"#);
        assert_eq!(token.unwrap(), "abc");

        let err = parse_token_response(
            400,
            r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret.\r\nTrace ID: 1"}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "authentication failed: AADSTS7000215: Invalid client secret."
        );

        let err = parse_token_response(502, "<html>bad gateway</html>").unwrap_err();
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn test_api_error_parsing() {
        let err = api_error(
            400,
            r#"{"error":{"code":"LocationNotAvailableForResourceGroup","message":"The provided location 'mars' is not available"}}"#,
        );
        match err {
            Error::Api { status, code, .. } => {
                assert_eq!(status, 400);
                assert_eq!(code, "LocationNotAvailableForResourceGroup");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(api_error(500, "").to_string(), "HttpError: HTTP 500 (HTTP 500)");
    }

    #[test]
    fn test_wire_group_conversion() {
        let wire: WireGroup = serde_json::from_str(
            r#"{
                "id": "/subscriptions/sub/resourceGroups/rg1",
                "name": "rg1",
                "type": "Microsoft.Resources/resourceGroups",
                "location": "westus",
                "managedBy": "/subscriptions/sub/providers/x",
                "tags": {"env": "prod"},
                "properties": {"provisioningState": "Succeeded"}
            }"#,
        )
        .unwrap();
        let group: ResourceGroup = wire.into();
        assert_eq!(group.name, "rg1");
        assert_eq!(group.managed_by.as_deref(), Some("/subscriptions/sub/providers/x"));
        assert_eq!(group.tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(group.provisioning_state.as_deref(), Some("Succeeded"));

        let bare: WireGroup = serde_json::from_str(
            r#"{"id": "x", "name": "rg2", "location": "eastus", "tags": null}"#,
        )
        .unwrap();
        let group: ResourceGroup = bare.into();
        assert!(group.tags.is_empty());
        assert!(group.provisioning_state.is_none());
    }

    #[test]
    fn test_create_body() {
        let spec = ResourceGroupSpec::new("rg1", "westus").with_tag("a", "1");
        assert_eq!(
            create_body(&spec),
            json!({"location": "westus", "tags": {"a": "1"}})
        );

        let managed = spec.with_managed_by("/subscriptions/sub/x");
        assert_eq!(create_body(&managed)["managedBy"], json!("/subscriptions/sub/x"));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("15"), Some(Duration::from_secs(15)));
        assert_eq!(parse_retry_after(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
