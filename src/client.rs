use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, Credentials, ErrorCodes, DEFAULT_TIMEOUT_SECS};
use crate::error::{Error, Result};
use crate::logging::{LogLogger, Logger};
use crate::models::{DeviceRecord, DeviceRegistry};
use crate::types::{
    DeviceEntry, DeviceListResponse, Envelope, PassthroughResponse, ServiceRequest, SysInfo,
    SysInfoReply, SystemCommand,
};

/// Token refreshes allowed per logical operation.
pub const DEFAULT_RETRIES: u32 = 1;

/// Outcome of a single round trip to the service.
#[derive(Debug)]
pub(crate) enum Reply {
    /// `error_code == 0`; the full decoded body.
    Success(Value),
    /// The session token is no longer accepted.
    TokenExpired,
}

/// Client for the TP-Link cloud, addressing plugs by alias.
///
/// Lifecycle: [`authenticate`](Self::authenticate) obtains a token,
/// [`setup_devices`](Self::setup_devices) fills the alias registry, after
/// which the state calls can be used. [`KasaClient::connect`] does the first
/// two steps in one go.
pub struct KasaClient {
    http: reqwest::Client,
    credentials: Credentials,
    token: String,
    registry: Option<DeviceRegistry>,
    error_codes: ErrorCodes,
    timeout: Duration,
    pub(crate) logger: Arc<dyn Logger>,
}

impl KasaClient {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            token: String::new(),
            registry: None,
            error_codes: ErrorCodes::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            logger: Arc::new(LogLogger),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.credentials())
            .with_timeout(config.timeout())
            .with_error_codes(config.error_codes)
    }

    /// Build a client from configuration, log in and enumerate devices.
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut client = Self::from_config(config);
        client.initialize().await?;
        Ok(client)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_error_codes(mut self, error_codes: ErrorCodes) -> Self {
        self.error_codes = error_codes;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.credentials.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Current session token; empty until the first successful login.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn set_token(&mut self, token: String) {
        self.token = token;
    }

    /// The alias registry, `None` until devices have been enumerated.
    pub fn devices(&self) -> Option<&DeviceRegistry> {
        self.registry.as_ref()
    }

    /// Authenticate, then enumerate devices.
    pub async fn initialize(&mut self) -> Result<()> {
        self.authenticate().await?;
        self.setup_devices().await
    }

    /// POST a request once and classify the reply.
    ///
    /// Every non-zero code except token expiry is turned into its error
    /// here; token expiry is handed back so the caller decides on a retry.
    pub(crate) async fn post_once(
        &self,
        request: &ServiceRequest,
        authenticated: bool,
    ) -> Result<Reply> {
        let mut builder = self
            .http
            .post(&self.credentials.base_url)
            .timeout(self.timeout)
            .json(request);
        if authenticated {
            builder = builder.query(&[("token", self.token.as_str())]);
        }

        self.logger.debug(&format!(
            "POST {} method={}",
            self.credentials.base_url,
            request.method()
        ));

        let response = builder.send().await.map_err(|e| self.not_connected(e))?;
        let text = response.text().await.map_err(|e| self.not_connected(e))?;

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) => {
                self.logger
                    .error(&format!("Response to {} is not JSON: {}", request.method(), e));
                return Err(Error::UnexpectedResponse(text));
            }
        };
        let envelope: Envelope = decode(&body)?;

        if envelope.error_code == 0 {
            return Ok(Reply::Success(body));
        }
        if envelope.error_code == self.error_codes.token_expired {
            return Ok(Reply::TokenExpired);
        }

        let msg = envelope.message();
        self.logger.error(&format!(
            "TPLink error: code {}, msg: {}",
            envelope.error_code,
            msg.as_deref().unwrap_or("")
        ));
        Err(map_error_code(&self.error_codes, envelope.error_code, msg))
    }

    /// Send a token-qualified request, re-authenticating at most `retries`
    /// times when the service reports an expired token.
    pub(crate) async fn request(&mut self, request: &ServiceRequest, retries: u32) -> Result<Value> {
        let mut remaining = retries;
        loop {
            match self.post_once(request, true).await? {
                Reply::Success(body) => return Ok(body),
                Reply::TokenExpired if remaining > 0 => {
                    self.logger.warning("Token expired, getting new token");
                    remaining -= 1;
                    self.authenticate().await?;
                }
                Reply::TokenExpired => {
                    self.logger.warning("Token expired, out of retries");
                    return Err(Error::Token);
                }
            }
        }
    }

    fn not_connected(&self, err: reqwest::Error) -> Error {
        self.logger.error(&format!(
            "Connection error: {}",
            self.credentials.base_url
        ));
        Error::NotConnected(err.without_url().to_string())
    }

    /// Fetch the raw device list of the account without touching the
    /// registry.
    pub async fn device_list(&mut self) -> Result<Vec<Value>> {
        let body = self
            .request(&ServiceRequest::device_list(), DEFAULT_RETRIES)
            .await?;
        let response: DeviceListResponse = decode(&body)?;
        Ok(response.result.device_list)
    }

    /// Rebuild the alias registry from the account's device list.
    ///
    /// The new registry replaces the old one only when every entry decodes;
    /// on failure the previous registry is left as it was.
    pub async fn setup_devices(&mut self) -> Result<()> {
        let entries = self.device_list().await?;

        let decoded = entries
            .into_iter()
            .map(|raw| {
                serde_json::from_value::<DeviceEntry>(raw.clone()).map_err(|_| {
                    self.logger
                        .error(&format!("Failed to add the device: {}", raw));
                    Error::internal(format!("Failed to add the device: {}", raw))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let registry = DeviceRegistry::from_entries(decoded);
        self.logger
            .debug(&format!("Registered {} devices", registry.len()));
        self.registry = Some(registry);
        Ok(())
    }

    /// Resolve an alias through the registry.
    pub fn device(&self, alias: &str) -> Result<&DeviceRecord> {
        self.registry
            .as_ref()
            .ok_or_else(|| Error::internal("Device list is not initialized"))?
            .get(alias)
    }

    /// Alias of the only registered device, if there is exactly one.
    pub fn default_alias(&self) -> Option<&str> {
        let registry = self.registry.as_ref()?;
        if registry.len() == 1 {
            registry.aliases().next()
        } else {
            None
        }
    }

    /// Query the device's `get_sysinfo` payload.
    pub async fn get_sysinfo(&mut self, alias: &str) -> Result<SysInfo> {
        let device_id = self.device(alias)?.device_id.clone();
        let request = ServiceRequest::passthrough(&device_id, &SystemCommand::get_sysinfo())?;

        let body = self.request(&request, DEFAULT_RETRIES).await?;
        let response: PassthroughResponse = decode(&body)?;
        let reply: SysInfoReply = serde_json::from_str(&response.result.response_data)
            .map_err(|_| Error::UnexpectedResponse(body.to_string()))?;

        Ok(reply.system.get_sysinfo)
    }

    /// Whether the relay of the device is on.
    pub async fn get_state(&mut self, alias: &str) -> Result<bool> {
        let sysinfo = self.get_sysinfo(alias).await?;
        self.logger
            .debug(&format!("{} relay_state={}", alias, sysinfo.relay_state));
        Ok(sysinfo.is_on())
    }

    /// Switch the relay of the device. `Ok(true)` means the service
    /// accepted the command.
    pub async fn set_state(&mut self, alias: &str, turn_on: bool) -> Result<bool> {
        let device_id = self.device(alias)?.device_id.clone();
        self.logger
            .debug(&format!("Setting plug state: {}", u8::from(turn_on)));
        let request =
            ServiceRequest::passthrough(&device_id, &SystemCommand::set_relay_state(turn_on))?;

        let body = self.request(&request, DEFAULT_RETRIES).await?;
        command_accepted(&body)
    }

    /// Invert the relay state; returns the new state.
    pub async fn toggle(&mut self, alias: &str) -> Result<bool> {
        let target = !self.get_state(alias).await?;
        self.set_state(alias, target).await?;
        Ok(target)
    }
}

/// A successful reply must carry `error_code == 0`; anything else here
/// means the body slipped past the wrapper malformed.
pub(crate) fn command_accepted(body: &Value) -> Result<bool> {
    let envelope: Envelope = decode(body)?;
    if envelope.error_code == 0 {
        Ok(true)
    } else {
        Err(Error::UnexpectedResponse(body.to_string()))
    }
}

/// Translate a non-zero, non-expiry service code into its error.
pub(crate) fn map_error_code(codes: &ErrorCodes, code: i64, msg: Option<String>) -> Error {
    if code == codes.device_offline {
        Error::DeviceNotConnected
    } else if code == codes.bad_credentials {
        Error::Login
    } else if code == codes.invalid_request {
        Error::InvalidRequest(msg)
    } else if code == codes.wrong_parameter_type {
        Error::InvalidRequest(Some("One or more parameter has wrong type".to_string()))
    } else {
        Error::Internal {
            code: Some(code),
            message: msg.unwrap_or_default(),
        }
    }
}

/// Decode a reply body into a response schema. A shape mismatch means the
/// service answered with something we cannot use.
pub(crate) fn decode<T: DeserializeOwned>(body: &Value) -> Result<T> {
    T::deserialize(body).map_err(|_| Error::UnexpectedResponse(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = KasaClient::new(Credentials::new("me@example.com", "hunter2"));
        assert_eq!(client.base_url(), "https://wap.tplinkcloud.com");
        assert_eq!(client.token(), "");
        assert!(client.devices().is_none());
        assert!(client.default_alias().is_none());
    }

    #[test]
    fn test_device_lookup_before_enumeration() {
        let client = KasaClient::new(Credentials::new("me@example.com", "hunter2"));
        let err = client.device("Sudoplug").unwrap_err();
        assert!(matches!(err, Error::Internal { code: None, .. }));
    }

    #[test]
    fn test_error_code_mapping() {
        let codes = ErrorCodes::default();
        assert!(matches!(
            map_error_code(&codes, -20571, None),
            Error::DeviceNotConnected
        ));
        assert!(matches!(map_error_code(&codes, -20601, None), Error::Login));
        assert!(matches!(
            map_error_code(&codes, -20104, None),
            Error::InvalidRequest(None)
        ));
        assert!(matches!(
            map_error_code(&codes, -20105, None),
            Error::InvalidRequest(Some(_))
        ));
        match map_error_code(&codes, -99999, Some("mystery".to_string())) {
            Error::Internal { code, message } => {
                assert_eq!(code, Some(-99999));
                assert_eq!(message, "mystery");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_code_mapping_follows_overrides() {
        let codes = ErrorCodes {
            device_offline: -1,
            ..ErrorCodes::default()
        };
        assert!(matches!(map_error_code(&codes, -1, None), Error::DeviceNotConnected));
        assert!(matches!(
            map_error_code(&codes, -20571, None),
            Error::Internal { .. }
        ));
    }

    #[test]
    fn test_command_accepted() {
        assert!(command_accepted(&json!({"error_code": 0, "result": {}})).unwrap());

        let err = command_accepted(&json!({"error_code": -3})).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(raw) if raw.contains("-3")));

        let err = command_accepted(&json!({"result": {}})).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
    }

    #[test]
    fn test_timeout_from_config() {
        let config = Config::parse(
            r#"{"TPLinkSmartPlug": {"login": "a", "password": "b", "url": "https://x", "timeout_secs": 2}}"#,
            false,
        )
        .unwrap();
        let client = KasaClient::from_config(&config);
        assert_eq!(client.timeout(), Duration::from_secs(2));
        assert_eq!(client.base_url(), "https://x");

        let client = KasaClient::new(Credentials::new("a", "b"));
        assert_eq!(client.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_decode_missing_field_is_unexpected_response() {
        let body = json!({"error_code": 0, "result": {}});
        let err = decode::<PassthroughResponse>(&body).unwrap_err();
        match err {
            Error::UnexpectedResponse(raw) => assert!(raw.contains("error_code")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
