use serde::{Deserialize, Serialize};

pub const APP_TYPE: &str = "Kasa_Android";

/// Envelope posted to the cloud endpoint: `{"method": ..., "params": {...}}`.
#[derive(Debug, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum ServiceRequest {
    #[serde(rename = "login")]
    Login(LoginParams),
    #[serde(rename = "getDeviceList")]
    GetDeviceList(EmptyParams),
    #[serde(rename = "passthrough")]
    Passthrough(PassthroughParams),
}

impl ServiceRequest {
    pub fn method(&self) -> &'static str {
        match self {
            ServiceRequest::Login(_) => "login",
            ServiceRequest::GetDeviceList(_) => "getDeviceList",
            ServiceRequest::Passthrough(_) => "passthrough",
        }
    }

    pub fn login(username: &str, password: &str) -> Self {
        ServiceRequest::Login(LoginParams {
            app_type: APP_TYPE.to_string(),
            cloud_user_name: username.to_string(),
            cloud_password: password.to_string(),
            terminal_uuid: String::new(),
        })
    }

    pub fn device_list() -> Self {
        ServiceRequest::GetDeviceList(EmptyParams {})
    }

    pub fn passthrough(device_id: &str, command: &SystemCommand) -> serde_json::Result<Self> {
        Ok(ServiceRequest::Passthrough(PassthroughParams {
            device_id: device_id.to_string(),
            request_data: serde_json::to_string(command)?,
        }))
    }
}

#[derive(Debug, Serialize)]
pub struct LoginParams {
    #[serde(rename = "appType")]
    pub app_type: String,
    #[serde(rename = "cloudUserName")]
    pub cloud_user_name: String,
    #[serde(rename = "cloudPassword")]
    pub cloud_password: String,
    #[serde(rename = "terminalUUID")]
    pub terminal_uuid: String,
}

#[derive(Debug, Serialize)]
pub struct EmptyParams {}

#[derive(Debug, Serialize)]
pub struct PassthroughParams {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    /// JSON-encoded [`SystemCommand`].
    #[serde(rename = "requestData")]
    pub request_data: String,
}

/// Device-level command forwarded verbatim by the passthrough method.
#[derive(Debug, Serialize)]
pub struct SystemCommand {
    pub system: SystemQuery,
}

#[derive(Debug, Serialize)]
pub enum SystemQuery {
    #[serde(rename = "get_sysinfo")]
    GetSysinfo(()),
    #[serde(rename = "set_relay_state")]
    SetRelayState(RelayState),
}

#[derive(Debug, Serialize)]
pub struct RelayState {
    pub state: u8,
}

impl SystemCommand {
    pub fn get_sysinfo() -> Self {
        Self {
            system: SystemQuery::GetSysinfo(()),
        }
    }

    pub fn set_relay_state(turn_on: bool) -> Self {
        Self {
            system: SystemQuery::SetRelayState(RelayState {
                state: u8::from(turn_on),
            }),
        }
    }
}

/// Fields common to every reply. Anything else stays in the raw body.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub error_code: i64,
    /// Usually a string, but never relied upon.
    #[serde(default)]
    pub msg: Option<serde_json::Value>,
}

impl Envelope {
    pub fn message(&self) -> Option<String> {
        match &self.msg {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(msg)) => Some(msg.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub result: LoginResult,
}

#[derive(Debug, Deserialize)]
pub struct LoginResult {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct DeviceListResponse {
    pub result: DeviceListResult,
}

/// Entries are kept as raw values so a single malformed device can be
/// reported with its own content.
#[derive(Debug, Deserialize)]
pub struct DeviceListResult {
    #[serde(rename = "deviceList")]
    pub device_list: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    pub alias: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "appServerUrl")]
    pub app_server_url: String,
    #[serde(rename = "deviceModel")]
    pub device_model: String,
    #[serde(rename = "deviceName", default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PassthroughResponse {
    pub result: PassthroughResult,
}

#[derive(Debug, Deserialize)]
pub struct PassthroughResult {
    /// JSON-encoded device reply.
    #[serde(rename = "responseData")]
    pub response_data: String,
}

#[derive(Debug, Deserialize)]
pub struct SysInfoReply {
    pub system: SysInfoSystem,
}

#[derive(Debug, Deserialize)]
pub struct SysInfoSystem {
    pub get_sysinfo: SysInfo,
}

/// Payload of a device's `get_sysinfo` reply.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SysInfo {
    pub relay_state: u8,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub sw_ver: Option<String>,
    #[serde(default)]
    pub hw_ver: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    /// Seconds since the relay was last switched on.
    #[serde(default)]
    pub on_time: Option<u64>,
    #[serde(default)]
    pub rssi: Option<i64>,
}

impl SysInfo {
    pub fn is_on(&self) -> bool {
        self.relay_state == 1
    }
}
