mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod types;

pub use client::KasaClient;
pub use config::{Config, Credentials, ErrorCodes};
pub use error::{Error, Result};
pub use logging::{LogLogger, Logger};
pub use models::{DeviceRecord, DeviceRegistry};
pub use types::SysInfo;
