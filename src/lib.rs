//! svc-base - サービス起動用の設定ローダーとプロセスロガー

pub mod config;
pub mod error;
pub mod logging;
pub mod rotation;
pub mod severity;

pub use error::{ConfigError, DecodeError, LoggerError};
pub use logging::{Logger, LoggerConfig, LoggerSlot, ReleaseGuard};
pub use rotation::RotationPolicy;
pub use severity::Severity;
