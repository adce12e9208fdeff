//! AWS API surfaces consumed by the adapters.
//!
//! The traits mirror the SDK verbs the adapters use, one method per verb.
//! The embedding process binds them to a real SDK through
//! [`AwsClientFactory`]; tests bind them to in-memory fakes.

pub mod rds;
pub mod s3;

use std::sync::Arc;

use xpa_runtime::ExternalError;

pub use rds::RdsApi;
pub use s3::S3Api;

/// Error returned by an AWS service, reduced to its error code and message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.code == code
    }

    pub fn is_any(&self, codes: &[&str]) -> bool {
        codes.iter().any(|c| self.is_code(c))
    }
}

/// Some older service endpoints report a missing resource only in the
/// message text.
pub fn message_says_not_found(err: &ApiError) -> bool {
    err.message.to_ascii_lowercase().contains("not found")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Strip one pair of matching surrounding quotes.
fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value)
}

impl Credentials {
    /// Read `profile` from an AWS shared credentials file.
    pub fn from_ini(data: &str, profile: &str) -> Result<Self, ExternalError> {
        let mut in_profile = false;
        let mut access_key_id = None;
        let mut secret_access_key = None;
        let mut session_token = None;

        for line in data.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) =
                line.strip_prefix('[').and_then(|l| l.strip_suffix(']'))
            {
                // The config-file form names sections `profile <name>`.
                let section = section.trim();
                let name = section
                    .strip_prefix("profile ")
                    .map(str::trim)
                    .unwrap_or(section);
                in_profile = name == profile;
                continue;
            }
            if !in_profile {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = unquote(value.trim()).to_string();
            match key.trim() {
                "aws_access_key_id" => access_key_id = Some(value),
                "aws_secret_access_key" => secret_access_key = Some(value),
                "aws_session_token" => session_token = Some(value),
                _ => {}
            }
        }

        match (access_key_id, secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Self {
                access_key_id,
                secret_access_key,
                session_token,
            }),
            _ => Err(ExternalError::Invalid(format!(
                "credentials profile {profile} lacks an access key pair"
            ))),
        }
    }
}

/// Everything needed to build a service client for one call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    pub region: String,
    /// `None` means ambient credentials of the process.
    pub credentials: Option<Credentials>,
    pub endpoint: Option<String>,
}

pub trait AwsClientFactory: Send + Sync {
    fn rds(&self, config: &AwsConfig) -> Arc<dyn RdsApi>;
    fn s3(&self, config: &AwsConfig) -> Arc<dyn S3Api>;
}
