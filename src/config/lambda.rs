#[cfg(feature = "lambda")]
use crate::config::MonitorConfig;
#[cfg(feature = "lambda")]
use crate::core::Storage;
#[cfg(feature = "lambda")]
use crate::utils::error::{MonitorError, Result};
#[cfg(feature = "lambda")]
use aws_sdk_s3::operation::get_object::GetObjectError;
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use std::env;

#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub monitor: MonitorConfig,
    pub s3_bucket: String,
    pub s3_region: String,
    pub state_key: String,
    /// Storage state kept in S3 instead of the local filesystem.
    pub session_key: Option<String>,
}

#[cfg(feature = "lambda")]
impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        let state_key =
            env::var("STATE_KEY").unwrap_or_else(|_| "price-monitor/state.json".to_string());

        let mut monitor = MonitorConfig::from_env()?;
        // Lambda 每次呼叫只跑一輪，狀態一律存 S3
        monitor.state_file = Some(state_key.clone());
        monitor.history_file = None;

        Ok(Self {
            monitor,
            s3_bucket: env::var("S3_BUCKET").map_err(|_| MonitorError::MissingConfigError {
                field: "S3_BUCKET".to_string(),
            })?,
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| "eu-west-3".to_string()),
            state_key,
            session_key: env::var("SESSION_KEY").ok().filter(|k| !k.is_empty()),
        })
    }
}

#[cfg(feature = "lambda")]
impl crate::utils::validation::Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        self.monitor.validate()?;
        validate_s3_bucket_name("s3_bucket", &self.s3_bucket)?;
        validate_aws_region("s3_region", &self.s3_region)?;
        validate_non_empty_string("state_key", &self.state_key)?;

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}

#[cfg(feature = "lambda")]
fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(MonitorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name must be between 3 and 63 characters".to_string(),
        });
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(MonitorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots"
                .to_string(),
        });
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(MonitorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name cannot start or end with a hyphen".to_string(),
        });
    }

    Ok(())
}

#[cfg(feature = "lambda")]
fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    crate::utils::validation::validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(MonitorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }

    Ok(())
}

#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

#[cfg(feature = "lambda")]
impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[cfg(feature = "lambda")]
impl Storage for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                return Err(match err.into_service_error() {
                    GetObjectError::NoSuchKey(_) => MonitorError::StateNotFound {
                        path: format!("s3://{}/{}", self.bucket, path),
                    },
                    other => MonitorError::StorageError {
                        message: format!("Failed to read s3://{}/{}: {}", self.bucket, path, other),
                    },
                });
            }
        };

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| MonitorError::StorageError {
                message: format!("Failed to collect S3 data: {}", e),
            })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type("application/json")
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| MonitorError::StorageError {
                message: format!(
                    "Failed to write s3://{}/{}: {}",
                    self.bucket,
                    path,
                    e.into_service_error()
                ),
            })?;
        Ok(())
    }
}
