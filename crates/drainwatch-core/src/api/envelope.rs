//! Response envelope of the campaign API.
//!
//! Every endpoint answers `{ "success": bool, "data": T, "message": ..., "errorCode": ... }`.
//! A 2xx with `success: false` is still an error.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::SubmitReceipt;
use crate::clock::UnixMillis;
use crate::error::SourceError;
use crate::job::Snapshot;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    #[serde(default)]
    success: Option<bool>,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

/// Realtime status payload of a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatus {
    pub current_stock: u64,
    #[serde(default)]
    pub total_stock: Option<u64>,
    #[serde(default)]
    pub success_count: Option<u64>,
    #[serde(default)]
    pub fail_count: Option<u64>,
}

fn is_success_status(code: u32) -> bool {
    (200..300).contains(&code)
}

/// Best-effort error message from an error body (which may not be JSON at all).
fn error_from_body(code: u32, body: &[u8]) -> SourceError {
    match serde_json::from_slice::<Envelope<serde_json::Value>>(body) {
        Ok(env) => SourceError::Api {
            status: code,
            code: env.error_code,
            message: env.message.unwrap_or_else(|| format!("HTTP {code}")),
        },
        Err(_) => SourceError::Api {
            status: code,
            code: None,
            message: String::from_utf8_lossy(body).trim().chars().take(200).collect(),
        },
    }
}

fn decode<T: DeserializeOwned>(code: u32, body: &[u8]) -> Result<Envelope<T>, SourceError> {
    if !is_success_status(code) {
        return Err(error_from_body(code, body));
    }
    let env: Envelope<T> = serde_json::from_slice(body)?;
    if env.success == Some(false) {
        return Err(SourceError::Api {
            status: code,
            code: env.error_code,
            message: env.message.unwrap_or_else(|| "request failed".to_string()),
        });
    }
    Ok(env)
}

/// Turn a status response into a snapshot stamped at `observed_at`.
pub fn parse_status_response(
    code: u32,
    body: &[u8],
    observed_at: UnixMillis,
) -> Result<Snapshot, SourceError> {
    let env = decode::<CampaignStatus>(code, body)?;
    let status = env
        .data
        .ok_or_else(|| SourceError::Malformed("status response without data".to_string()))?;
    Ok(Snapshot {
        remaining: status.current_stock,
        succeeded: status.success_count,
        failed: status.fail_count,
        observed_at,
    })
}

/// Interpret a submit response. 4xx and `success: false` mean the server
/// refused the job; 5xx and undecodable bodies are errors.
pub fn parse_submit_response(code: u32, body: &[u8]) -> Result<SubmitReceipt, SourceError> {
    match decode::<serde_json::Value>(code, body) {
        Ok(env) => {
            let message = match env.data {
                Some(serde_json::Value::String(s)) => s,
                _ => env.message.unwrap_or_else(|| "accepted".to_string()),
            };
            Ok(SubmitReceipt {
                accepted: true,
                message,
            })
        }
        Err(SourceError::Api { status, message, .. }) if status < 500 => Ok(SubmitReceipt {
            accepted: false,
            message,
        }),
        Err(e) => Err(e),
    }
}
