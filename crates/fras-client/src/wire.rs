//! JSON bodies exchanged with the attendance service.

use crate::error::ClientError;
use chrono::NaiveDateTime;
use fras_core::{Embedding, MatchResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct MatchRequest<'a> {
    pub embedding: &'a Embedding,
}

/// `POST /api/match` response. `distance` is the canonical field name.
#[derive(Debug, Deserialize)]
pub(crate) struct MatchResponse {
    pub matched: bool,
    #[serde(default)]
    pub student_id: Option<String>,
    pub distance: f32,
}

impl MatchResponse {
    pub fn into_result(self) -> Result<MatchResult, ClientError> {
        if !self.distance.is_finite() || self.distance < 0.0 {
            return Err(ClientError::Malformed(format!(
                "distance must be a non-negative number, got {}",
                self.distance
            )));
        }
        if self.matched && self.student_id.as_deref().map_or(true, str::is_empty) {
            return Err(ClientError::Malformed(
                "matched response without student_id".into(),
            ));
        }
        Ok(MatchResult {
            matched: self.matched,
            student_id: if self.matched { self.student_id } else { None },
            distance: Some(self.distance),
        })
    }
}

/// `POST /api/register` request.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub student_id: String,
    pub name: String,
    pub embedding: Embedding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// `POST /api/register` success body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterReply {
    pub ok: bool,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// One row of `GET /api/attendance/history`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: String,
    /// UTC, as recorded by the service.
    pub timestamp: NaiveDateTime,
    pub unit: String,
    #[serde(default)]
    pub txid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub records: Vec<AttendanceRecord>,
}

/// Pull a human-readable message out of an error body (`{"detail": ...}`).
pub(crate) fn error_detail(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => serde_json::Value::Object(map).to_string(),
        },
        _ => String::from_utf8_lossy(body).trim().to_string(),
    }
}
