//! Attendance webhook client and per-person cooldown tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("attendance request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("attendance API rejected the mark: {status}")]
    Rejected { status: reqwest::StatusCode },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceRequest<'a> {
    site_id: &'a str,
    personnel_id: &'a str,
    camera_id: &'a str,
    confidence: f32,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceResponse {
    pub success: bool,
    #[serde(default)]
    pub attendance: Option<AttendanceRecord>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRecord {
    pub id: Option<String>,
    pub timestamp: Option<String>,
}

/// Posts recognition matches to an external attendance endpoint.
pub struct AttendanceClient {
    http: reqwest::Client,
    url: String,
    site_id: String,
    camera_id: String,
}

impl AttendanceClient {
    pub fn new(url: String, site_id: String, camera_id: String) -> Result<Self, AttendanceError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            url,
            site_id,
            camera_id,
        })
    }

    /// POST a single attendance mark. Failures are surfaced, never retried.
    pub async fn mark(
        &self,
        personnel_id: &str,
        confidence: f32,
    ) -> Result<AttendanceResponse, AttendanceError> {
        let payload = AttendanceRequest {
            site_id: &self.site_id,
            personnel_id,
            camera_id: &self.camera_id,
            confidence,
            timestamp: Utc::now(),
        };

        tracing::info!(personnel_id, confidence, "marking attendance");

        let response = self.http.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(AttendanceError::Rejected {
                status: response.status(),
            });
        }

        let body: AttendanceResponse = response.json().await?;

        if body.success {
            if let Some(record) = &body.attendance {
                tracing::info!(id = ?record.id, timestamp = ?record.timestamp, "attendance marked");
            }
        } else {
            tracing::warn!(message = ?body.message, "attendance API returned success=false");
        }

        Ok(body)
    }
}

/// Suppresses duplicate marks for the same person inside a fixed window.
///
/// Held in process memory only; the history is lost on restart.
pub struct CooldownTracker {
    window: Duration,
    last_marked: HashMap<String, Instant>,
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_marked: HashMap::new(),
        }
    }

    /// Whether enough time has passed to mark this person again.
    pub fn should_mark(&self, person: &str) -> bool {
        self.should_mark_at(person, Instant::now())
    }

    /// Record a successful mark for this person.
    pub fn mark(&mut self, person: &str) {
        self.mark_at(person, Instant::now());
    }

    fn should_mark_at(&self, person: &str, now: Instant) -> bool {
        match self.last_marked.get(person) {
            Some(last) => now.duration_since(*last) >= self.window,
            None => true,
        }
    }

    fn mark_at(&mut self, person: &str, now: Instant) {
        self.last_marked.insert(person.to_string(), now);
    }
}
