//! Verdict reports
//!
//! This module encodes a [`Verdict`] into a self-describing JSON document for
//! the caller or an audit log. Raw frames never leave the process; the
//! representative frame is summarized by sequence and size only.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LivenessError;
use crate::types::{LayerResult, Verdict};
use crate::{PRODUCER_NAME, VERSION};

/// Report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Per-layer section of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerReport {
    pub passed: bool,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Frame handed on to embedding matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub sequence: u64,
    pub captured_at_utc: String,
    pub width: u32,
    pub height: u32,
}

/// Serializable verdict document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub session_id: String,
    pub challenge: String,
    pub started_at_utc: String,
    pub computed_at_utc: String,
    pub accepted: bool,
    pub total_score: u8,
    pub quorum: u8,
    pub summary: String,
    pub reasons: Vec<String>,
    pub layers: BTreeMap<String, LayerReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representative_frame: Option<FrameSummary>,
}

/// Encoder for verdict reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, verdict: &Verdict) -> VerdictReport {
        let layers = verdict
            .layer_results
            .iter()
            .map(|r| (r.layer.as_str().to_string(), layer_report(r)))
            .collect();

        let representative_frame = verdict.representative_frame.as_ref().map(|f| FrameSummary {
            sequence: f.sequence,
            captured_at_utc: f.captured_at.to_rfc3339(),
            width: f.width(),
            height: f.height(),
        });

        VerdictReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            session_id: verdict.session_id.to_string(),
            challenge: verdict.challenge.as_str().to_string(),
            started_at_utc: verdict.started_at.to_rfc3339(),
            computed_at_utc: Utc::now().to_rfc3339(),
            accepted: verdict.accepted,
            total_score: verdict.total_score,
            quorum: verdict.quorum,
            summary: verdict.summary(),
            reasons: verdict
                .reasons()
                .iter()
                .map(|r| r.message().to_string())
                .collect(),
            layers,
            representative_frame,
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, verdict: &Verdict) -> Result<String, LivenessError> {
        Ok(serde_json::to_string_pretty(&self.encode(verdict))?)
    }
}

fn layer_report(result: &LayerResult) -> LayerReport {
    LayerReport {
        passed: result.passed,
        score: result.score,
        error: result.failure.as_ref().map(|f| f.message().to_string()),
        details: result.details.clone(),
    }
}
