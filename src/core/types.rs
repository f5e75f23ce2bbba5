// src/core/types.rs — Core domain types

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Generated fragment-stage source under evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(pub String);

impl Artifact {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn source(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// SHA-256 of the source, hex-encoded.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl From<&str> for Artifact {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// 0.0..=1.0, 1.0 = identical to the reference.
    pub similarity: f32,
    pub frames_per_second: f32,
}

impl Metrics {
    pub fn zeroed() -> Self {
        Self::default()
    }
}

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// A captured, size-capped frame of a running artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub iteration_index: u32,
    /// Shader time the frame was rendered at.
    pub time: f32,
    pub width: u32,
    pub height: u32,
    /// Encoded PNG. Kept in memory only; history stores `storage_ref`.
    #[serde(skip)]
    pub png: Vec<u8>,
    pub byte_len: u64,
    /// Path or URL once persisted.
    pub storage_ref: Option<String>,
}

impl Evidence {
    pub fn new(time: f32, width: u32, height: u32, png: Vec<u8>) -> Self {
        Self {
            iteration_index: 0,
            time,
            width,
            height,
            byte_len: png.len() as u64,
            png,
            storage_ref: None,
        }
    }

    pub fn data_url(&self) -> String {
        format!("{DATA_URL_PREFIX}{}", BASE64.encode(&self.png))
    }

    /// Length of `data_url()` as sent on the wire, computed from `byte_len`
    /// so it also holds for evidence loaded back from history.
    pub fn encoded_len(&self) -> u64 {
        let body = usize::try_from(self.byte_len)
            .ok()
            .and_then(|n| base64::encoded_len(n, true))
            .map_or(u64::MAX, |n| n as u64);
        body.saturating_add(DATA_URL_PREFIX.len() as u64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationVerdict {
    pub compiled: bool,
    pub linked: bool,
    pub diagnostic_log: String,
    pub metrics: Metrics,
    pub has_anomaly: bool,
    pub evidence: Vec<Evidence>,
}

impl EvaluationVerdict {
    /// Rejected by the compiler: nothing ran, so no metrics and no evidence.
    pub fn compile_failure(log: impl Into<String>) -> Self {
        Self {
            compiled: false,
            linked: false,
            diagnostic_log: log.into(),
            metrics: Metrics::zeroed(),
            has_anomaly: false,
            evidence: Vec::new(),
        }
    }

    /// Stages compiled but the program would not link.
    pub fn link_failure(log: impl Into<String>) -> Self {
        Self {
            compiled: true,
            linked: false,
            diagnostic_log: log.into(),
            metrics: Metrics::zeroed(),
            has_anomaly: false,
            evidence: Vec::new(),
        }
    }

    /// Whether the program ran at all.
    pub fn ran(&self) -> bool {
        self.compiled && self.linked
    }

    /// Pass/fail gate. With `strict_anomaly` an anomalous render fails;
    /// without it the anomaly is advisory.
    pub fn passes(&self, strict_anomaly: bool) -> bool {
        self.ran() && !(strict_anomaly && self.has_anomaly)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        if !self.compiled {
            Some(FailureKind::CompileError)
        } else if !self.linked {
            Some(FailureKind::LinkError)
        } else if self.has_anomaly {
            Some(FailureKind::RuntimeAnomaly)
        } else {
            None
        }
    }

    /// Compact `{compiled, hasAnomaly, metrics}` summary fed back to the model.
    pub fn summary_json(&self) -> String {
        serde_json::json!({
            "compiled": self.compiled,
            "hasAnomaly": self.has_anomaly,
            "metrics": self.metrics,
        })
        .to_string()
    }

    /// Stamp every evidence item with the iteration it belongs to.
    pub fn tag_evidence(&mut self, index: u32) {
        for item in &mut self.evidence {
            item.iteration_index = index;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Initial,
    ManualIteration,
    AutoIterationIntermediate,
    AutoIterationFinal,
}

impl RecordKind {
    /// Surfaced in user-facing history. Intermediate retries are noise.
    pub fn is_significant(&self) -> bool {
        !matches!(self, RecordKind::AutoIterationIntermediate)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Initial => write!(f, "initial"),
            RecordKind::ManualIteration => write!(f, "manual"),
            RecordKind::AutoIterationIntermediate => write!(f, "auto"),
            RecordKind::AutoIterationFinal => write!(f, "auto-final"),
        }
    }
}

/// Why a step did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    CompileError,
    LinkError,
    RuntimeAnomaly,
    MalformedResponse,
    TransportFailure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::CompileError => write!(f, "compile error"),
            FailureKind::LinkError => write!(f, "link error"),
            FailureKind::RuntimeAnomaly => write!(f, "runtime anomaly"),
            FailureKind::MalformedResponse => write!(f, "malformed response"),
            FailureKind::TransportFailure => write!(f, "transport failure"),
        }
    }
}

/// One completed step. Immutable once appended to the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub index: u32,
    pub prompt: String,
    pub artifact: Artifact,
    pub verdict: EvaluationVerdict,
    /// Model commentary preceding the artifact.
    pub reflection: String,
    pub kind: RecordKind,
    pub model: String,
    /// Whether the step cleared the gate it was judged by.
    pub passed: bool,
    pub failure: Option<FailureKind>,
    pub created_at: DateTime<Utc>,
}

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Idle,
    Generating,
    Evaluating,
    Iterating,
    Success,
    Exhausted,
    FatalError,
    Abandoned,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopState::Success | LoopState::Exhausted | LoopState::FatalError | LoopState::Abandoned
        )
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoopState::Idle => "idle",
            LoopState::Generating => "generating",
            LoopState::Evaluating => "evaluating",
            LoopState::Iterating => "iterating",
            LoopState::Success => "success",
            LoopState::Exhausted => "exhausted",
            LoopState::FatalError => "fatal-error",
            LoopState::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// Progress events emitted by the controller for UIs and monitors.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    StateChanged {
        from: LoopState,
        to: LoopState,
    },
    RequestBuilt {
        index: u32,
        model: String,
        images: usize,
    },
    RecordAppended {
        index: u32,
        kind: RecordKind,
        failure: Option<FailureKind>,
    },
    Finished {
        state: LoopState,
        attempts: u32,
    },
}

/// What an entry point returns once the controller stops.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub state: LoopState,
    /// Generation attempts made by this call.
    pub attempts: u32,
    pub last_index: Option<u32>,
    pub status: String,
}

impl IterationOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == LoopState::Success
    }
}

/// Configuration for the iteration engine.
#[derive(Debug, Clone)]
pub struct IterationEngineConfig {
    pub max_auto_iterations: u32,
    pub auto_after_manual: bool,
}

impl Default for IterationEngineConfig {
    fn default() -> Self {
        Self {
            max_auto_iterations: 3,
            auto_after_manual: true,
        }
    }
}

impl From<&crate::infra::config::IterationConfig> for IterationEngineConfig {
    fn from(cfg: &crate::infra::config::IterationConfig) -> Self {
        Self {
            max_auto_iterations: cfg.max_auto_iterations,
            auto_after_manual: cfg.auto_after_manual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── Artifact ───────────────────────────────────────────────

    #[test]
    fn test_artifact_blank() {
        assert!(Artifact::new("  \n\t").is_blank());
        assert!(!Artifact::new("void main() {}").is_blank());
    }

    #[test]
    fn test_artifact_digest_stable() {
        let a = Artifact::new("void main() {}");
        let b = Artifact::new("void main() {}");
        let c = Artifact::new("void main() { }");
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }

    // ─── Evidence ───────────────────────────────────────────────

    #[test]
    fn test_encoded_len_matches_data_url() {
        for n in [0usize, 1, 2, 3, 100, 4097] {
            let e = Evidence::new(0.0, 4, 4, vec![7u8; n]);
            assert_eq!(e.encoded_len(), e.data_url().len() as u64);
        }
        let big = Evidence::new(0.0, 4, 4, vec![0u8; 3000]);
        assert!(big.encoded_len() > big.byte_len);
    }

    // ─── EvaluationVerdict ──────────────────────────────────────

    #[test]
    fn test_compile_failure_zeroes_metrics_and_evidence() {
        let v = EvaluationVerdict::compile_failure("FRAGMENT: syntax error");
        assert!(!v.compiled);
        assert!(!v.linked);
        assert_eq!(v.metrics, Metrics::zeroed());
        assert!(v.evidence.is_empty());
        assert_eq!(v.failure_kind(), Some(FailureKind::CompileError));
    }

    #[test]
    fn test_link_failure() {
        let v = EvaluationVerdict::link_failure("LINK: varying mismatch");
        assert!(v.compiled);
        assert!(!v.linked);
        assert!(!v.ran());
        assert_eq!(v.failure_kind(), Some(FailureKind::LinkError));
    }

    #[test]
    fn test_anomaly_gate_strict_vs_advisory() {
        let v = EvaluationVerdict {
            compiled: true,
            linked: true,
            has_anomaly: true,
            ..Default::default()
        };
        assert!(!v.passes(true));
        assert!(v.passes(false));
        assert_eq!(v.failure_kind(), Some(FailureKind::RuntimeAnomaly));
    }

    #[test]
    fn test_summary_json_shape() {
        let v = EvaluationVerdict {
            compiled: true,
            linked: true,
            metrics: Metrics {
                similarity: 0.5,
                frames_per_second: 60.0,
            },
            ..Default::default()
        };
        let parsed: serde_json::Value = serde_json::from_str(&v.summary_json()).unwrap();
        assert_eq!(parsed["compiled"], true);
        assert_eq!(parsed["hasAnomaly"], false);
        assert_eq!(parsed["metrics"]["similarity"], 0.5);
        assert_eq!(parsed["metrics"]["framesPerSecond"], 60.0);
        assert!(parsed.get("diagnosticLog").is_none());
    }

    #[test]
    fn test_tag_evidence() {
        let mut v = EvaluationVerdict {
            compiled: true,
            linked: true,
            evidence: vec![
                Evidence::new(0.5, 2, 2, vec![1, 2, 3]),
                Evidence::new(1.5, 2, 2, vec![4]),
            ],
            ..Default::default()
        };
        v.tag_evidence(7);
        assert!(v.evidence.iter().all(|e| e.iteration_index == 7));
    }

    // ─── Evidence ───────────────────────────────────────────────

    #[test]
    fn test_evidence_data_url() {
        let e = Evidence::new(0.0, 1, 1, b"abc".to_vec());
        assert_eq!(e.byte_len, 3);
        assert_eq!(e.data_url(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_evidence_png_not_serialized() {
        let e = Evidence::new(0.0, 1, 1, vec![9; 16]);
        let json = serde_json::to_value(&e).unwrap();
        assert!(json.get("png").is_none());
        assert_eq!(json["byteLen"], 16);
    }

    // ─── RecordKind / LoopState ─────────────────────────────────

    #[test]
    fn test_significant_kinds() {
        assert!(RecordKind::Initial.is_significant());
        assert!(RecordKind::ManualIteration.is_significant());
        assert!(RecordKind::AutoIterationFinal.is_significant());
        assert!(!RecordKind::AutoIterationIntermediate.is_significant());
    }

    #[test]
    fn test_terminal_states() {
        assert!(LoopState::Success.is_terminal());
        assert!(LoopState::Exhausted.is_terminal());
        assert!(LoopState::FatalError.is_terminal());
        assert!(!LoopState::Iterating.is_terminal());
        assert!(!LoopState::Idle.is_terminal());
    }

    #[test]
    fn test_engine_config_from_iteration_config() {
        let cfg = crate::infra::config::IterationConfig {
            max_auto_iterations: 5,
            auto_after_manual: false,
        };
        let engine = IterationEngineConfig::from(&cfg);
        assert_eq!(engine.max_auto_iterations, 5);
        assert!(!engine.auto_after_manual);
    }
}
