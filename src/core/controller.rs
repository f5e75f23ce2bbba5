// src/core/controller.rs — Iteration controller
//
// Drives generate → evaluate → refine for one session at a time:
//
//   Idle → Generating → Evaluating → Success
//                                  → Iterating → Generating ...
//                                  → Exhausted
//        Generating → FatalError   (transport failure on the initiating call)
//        any        → FatalError   (history write failed)
//        any        → Abandoned    (session discarded mid-flight)
//
// One `IterationRecord` is appended per completed step. Transport failures on
// the initiating call record nothing; during automatic retries they are
// recorded as failed attempts and cost one unit of budget.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use super::eval_cache::EvalCache;
use super::request::{CallKind, RequestBuilder};
use super::session::Session;
use super::types::*;
use crate::evaluator::similarity::ReferenceScenes;
use crate::evaluator::{ArtifactEvaluator, EvaluatorConfig};
use crate::history::{EvidenceDir, HistoryLog};
use crate::infra::config::Config;
use crate::infra::errors::LoopError;
use crate::infra::paths;
use crate::parser::parse_response;
use crate::provider::ModelProvider;
use crate::render::RenderBackend;

/// One generation attempt, ready to be recorded.
struct Attempt {
    artifact: Artifact,
    verdict: EvaluationVerdict,
    reflection: String,
    model: String,
    passed: bool,
    failure: Option<FailureKind>,
}

enum StepResult {
    Completed(Attempt),
    /// The backend call itself failed; nothing was recorded.
    Transport { model: String, error: LoopError },
    Abandoned,
}

pub struct Controller {
    provider: Arc<dyn ModelProvider>,
    evaluator: ArtifactEvaluator,
    history: Arc<dyn HistoryLog>,
    requests: RequestBuilder,
    eval_cache: EvalCache,
    config: IterationEngineConfig,
    evidence_dir: Option<EvidenceDir>,
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send>>,
}

impl Controller {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        evaluator: ArtifactEvaluator,
        history: Arc<dyn HistoryLog>,
        requests: RequestBuilder,
        config: IterationEngineConfig,
    ) -> Self {
        Self {
            provider,
            evaluator,
            history,
            requests,
            eval_cache: EvalCache::new(),
            config,
            evidence_dir: None,
            on_progress: None,
        }
    }

    /// Wire everything from `cfg`: evaluator knobs, reference scenes, request
    /// policy, iteration budget, and evidence persistence when enabled.
    pub fn from_config(
        provider: Arc<dyn ModelProvider>,
        backend: Box<dyn RenderBackend>,
        history: Arc<dyn HistoryLog>,
        cfg: &Config,
    ) -> Self {
        let scenes_dir = cfg
            .evaluation
            .reference_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(paths::references_dir);
        let evaluator = ArtifactEvaluator::new(backend, EvaluatorConfig::from_config(cfg))
            .with_scenes(ReferenceScenes::from_dir(scenes_dir));

        let controller = Self::new(
            provider,
            evaluator,
            history,
            RequestBuilder::from_config(cfg),
            IterationEngineConfig::from(&cfg.iteration),
        );
        if cfg.evidence.persist {
            controller.with_evidence_dir(EvidenceDir::new(paths::evidence_dir()))
        } else {
            controller
        }
    }

    /// Set a callback for real-time progress events.
    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    /// Persist screenshots to `dir` and record their paths.
    pub fn with_evidence_dir(mut self, dir: EvidenceDir) -> Self {
        self.evidence_dir = Some(dir);
        self
    }

    pub fn history(&self) -> &Arc<dyn HistoryLog> {
        &self.history
    }

    pub fn eval_cache(&self) -> &EvalCache {
        &self.eval_cache
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    fn transition(&self, session: &mut Session, to: LoopState) {
        let from = session.set_state(to);
        if from != to {
            tracing::debug!(session = session.id(), %from, %to, "state change");
            self.emit(ProgressEvent::StateChanged { from, to });
        }
    }

    // ─── entry points ───────────────────────────────────────────

    /// Start a session: reset it, generate index 0, and retry automatically
    /// on failure. The anomaly check is a hard gate throughout.
    pub async fn submit_prompt(
        &mut self,
        session: &mut Session,
        prompt: &str,
    ) -> Result<IterationOutcome, LoopError> {
        if session.is_abandoned() {
            return Ok(self.finish(session, LoopState::Abandoned, 0, None, "session abandoned"));
        }
        if prompt.trim().is_empty() {
            return Err(LoopError::InvalidState("prompt is empty".into()));
        }

        session.reset(prompt);
        if let Err(e) = self.history.clear() {
            return Err(self.history_failed(session, 0, e));
        }
        self.eval_cache.clear();
        tracing::info!(session = session.id(), "new prompt");

        let attempts = 1;
        match self.generate(session, CallKind::Initial, None, true).await {
            StepResult::Abandoned => {
                Ok(self.finish(session, LoopState::Abandoned, attempts, None, "session abandoned"))
            }
            StepResult::Transport { error, .. } => Ok(self.fatal(session, attempts, error)),
            StepResult::Completed(attempt) => {
                let passed = attempt.passed;
                let index = self
                    .record(session, attempt, RecordKind::Initial)
                    .map_err(|e| self.history_failed(session, attempts, e))?;
                if passed {
                    Ok(self.succeed(session, attempts, index))
                } else {
                    self.auto_iterate(session, None, attempts, index).await
                }
            }
        }
    }

    /// Human-initiated iteration. The anomaly check is advisory for this
    /// step; automatic follow-ups (when enabled) gate on it.
    pub async fn submit_feedback(
        &mut self,
        session: &mut Session,
        feedback: Option<&str>,
    ) -> Result<IterationOutcome, LoopError> {
        if session.is_abandoned() {
            return Ok(self.finish(session, LoopState::Abandoned, 0, None, "session abandoned"));
        }
        if !session.has_prompt() {
            return Err(LoopError::InvalidState(
                "no prompt has been submitted for this session".into(),
            ));
        }

        let attempts = 1;
        match self.generate(session, CallKind::Manual, feedback, false).await {
            StepResult::Abandoned => {
                Ok(self.finish(session, LoopState::Abandoned, attempts, None, "session abandoned"))
            }
            StepResult::Transport { error, .. } => Ok(self.fatal(session, attempts, error)),
            StepResult::Completed(attempt) => {
                let passed = attempt.passed;
                let index = self
                    .record(session, attempt, RecordKind::ManualIteration)
                    .map_err(|e| self.history_failed(session, attempts, e))?;
                if passed {
                    Ok(self.succeed(session, attempts, index))
                } else if self.config.auto_after_manual {
                    self.auto_iterate(session, feedback, attempts, index).await
                } else {
                    Ok(self.exhaust(session, attempts, index))
                }
            }
        }
    }

    /// Evaluate a user-edited artifact into the working copy. No generation
    /// step and no history record.
    pub fn manual_compile(
        &mut self,
        session: &mut Session,
        source: &str,
    ) -> Result<IterationOutcome, LoopError> {
        if session.is_abandoned() {
            return Ok(self.finish(session, LoopState::Abandoned, 0, None, "session abandoned"));
        }

        self.transition(session, LoopState::Evaluating);
        let artifact = Artifact::new(source);
        let verdict = self.evaluate_cached(&artifact);
        let passes = verdict.passes(false);
        let log = verdict.diagnostic_log.clone();
        let status = match verdict.failure_kind() {
            None => "compiled".to_string(),
            Some(FailureKind::RuntimeAnomaly) => "compiled (rendered nothing visible)".to_string(),
            Some(kind) => format!("manual compile failed: {kind}"),
        };
        session.set_working(artifact, verdict);
        session.set_last_diagnostic(log);

        let state = if passes {
            LoopState::Success
        } else {
            LoopState::Idle
        };
        Ok(self.finish(session, state, 0, None, status))
    }

    // ─── loop internals ─────────────────────────────────────────

    /// Automatic retries after a failed step, up to `max_auto_iterations`.
    async fn auto_iterate(
        &mut self,
        session: &mut Session,
        feedback: Option<&str>,
        mut attempts: u32,
        mut last_index: u32,
    ) -> Result<IterationOutcome, LoopError> {
        let budget = self.config.max_auto_iterations;

        for attempt in 1..=budget {
            let is_last = attempt == budget;
            self.transition(session, LoopState::Iterating);
            attempts += 1;

            let step = self.generate(session, CallKind::AutoRetry, feedback, true).await;
            let completed = match step {
                StepResult::Abandoned => {
                    return Ok(self.finish(
                        session,
                        LoopState::Abandoned,
                        attempts,
                        Some(last_index),
                        "session abandoned",
                    ));
                }
                StepResult::Transport { model, error } => {
                    tracing::warn!(
                        session = session.id(),
                        attempt,
                        budget,
                        "generation failed during retry: {}",
                        error
                    );
                    Attempt {
                        artifact: Artifact::default(),
                        verdict: EvaluationVerdict::compile_failure(format!(
                            "transport failure: {error}"
                        )),
                        reflection: String::new(),
                        model,
                        passed: false,
                        failure: Some(FailureKind::TransportFailure),
                    }
                }
                StepResult::Completed(a) => a,
            };

            let passed = completed.passed;
            let kind = if passed || is_last {
                RecordKind::AutoIterationFinal
            } else {
                RecordKind::AutoIterationIntermediate
            };
            last_index = self
                .record(session, completed, kind)
                .map_err(|e| self.history_failed(session, attempts, e))?;

            if passed {
                return Ok(self.succeed(session, attempts, last_index));
            }
        }

        Ok(self.exhaust(session, attempts, last_index))
    }

    /// One generation call plus evaluation of its result.
    async fn generate(
        &mut self,
        session: &mut Session,
        kind: CallKind,
        feedback: Option<&str>,
        strict_anomaly: bool,
    ) -> StepResult {
        self.transition(session, LoopState::Generating);
        let request = self.requests.build(session, kind, feedback);
        if kind == CallKind::Manual {
            session.note_manual_iteration();
        }
        self.emit(ProgressEvent::RequestBuilt {
            index: session.next_index(),
            model: request.model.clone(),
            images: request.attached_evidence.len(),
        });
        tracing::info!(
            session = session.id(),
            index = session.next_index(),
            model = %request.model,
            images = request.attached_evidence.len(),
            ?kind,
            "requesting generation"
        );

        let response = self.provider.chat(request.to_chat_request()).await;

        // Anything that arrives after abandonment is discarded.
        if session.is_abandoned() {
            tracing::info!(session = session.id(), "response discarded, session abandoned");
            return StepResult::Abandoned;
        }

        let model = request.model;
        match response {
            Ok(resp) => {
                self.transition(session, LoopState::Evaluating);
                let parsed = parse_response(&resp.content);
                tracing::debug!(strategy = %parsed.strategy, "response parsed");

                let verdict = self.evaluate_cached(&parsed.artifact);
                let passed = verdict.passes(strict_anomaly);
                let failure = if passed {
                    None
                } else {
                    verdict.failure_kind()
                };
                session.set_working(parsed.artifact.clone(), verdict.clone());

                StepResult::Completed(Attempt {
                    artifact: parsed.artifact,
                    verdict,
                    reflection: parsed.commentary,
                    model,
                    passed,
                    failure,
                })
            }
            Err(e) if e.is_malformed_response() => {
                self.transition(session, LoopState::Evaluating);
                tracing::warn!(session = session.id(), "malformed response: {}", e);
                let verdict = EvaluationVerdict::compile_failure(format!("malformed response: {e}"));
                session.set_last_step_verdict(verdict.clone());

                StepResult::Completed(Attempt {
                    artifact: Artifact::default(),
                    verdict,
                    reflection: String::new(),
                    model,
                    passed: false,
                    failure: Some(FailureKind::MalformedResponse),
                })
            }
            Err(error) => StepResult::Transport { model, error },
        }
    }

    fn evaluate_cached(&mut self, artifact: &Artifact) -> EvaluationVerdict {
        if let Some(verdict) = self.eval_cache.get(artifact) {
            tracing::debug!(digest = %artifact.digest(), "reusing cached verdict");
            return verdict;
        }
        let verdict = self.evaluator.evaluate(artifact);
        self.eval_cache.insert(artifact, &verdict);
        verdict
    }

    /// Append one record for a completed step. Returns its index.
    ///
    /// The session's copy of the step verdict is replaced with the recorded
    /// one so its evidence carries the record index and storage paths.
    fn record(
        &mut self,
        session: &mut Session,
        attempt: Attempt,
        kind: RecordKind,
    ) -> Result<u32, LoopError> {
        let index = session.take_index();
        let mut verdict = attempt.verdict;
        verdict.tag_evidence(index);

        if let Some(ref dir) = self.evidence_dir {
            if let Err(e) = dir.persist(index, &mut verdict.evidence) {
                tracing::warn!(index, "failed to persist evidence: {}", e);
            }
        }

        if attempt.failure != Some(FailureKind::TransportFailure) {
            session.set_recorded_verdict(&attempt.artifact, verdict.clone());
        }
        session.set_last_diagnostic(verdict.diagnostic_log.clone());
        let record = IterationRecord {
            index,
            prompt: session.prompt().to_string(),
            artifact: attempt.artifact,
            verdict,
            reflection: attempt.reflection,
            kind,
            model: attempt.model,
            passed: attempt.passed,
            failure: attempt.failure,
            created_at: Utc::now(),
        };
        self.history.append(record)?;

        tracing::info!(
            session = session.id(),
            index,
            %kind,
            passed = attempt.passed,
            failure = ?attempt.failure,
            "record appended"
        );
        self.emit(ProgressEvent::RecordAppended {
            index,
            kind,
            failure: attempt.failure,
        });
        Ok(index)
    }

    // ─── terminal states ────────────────────────────────────────

    fn succeed(&self, session: &mut Session, attempts: u32, index: u32) -> IterationOutcome {
        let status = if attempts == 1 {
            "accepted on the first attempt".to_string()
        } else {
            format!("accepted after {attempts} attempts")
        };
        self.finish(session, LoopState::Success, attempts, Some(index), status)
    }

    fn exhaust(&self, session: &mut Session, attempts: u32, index: u32) -> IterationOutcome {
        let status = format!(
            "no passing artifact after {attempts} attempts; last artifact kept for manual correction"
        );
        self.finish(session, LoopState::Exhausted, attempts, Some(index), status)
    }

    fn fatal(&self, session: &mut Session, attempts: u32, error: LoopError) -> IterationOutcome {
        tracing::error!(session = session.id(), "generation failed: {}", error);
        session.set_last_diagnostic(error.to_string());
        let last = session.next_index().checked_sub(1);
        self.finish(
            session,
            LoopState::FatalError,
            attempts,
            last,
            format!("generation failed: {error}"),
        )
    }

    /// The history log refused a write. The session cannot continue without
    /// its record, so it ends in `FatalError` and the error is handed back.
    fn history_failed(&self, session: &mut Session, attempts: u32, error: LoopError) -> LoopError {
        tracing::error!(session = session.id(), "history write failed: {}", error);
        session.set_last_diagnostic(error.to_string());
        let last = session.next_index().checked_sub(1);
        self.finish(
            session,
            LoopState::FatalError,
            attempts,
            last,
            format!("history write failed: {error}"),
        );
        error
    }

    fn finish(
        &self,
        session: &mut Session,
        state: LoopState,
        attempts: u32,
        last_index: Option<u32>,
        status: impl Into<String>,
    ) -> IterationOutcome {
        let status = status.into();
        self.transition(session, state);
        session.set_status(status.clone());
        self.emit(ProgressEvent::Finished { state, attempts });
        IterationOutcome {
            state,
            attempts,
            last_index,
            status,
        }
    }
}
