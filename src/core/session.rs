// src/core/session.rs — Explicit per-prompt session state
//
// Everything the controller needs between steps lives here: the prompt, the
// working artifact, the index counter, and the abandonment flag. There is no
// ambient state anywhere else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::types::{Artifact, EvaluationVerdict, LoopState};

/// Cloneable handle a UI keeps to discard the session from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct AbandonHandle(Arc<AtomicBool>);

impl AbandonHandle {
    pub fn abandon(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_abandoned(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct Session {
    id: String,
    prompt: String,
    next_index: u32,
    manual_iterations: u32,
    state: LoopState,
    status: String,
    last_diagnostic: String,
    working_artifact: Artifact,
    working_verdict: Option<EvaluationVerdict>,
    /// Verdict of the most recent step, fed back into the next request.
    last_step_verdict: Option<EvaluationVerdict>,
    abandoned: AbandonHandle,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: String::new(),
            next_index: 0,
            manual_iterations: 0,
            state: LoopState::Idle,
            status: "idle".into(),
            last_diagnostic: String::new(),
            working_artifact: Artifact::default(),
            working_verdict: None,
            last_step_verdict: None,
            abandoned: AbandonHandle::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn has_prompt(&self) -> bool {
        !self.prompt.trim().is_empty()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Human-readable status of the last terminal state.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn last_diagnostic(&self) -> &str {
        &self.last_diagnostic
    }

    /// The artifact the user currently sees.
    pub fn working_artifact(&self) -> &Artifact {
        &self.working_artifact
    }

    pub fn working_verdict(&self) -> Option<&EvaluationVerdict> {
        self.working_verdict.as_ref()
    }

    pub fn last_step_verdict(&self) -> Option<&EvaluationVerdict> {
        self.last_step_verdict.as_ref()
    }

    /// Manual iterations started so far in this session.
    pub fn manual_iterations(&self) -> u32 {
        self.manual_iterations
    }

    /// Index the next record will get.
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    pub fn abandon_handle(&self) -> AbandonHandle {
        self.abandoned.clone()
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.is_abandoned()
    }

    // ─── controller-only mutation ───────────────────────────────

    /// Start over with a new prompt. The abandonment flag survives: an
    /// abandoned session stays abandoned.
    pub(crate) fn reset(&mut self, prompt: &str) {
        self.prompt = prompt.to_string();
        self.next_index = 0;
        self.manual_iterations = 0;
        self.state = LoopState::Idle;
        self.status = "idle".into();
        self.last_diagnostic.clear();
        self.working_artifact = Artifact::default();
        self.working_verdict = None;
        self.last_step_verdict = None;
    }

    /// Hand out the next record index.
    pub(crate) fn take_index(&mut self) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    pub(crate) fn note_manual_iteration(&mut self) {
        self.manual_iterations += 1;
    }

    /// Returns the previous state.
    pub(crate) fn set_state(&mut self, state: LoopState) -> LoopState {
        std::mem::replace(&mut self.state, state)
    }

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub(crate) fn set_last_diagnostic(&mut self, log: impl Into<String>) {
        self.last_diagnostic = log.into();
    }

    pub(crate) fn set_working(&mut self, artifact: Artifact, verdict: EvaluationVerdict) {
        self.working_artifact = artifact;
        self.last_step_verdict = Some(verdict.clone());
        self.working_verdict = Some(verdict);
    }

    /// Record a step's verdict without replacing the working artifact.
    pub(crate) fn set_last_step_verdict(&mut self, verdict: EvaluationVerdict) {
        self.last_step_verdict = Some(verdict);
    }

    /// Swap in the recorded form of the step verdict. The working verdict is
    /// only replaced when `artifact` is the working artifact.
    pub(crate) fn set_recorded_verdict(&mut self, artifact: &Artifact, verdict: EvaluationVerdict) {
        if !artifact.is_blank() && self.working_artifact == *artifact {
            self.working_verdict = Some(verdict.clone());
        }
        self.last_step_verdict = Some(verdict);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let s = Session::new();
        assert_eq!(s.state(), LoopState::Idle);
        assert!(!s.has_prompt());
        assert!(s.working_artifact().is_blank());
        assert_eq!(s.next_index(), 0);
        assert_eq!(s.id().len(), 36);
    }

    #[test]
    fn test_take_index_strictly_increases() {
        let mut s = Session::new();
        assert_eq!(s.take_index(), 0);
        assert_eq!(s.take_index(), 1);
        assert_eq!(s.take_index(), 2);
        assert_eq!(s.next_index(), 3);
    }

    #[test]
    fn test_reset_clears_progress() {
        let mut s = Session::new();
        s.take_index();
        s.note_manual_iteration();
        s.set_working(
            Artifact::new("void main() {}"),
            EvaluationVerdict::default(),
        );
        s.reset("red circle");
        assert_eq!(s.prompt(), "red circle");
        assert_eq!(s.next_index(), 0);
        assert_eq!(s.manual_iterations(), 0);
        assert!(s.working_verdict().is_none());
        assert!(s.last_step_verdict().is_none());
    }

    #[test]
    fn test_abandon_handle_shared() {
        let s = Session::new();
        let h = s.abandon_handle();
        assert!(!s.is_abandoned());
        h.abandon();
        assert!(s.is_abandoned());
    }

    #[test]
    fn test_abandonment_survives_reset() {
        let mut s = Session::new();
        s.abandon_handle().abandon();
        s.reset("again");
        assert!(s.is_abandoned());
    }

    #[test]
    fn test_last_step_verdict_independent_of_working() {
        let mut s = Session::new();
        s.set_working(Artifact::new("a"), EvaluationVerdict::default());
        s.set_last_step_verdict(EvaluationVerdict::compile_failure("malformed"));
        assert_eq!(s.working_artifact().source(), "a");
        assert!(s.working_verdict().unwrap().diagnostic_log.is_empty());
        assert!(!s.last_step_verdict().unwrap().compiled);
    }

    #[test]
    fn test_recorded_verdict_replaces_matching_working_copy() {
        let mut s = Session::new();
        s.set_working(Artifact::new("a"), EvaluationVerdict::default());
        let tagged = EvaluationVerdict {
            diagnostic_log: "recorded".into(),
            ..Default::default()
        };

        s.set_recorded_verdict(&Artifact::new("a"), tagged);
        assert_eq!(s.working_verdict().unwrap().diagnostic_log, "recorded");
        assert_eq!(s.last_step_verdict().unwrap().diagnostic_log, "recorded");

        s.set_recorded_verdict(&Artifact::default(), EvaluationVerdict::compile_failure("x"));
        assert_eq!(s.working_verdict().unwrap().diagnostic_log, "recorded");
        assert!(!s.last_step_verdict().unwrap().compiled);
    }
}
