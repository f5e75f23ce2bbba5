// src/core/request.rs — Request builder and model selection
//
// Decides which model a call goes to, which screenshots ride along, and
// assembles the conversation. Built fresh for every call; nothing here keeps
// state between requests.

use super::session::Session;
use super::system_prompt::{build_iteration_turn, build_system_prompt};
use super::types::Evidence;
use crate::infra::config::{Config, ModelsConfig, FALLBACK_MODEL};
use crate::provider::{ChatRequest, ImagePart, Message};

/// Why a generation call is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// First generation for a prompt.
    Initial,
    /// Human-initiated iteration (with or without feedback).
    Manual,
    /// Automatic retry after a failed step.
    AutoRetry,
}

/// Hard ceiling on screenshots per request. Configuration may lower the
/// count but never raise it.
pub const MAX_ATTACHED_IMAGES: usize = 1;

/// Byte and count limits for images attached to a request. Byte caps apply to
/// the base64 data URL each image is sent as, not the raw PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvidencePolicy {
    pub per_item_cap: u64,
    pub aggregate_cap: u64,
    pub max_items: usize,
}

impl Default for EvidencePolicy {
    fn default() -> Self {
        let cfg = Config::default();
        Self {
            per_item_cap: cfg.evidence.per_image_byte_cap,
            aggregate_cap: cfg.evidence.aggregate_byte_cap,
            max_items: cfg.evidence.max_attached_images.min(MAX_ATTACHED_IMAGES),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Screenshots attached to the final user turn, in order.
    pub attached_evidence: Vec<Evidence>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    pub fn to_chat_request(&self) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: self.messages.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Case-insensitive prefix match against the vision allow-list.
pub fn supports_vision(model: &str, prefixes: &[String]) -> bool {
    let model = model.to_ascii_lowercase();
    prefixes
        .iter()
        .filter(|p| !p.trim().is_empty())
        .any(|p| model.starts_with(&p.to_ascii_lowercase()))
}

/// Walk `items` in order, skipping any item whose data URL is over the
/// per-item cap or would push the running total past the aggregate cap, until
/// `max_items` (at most `MAX_ATTACHED_IMAGES`) are selected. Skips are silent.
pub fn select_evidence(items: &[Evidence], policy: &EvidencePolicy) -> Vec<Evidence> {
    let limit = policy.max_items.min(MAX_ATTACHED_IMAGES);
    let mut selected = Vec::new();
    let mut total: u64 = 0;
    for item in items {
        if selected.len() >= limit {
            break;
        }
        let size = item.encoded_len();
        if size > policy.per_item_cap {
            continue;
        }
        if total.saturating_add(size) > policy.aggregate_cap {
            continue;
        }
        total += size;
        selected.push(item.clone());
    }
    selected
}

pub struct RequestBuilder {
    models: ModelsConfig,
    policy: EvidencePolicy,
    system_prompt: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl RequestBuilder {
    pub fn new(models: ModelsConfig, policy: EvidencePolicy) -> Self {
        Self {
            models,
            policy,
            system_prompt: build_system_prompt(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let requested = cfg.evidence.max_attached_images;
        if requested > MAX_ATTACHED_IMAGES {
            tracing::warn!(
                requested,
                max = MAX_ATTACHED_IMAGES,
                "max_attached_images above the limit, clamping"
            );
        }
        Self::new(
            cfg.models.clone(),
            EvidencePolicy {
                per_item_cap: cfg.evidence.per_image_byte_cap,
                aggregate_cap: cfg.evidence.aggregate_byte_cap,
                max_items: requested.min(MAX_ATTACHED_IMAGES),
            },
        )
        .with_sampling(cfg.provider.max_tokens, cfg.provider.temperature)
    }

    pub fn with_sampling(mut self, max_tokens: Option<u32>, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn policy(&self) -> &EvidencePolicy {
        &self.policy
    }

    /// Specialized model for the cold start and the first human correction,
    /// default model for everything else.
    pub fn select_model(&self, kind: CallKind, manual_iterations_so_far: u32) -> String {
        let wants_specialized = match kind {
            CallKind::Initial => true,
            CallKind::Manual => manual_iterations_so_far == 0,
            CallKind::AutoRetry => false,
        };

        if wants_specialized && self.models.use_specialized {
            if let Some(name) = self
                .models
                .specialized
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
            {
                return name.to_string();
            }
        }

        let default = self.models.default.trim();
        if default.is_empty() {
            tracing::warn!(
                fallback = FALLBACK_MODEL,
                "default model name is blank, substituting fallback"
            );
            return FALLBACK_MODEL.to_string();
        }
        default.to_string()
    }

    /// Assemble the request for the next call on `session`.
    pub fn build(
        &self,
        session: &Session,
        kind: CallKind,
        feedback: Option<&str>,
    ) -> GenerationRequest {
        let model = self.select_model(kind, session.manual_iterations());
        let mut messages = vec![Message::system(self.system_prompt.clone())];
        let mut attached = Vec::new();

        match kind {
            CallKind::Initial => {
                messages.push(Message::user(session.prompt()));
            }
            CallKind::Manual | CallKind::AutoRetry => {
                messages.push(Message::user(session.prompt()));

                let prior = session.working_artifact();
                if !prior.is_blank() {
                    messages.push(Message::assistant(prior.source()));
                }

                let verdict = session.last_step_verdict();
                let turn = build_iteration_turn(session.next_index(), feedback, verdict);
                let mut closing = Message::user(turn);

                if let Some(v) = verdict {
                    if !v.evidence.is_empty() && supports_vision(&model, &self.models.vision) {
                        attached = select_evidence(&v.evidence, &self.policy);
                        closing = closing
                            .with_images(attached.iter().map(ImagePart::from_evidence).collect());
                    }
                }
                messages.push(closing);
            }
        }

        GenerationRequest {
            model,
            messages,
            attached_evidence: attached,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}
