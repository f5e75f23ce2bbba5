// src/cli/generate.rs — One-shot generation without rendering
//
// Sends the initial request for a prompt through the configured provider and
// prints the parsed reply. Evaluation needs a render backend, which only an
// embedding application can supply; see `cli::session::terminal_controller`.

use std::sync::Arc;

use crate::cli::parse::render_parsed;
use crate::core::request::{CallKind, RequestBuilder};
use crate::core::session::Session;
use crate::infra::config::Config;
use crate::parser::parse_response;
use crate::provider::openai_compat::OpenAICompatProvider;
use crate::provider::retry::{RetryConfig, RetryProvider};
use crate::provider::ModelProvider;
use crate::util::truncate_str;

/// Build the provider stack described by `config`.
pub fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn ModelProvider>> {
    let inner = OpenAICompatProvider::from_config(&config.provider, &config.models.default)?
        .with_vision_prefixes(config.models.vision.clone());
    let retry = RetryConfig::default().with_max_retries(config.provider.max_retries);
    Ok(Arc::new(RetryProvider::with_config(Arc::new(inner), retry)))
}

pub async fn run_generate(
    config: &Config,
    prompt: &str,
    model: Option<&str>,
    raw: bool,
) -> anyhow::Result<()> {
    let provider = build_provider(config)?;

    let mut session = Session::new();
    session.reset(prompt);
    let mut request = RequestBuilder::from_config(config).build(&session, CallKind::Initial, None);
    if let Some(m) = model.filter(|m| !m.trim().is_empty()) {
        request.model = m.trim().to_string();
    }

    tracing::info!(
        provider = provider.id(),
        model = %request.model,
        prompt = truncate_str(prompt, 80),
        "sending initial request"
    );
    eprintln!("[#0] generating with {}", request.model);

    let response = provider.chat(request.to_chat_request()).await?;
    tracing::debug!(
        input_tokens = response.usage.input_tokens,
        output_tokens = response.usage.output_tokens,
        "reply received"
    );

    if raw {
        println!("{}", response.content);
    } else {
        print!("{}", render_parsed(&parse_response(&response.content)));
    }
    Ok(())
}
