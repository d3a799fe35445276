#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

use async_openai::{
    Client as OpenAIClient,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use futures::future::BoxFuture;
use itertools::Itertools;

use crate::{
    config::GeneratorEnv,
    types::{GradeReport, GradeRequest, GradeResult},
};

/// Failure talking to the text-generation service.
#[derive(thiserror::Error, Debug)]
pub enum GenerateError {
    /// The request could not be built, sent, or was rejected upstream.
    #[error("text-generation request failed")]
    Request(#[from] OpenAIError),
    /// The service answered without any text.
    #[error("text-generation response contained no text")]
    EmptyResponse,
}

/// Failure while grading a request.
#[derive(thiserror::Error, Debug)]
pub enum GradeError {
    /// The model could not be invoked.
    #[error("could not get a grade from the text-generation service")]
    Upstream(#[from] GenerateError),
}

/// Future returned by [`TextGenerator::generate`].
pub type GenerateFuture<'a> = BoxFuture<'a, Result<String, GenerateError>>;

/// Something that turns a prompt into model output.
pub trait TextGenerator: Send + Sync {
    /// Sends `prompt` to the model and returns its reply verbatim.
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a>;
}

/// [`TextGenerator`] backed by an OpenAI-compatible chat-completions API.
pub struct OpenAiGenerator {
    /// Client configured with the endpoint and credentials.
    client: OpenAIClient<OpenAIConfig>,
    /// Model identifier sent with each request.
    model:  String,
}

impl OpenAiGenerator {
    /// Builds a generator that reuses `http_client` for every request.
    ///
    /// Each call is sent exactly once: the client's rate-limit backoff is
    /// given no time budget, so a 429 fails straight away.
    pub fn new(env: &GeneratorEnv, http_client: reqwest::Client) -> Self {
        let client = OpenAIClient::with_config(
            OpenAIConfig::new()
                .with_api_base(env.api_base().to_owned())
                .with_api_key(env.api_key().to_owned()),
        )
        .with_http_client(http_client)
        .with_backoff(
            backoff::ExponentialBackoffBuilder::new()
                .with_max_elapsed_time(Some(Duration::ZERO))
                .build(),
        );

        Self {
            client,
            model: env.model().to_owned(),
        }
    }

    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends a single, non-streaming completion request.
    async fn complete(&self, prompt: &str) -> Result<String, GenerateError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(vec![
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .n(1)
            .stream(false)
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GenerateError::EmptyResponse)
    }
}

impl TextGenerator for OpenAiGenerator {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(self.complete(prompt))
    }
}

/// Embeds the question, rubric, and answer in the grading instructions.
///
/// Each rubric point becomes a `- point` line.
pub fn build_prompt(question: &str, rubric: &[String], answer: &str) -> String {
    let rubric = rubric.iter().map(|point| format!("- {point}")).join("\n");
    format!(
        include_str!("prompts/grade_essay.md"),
        question = question,
        rubric = rubric,
        answer = answer,
    )
}

/// Removes Markdown code fences the model sometimes wraps its JSON in.
///
/// Every `` ```json `` and `` ``` `` marker is dropped, wherever it occurs,
/// and the result is trimmed. Running it twice changes nothing.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```", "")
        .trim()
        .to_owned()
}

/// Turns raw model output into a [`GradeResult`].
///
/// Output that is not JSON, or is JSON of the wrong shape, becomes
/// [`GradeResult::Unparsed`] carrying the cleaned text.
pub fn parse_model_output(text: &str) -> GradeResult {
    let cleaned = strip_code_fences(text);
    match serde_json::from_str::<GradeReport>(&cleaned) {
        Ok(report) => GradeResult::Report(report),
        Err(e) => {
            tracing::error!(error = %e, raw = %cleaned, "Parse failed");
            GradeResult::unparsed(cleaned)
        }
    }
}

/// Grades requests by prompting a [`TextGenerator`].
pub struct Grader<G> {
    /// The model behind the grader.
    generator: G,
}

impl<G: TextGenerator> Grader<G> {
    /// Wraps a generator.
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Returns the underlying generator.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Prompts the model once and parses its reply.
    ///
    /// Only a failed invocation is an error; unusable output is reported
    /// through [`GradeResult::Unparsed`].
    pub async fn grade(&self, request: &GradeRequest) -> Result<GradeResult, GradeError> {
        let prompt = build_prompt(&request.question, &request.rubric, &request.answer);
        let text = self.generator.generate(&prompt).await?;
        let result = parse_model_output(&text);

        if let Some(report) = result.report() {
            tracing::info!(
                total = %report.total,
                out_of = %report.out_of,
                points = report.breakdown.len(),
                "Graded submission"
            );
        }

        Ok(result)
    }
}
