#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use typed_builder::TypedBuilder;

use crate::constants::{DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_OPENAPI_PATH, DEFAULT_PORT};

/// Credentials and model selection for the text-generation service.
#[derive(Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
#[builder(doc)]
pub struct GeneratorEnv {
    /// Base URL for the OpenAI-compatible API endpoint.
    #[builder(default = DEFAULT_API_BASE.to_owned())]
    api_base: String,
    /// API key used to authenticate requests. Empty when not configured.
    #[builder(default)]
    api_key:  String,
    /// Model identifier sent with every completion request.
    #[builder(default = DEFAULT_MODEL.to_owned())]
    model:    String,
}

impl GeneratorEnv {
    /// Reads `GEMINI_API_KEY`, `GRADER_API_BASE` and `GRADER_MODEL`.
    ///
    /// A missing key is not an error: the server still starts, but every
    /// grading call will be rejected upstream.
    pub fn from_env() -> Self {
        Self {
            api_base: env_or("GRADER_API_BASE", DEFAULT_API_BASE),
            api_key:  env_or("GEMINI_API_KEY", ""),
            model:    env_or("GRADER_MODEL", DEFAULT_MODEL),
        }
    }

    /// Returns the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns the API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether an API key was supplied at all.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl std::fmt::Debug for GeneratorEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorEnv")
            .field("api_base", &self.api_base)
            .field("api_key", &if self.has_credentials() { "<set>" } else { "<unset>" })
            .field("model", &self.model)
            .finish()
    }
}

/// Everything the server needs at startup. Read once, then passed by value.
#[derive(Debug, Clone, TypedBuilder)]
#[builder(doc)]
pub struct ServerConfig {
    /// TCP port to listen on.
    #[builder(default = DEFAULT_PORT)]
    port:         u16,
    /// Path to the OpenAPI document served under `/api-docs`.
    #[builder(default = PathBuf::from(DEFAULT_OPENAPI_PATH), setter(into))]
    openapi_path: PathBuf,
    /// Text-generation service settings.
    #[builder(default = GeneratorEnv::builder().build())]
    generator:    GeneratorEnv,
}

impl ServerConfig {
    /// Construct a configuration from environment variables, applying
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            port:         read_port("PORT", DEFAULT_PORT),
            openapi_path: PathBuf::from(env_or("GRADER_OPENAPI_PATH", DEFAULT_OPENAPI_PATH)),
            generator:    GeneratorEnv::from_env(),
        }
    }

    /// Overrides the listening port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the OpenAPI document location.
    pub fn with_openapi_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.openapi_path = path.into();
        self
    }

    /// Returns the listening port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the OpenAPI document location.
    pub fn openapi_path(&self) -> &Path {
        &self.openapi_path
    }

    /// Returns the text-generation settings.
    pub fn generator(&self) -> &GeneratorEnv {
        &self.generator
    }
}

/// Reads an environment variable, trimming it and falling back to `default`
/// when it is unset or blank.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

/// Parses an environment variable into a port, falling back to `default`
/// when parsing fails or the variable is missing.
fn read_port(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(default)
}
