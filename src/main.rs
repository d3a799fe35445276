#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # essay-grader
//!
//! Serves `POST /grade-essay`, which asks an LLM to grade a student's answer
//! against a rubric.
//!
//! Configuration is read from the environment (and an optional `.env` file):
//! `PORT`, `GEMINI_API_KEY`, `GRADER_API_BASE`, `GRADER_MODEL`, and
//! `GRADER_OPENAPI_PATH`. `--port` and `--openapi` override the first and
//! last of these.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use bpaf::*;
use dotenvy::dotenv;
use essay_grader::{AppState, Grader, OpenAiGenerator, ServerConfig, docs, router};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Command line overrides for the environment configuration.
#[derive(Debug, Clone)]
struct Options {
    /// Port to listen on
    port:    Option<u16>,
    /// Path to the OpenAPI document
    openapi: Option<PathBuf>,
}

/// Parse the command line arguments and return an `Options` struct
fn options() -> Options {
    let port = long("port")
        .short('p')
        .help("Port to listen on (overrides PORT)")
        .argument::<u16>("PORT")
        .optional();

    let openapi = long("openapi")
        .help("Path to the OpenAPI document served at /api-docs")
        .argument::<PathBuf>("PATH")
        .optional();

    construct!(Options { port, openapi })
        .to_options()
        .descr("Essay grading API backed by an LLM")
        .run()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer().with_file(false).with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let opts = options();

    let mut config = ServerConfig::from_env();
    if let Some(port) = opts.port {
        config = config.with_port(port);
    }
    if let Some(path) = opts.openapi {
        config = config.with_openapi_path(path);
    }

    if !config.generator().has_credentials() {
        tracing::warn!("GEMINI_API_KEY is not set; grading requests will fail");
    }

    let http_client = reqwest::Client::builder()
        .build()
        .context("Failed to construct shared HTTP client")?;
    let generator = OpenAiGenerator::new(config.generator(), http_client);
    tracing::info!(
        model = generator.model(),
        api_base = config.generator().api_base(),
        "Text-generation client initialized"
    );

    let api_spec = docs::resolve_spec(config.openapi_path());
    let state = AppState::new(Grader::new(generator), api_spec);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not bind to {addr}"))?;

    tracing::info!("Essay grader API running at http://localhost:{}", config.port());
    axum::serve(listener, router(state))
        .await
        .context("Server exited with an error")?;

    Ok(())
}
