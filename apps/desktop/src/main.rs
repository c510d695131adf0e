use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{ClientError, RemotePredictor, SubmissionController, WorkflowEvent, WorkflowState};
use shared::domain::ImageAsset;
use tokio_stream::StreamExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::load_settings;
use render::{notice_line, result_card, state_line, JsonOutcome};

/// Submit chest X-ray images for TB screening.
#[derive(Parser, Debug)]
#[command(name = "tb-screen")]
struct Args {
    /// Config file (defaults to ./desktop.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Classification endpoint, overrides config and environment.
    #[arg(long)]
    endpoint: Option<String>,
    /// Per-request timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Print one JSON object per image instead of a result card.
    #[arg(long)]
    json: bool,
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(endpoint) = args.endpoint {
        settings.endpoint = endpoint;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.request_timeout_ms = timeout_ms;
    }
    let predictor_config = settings.predictor_config()?;
    info!(endpoint = %predictor_config.endpoint, "using classification endpoint");

    let controller = SubmissionController::new(Arc::new(RemotePredictor::new(predictor_config)));
    let events = controller.event_stream();
    tokio::pin!(events);

    for path in &args.images {
        let file = path.display().to_string();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read image '{file}'"))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.clone());

        let submission = match controller.submit(ImageAsset::new(filename, bytes)) {
            Ok(submission) => submission,
            Err(ClientError::InvalidInput(reason)) => {
                report_rejection(&file, &reason, args.json)?;
                continue;
            }
            Err(other) => return Err(other.into()),
        };

        while let Some(event) = events.next().await {
            if event.submission() != submission {
                continue;
            }
            match event {
                WorkflowEvent::Notice { notice, .. } => {
                    if !args.json {
                        println!("{}", notice_line(&notice));
                    }
                }
                WorkflowEvent::StateChanged { state, .. } => {
                    if !args.json {
                        if let Some(line) = state_line(&file, &state) {
                            println!("{line}");
                        }
                    }
                    if state.is_terminal() {
                        report_outcome(&file, &state, args.json)?;
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn report_rejection(file: &str, reason: &str, json: bool) -> Result<()> {
    if json {
        let outcome = JsonOutcome {
            file,
            result: None,
            error: Some(reason),
        };
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        eprintln!("{file}: skipped: {reason}");
    }
    Ok(())
}

fn report_outcome(file: &str, state: &WorkflowState, json: bool) -> Result<()> {
    if json {
        let outcome = JsonOutcome {
            file,
            result: state.view(),
            error: state.error_reason(),
        };
        println!("{}", serde_json::to_string(&outcome)?);
    } else if let Some(view) = state.view() {
        println!("{}", result_card(file, &view));
    }
    Ok(())
}
