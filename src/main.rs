use std::sync::Arc;

use anyhow::Context;

use ticketsmith::api::{AppState, router};
use ticketsmith::config::AppConfig;
use ticketsmith::ingest::{InputNormalizer, OcrCell};
use ticketsmith::llm::StructuringClient;
use ticketsmith::pipeline::UploadProcessor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;

    eprintln!("🎫 Ticketsmith v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   LLM endpoint: {}", config.llm.endpoint);
    eprintln!("   Upload API: http://0.0.0.0:{}/api/generate", config.port);
    eprintln!(
        "   OCR: {}",
        if cfg!(feature = "ocr") {
            config.ocr.language.as_str()
        } else {
            "disabled (build with --features ocr)"
        }
    );

    // ── Pipeline ────────────────────────────────────────────────────────
    let normalizer = InputNormalizer::new(OcrCell::new(Arc::new(config.ocr.clone())));
    let analyzer =
        StructuringClient::new(config.llm.clone()).context("building the LLM client")?;
    let jira_http = reqwest::Client::builder()
        .build()
        .context("building the Jira HTTP client")?;

    let processor = UploadProcessor::new(
        Arc::new(normalizer),
        Arc::new(analyzer),
        jira_http,
        Arc::new(config.schema.clone()),
    );

    // ── HTTP server ─────────────────────────────────────────────────────
    let app = router(
        AppState {
            processor: Arc::new(processor),
        },
        config.max_upload_bytes,
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(port = config.port, "Ticketsmith server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("serving HTTP")?;

    Ok(())
}
