//! Process entry point: load configuration, wire vendor adapters, start the
//! control plane, and shut down cleanly on SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use michael_config::{load_settings, Settings};
use michael_llm::{LlmSettings, VendorLlmAdapter};
use michael_pipeline::{AsrSettings, ResponseCache, StreamingAsrConnector, TtsSettings, VendorTtsAdapter};
use michael_server::{create_router, install_recorder, AppState};
use michael_transport::{RestTelephonyAdapter, TelephonySettings};

/// Vendor HTTP clients don't have a config knob for this; it is deliberately
/// fixed rather than exposed, since operators tune carrier/LLM/TTS latency
/// budgets through the vendor endpoint, not this process.
const VENDOR_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("MICHAEL_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("warning: failed to load configuration: {err}. Using defaults.");
            Settings::default()
        }
    };

    init_tracing(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting control plane");
    tracing::info!(environment = ?config.environment, "configuration loaded");

    let metrics_handle = if config.observability.metrics_enabled {
        Some(install_recorder())
    } else {
        None
    };

    let telephony = Arc::new(RestTelephonyAdapter::new(TelephonySettings {
        account_sid: config.telephony.account_sid.clone(),
        auth_token: config.telephony.auth_token.clone(),
        from_number: config.telephony.from_number.clone(),
        base_url: config.telephony.base_url.clone(),
    }));

    let asr = Arc::new(StreamingAsrConnector::new(AsrSettings {
        api_key: config.asr.api_key.clone(),
        endpoint: config.asr.endpoint.clone(),
        utterance_end_ms: config.asr.utterance_end_ms,
        endpointing_ms: config.asr.endpointing_ms,
    }));

    let llm = Arc::new(VendorLlmAdapter::new(LlmSettings {
        api_key: config.llm.api_key.clone(),
        endpoint: config.llm.endpoint.clone(),
        model: config.llm.model.clone(),
        request_timeout: VENDOR_REQUEST_TIMEOUT,
    })?);

    let response_cache = Arc::new(ResponseCache::new());
    let tts = Arc::new(VendorTtsAdapter::new(
        TtsSettings {
            api_key: config.tts.api_key.clone(),
            endpoint: config.tts.endpoint.clone(),
            voice_id: config.tts.voice_id.clone(),
            model: config.tts.model.clone(),
            request_timeout: VENDOR_REQUEST_TIMEOUT,
        },
        response_cache,
    )?);

    let warm_tts = tts.clone();
    tokio::spawn(async move {
        warm_tts.warm().await;
        tracing::info!("tts cache warmed");
    });

    let server_config = config.server.clone();
    let mut state = AppState::new(config, telephony, asr, llm, tts);
    if let Some(handle) = metrics_handle {
        state = state.with_metrics_handle(handle);
    }

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", server_config.host, server_config.port).parse()?;
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received sigterm, shutting down"),
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("michael_server={0},michael_agent={0},tower_http=info", config.observability.log_level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
