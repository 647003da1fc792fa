//! Process entry point (§6.5): loads configuration, wires the hexagon
//! together, and serves the Client Channel over HTTP/WebSocket.
//!
//! ```bash
//! orchestrator run
//! ```
//!
//! `HOST`/`PORT`/`DEBUG`, the reasoner provider keys, and per-tool-server
//! secrets all come from the environment (optionally via a local `.env`).
//! A missing optional tool-server secret disables just that server; the
//! core still serves.

use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use orchestrator::adapters::{
    websocket::{websocket_router, RoomManager, WebSocketState},
    AnthropicConfig, AnthropicReasoner, ConfiguredToolTransport, FileStateStorage, JsonSchemaValidator, OpenAIConfig, OpenAIReasoner, ToolServerSpec,
};
use orchestrator::application::tool_bridge::ToolBridge;
use orchestrator::application::{Coordinator, ExecutionStage, OrchestrationStage, PlanningStage};
use orchestrator::config::{AiProvider, AppConfig, TransportKind as ConfigTransportKind};
use orchestrator::ports::{Reasoner, ToolTransport};

#[derive(Parser)]
#[command(name = "orchestrator", about = "Multi-agent query orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the service.
    Run,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Run => {
            if let Err(err) = run().await {
                eprintln!("fatal error during startup: {err}");
                std::process::exit(1);
            }
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config.server.log_level);

    let data_dir = std::env::var("ORCHESTRATOR_DATA_DIR").unwrap_or_else(|_| "./data/sessions".to_string());
    let session_store = Arc::new(FileStateStorage::new(data_dir));

    let reasoner = build_reasoner(&config)?;

    let tool_servers = config
        .tool_servers
        .servers
        .iter()
        .map(|server| ToolServerSpec {
            id: server.id.clone(),
            transport: match server.transport {
                ConfigTransportKind::Stdio => orchestrator::ports::TransportKind::Stdio,
                ConfigTransportKind::Http => orchestrator::ports::TransportKind::Http,
                ConfigTransportKind::Sse => orchestrator::ports::TransportKind::Sse,
            },
            endpoint: server.endpoint.clone(),
            secret: server.secret.clone(),
        })
        .collect();

    let transport: Arc<dyn ToolTransport> = Arc::new(ConfiguredToolTransport::new(tool_servers)?);
    let tool_bridge = Arc::new(ToolBridge::new(transport, Arc::new(JsonSchemaValidator::new())));

    let planning = PlanningStage::new(reasoner.clone());
    let orchestration = OrchestrationStage::new(reasoner.clone(), tool_bridge.clone());
    let execution = ExecutionStage::new(tool_bridge.clone(), reasoner.clone());

    let coordinator = Arc::new(Coordinator::new(tool_bridge, planning, orchestration, execution, session_store));
    let room_manager = Arc::new(RoomManager::with_default_capacity());
    let ws_state = WebSocketState::new(room_manager, coordinator);

    let app = Router::new()
        .nest("/api", websocket_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .with_state(ws_state);

    let addr = config.server.socket_addr();
    tracing::info!(%addr, environment = ?config.server.environment, "starting orchestrator");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_reasoner(config: &AppConfig) -> Result<Arc<dyn Reasoner>, Box<dyn std::error::Error>> {
    match config.reasoner.primary_provider {
        AiProvider::Anthropic => {
            let key = config.reasoner.anthropic_api_key.clone().ok_or("ANTHROPIC_API_KEY not set")?;
            let cfg = AnthropicConfig::new(key)
                .with_timeout(config.reasoner.timeout())
                .with_max_retries(config.reasoner.max_retries);
            Ok(Arc::new(AnthropicReasoner::new(cfg)))
        }
        AiProvider::OpenAI => {
            let key = config.reasoner.openai_api_key.clone().ok_or("OPENAI_API_KEY not set")?;
            let cfg = OpenAIConfig::new(key)
                .with_timeout(config.reasoner.timeout())
                .with_max_retries(config.reasoner.max_retries);
            Ok(Arc::new(OpenAIReasoner::new(cfg)))
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = config.server.cors_origins_list();
    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let parsed: Vec<http::HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new().allow_origin(parsed).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
    }
}

fn init_tracing(filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_target(true).init();
}
