use std::sync::Arc;

use boxboard::api::{ApiClient, ApiError, Bootstrap, OrderDetailsSource};
use boxboard::config::{BoardConfig, ConfigError};
use boxboard::drilldown::merge_details;
use boxboard::layout::derive_display;
use boxboard::merge::MergeMap;
use boxboard::realtime::{BoardError, RealtimeBoard};
use boxboard::render::render_board;
use boxboard::state::AppState;
use boxboard::transport::stomp::StompTransport;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("backend request failed: {0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Board(#[from] BoardError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "boxboard", about = "Realtime workshop occupancy board")]
struct Cli {
    /// Backend REST base URL.
    #[arg(long, env = "BOXBOARD_API_URL")]
    api_url: Option<String>,

    /// STOMP-over-WebSocket endpoint.
    #[arg(long, env = "BOXBOARD_WS_URL")]
    ws_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the board in the terminal and follow live updates until Ctrl-C.
    Watch,
    /// Print the board derived from bootstrap data as JSON.
    Snapshot,
    /// Print the drill-down for one box as JSON.
    Order { box_identifier: String },
    /// Serve the board over HTTP and WebSocket.
    Serve {
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = BoardConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config.api_url = url.trim_end_matches('/').to_owned();
    }
    if let Some(url) = cli.ws_url {
        config.ws_url = url;
    }
    config.validate()?;

    let api = Arc::new(ApiClient::new(&config.api_url)?);
    match cli.command {
        Command::Watch => watch(&config, &api).await,
        Command::Snapshot => snapshot(&config, &api).await,
        Command::Order { box_identifier } => order(&config, &api, &box_identifier).await,
        Command::Serve { port } => serve(config.clone(), api, port.unwrap_or(config.port)).await,
    }
}

async fn snapshot(config: &BoardConfig, api: &ApiClient) -> Result<(), CliError> {
    let bootstrap = Bootstrap::load(api).await?;
    let merge = MergeMap::from_orders(&bootstrap.orders);
    let snapshot = derive_display(&bootstrap.boxes, &merge, config.layout, false);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn order(config: &BoardConfig, api: &ApiClient, box_identifier: &str) -> Result<(), CliError> {
    let bootstrap = Bootstrap::load(api).await?;
    let merge = MergeMap::from_orders(&bootstrap.orders);
    let snapshot = derive_display(&bootstrap.boxes, &merge, config.layout, false);

    let live = snapshot.find(box_identifier).ok_or_else(|| BoardError::UnknownBox(box_identifier.to_owned()))?;
    let Some(order_service_id) = live.order_service_id.clone().filter(|id| !id.is_blank()) else {
        return Err(BoardError::NoActiveOrder(box_identifier.to_owned()).into());
    };
    let details = api.order_details(&order_service_id).await?;
    let drilldown = merge_details(live, order_service_id, details);
    println!("{}", serde_json::to_string_pretty(&drilldown)?);
    Ok(())
}

async fn watch(config: &BoardConfig, api: &ApiClient) -> Result<(), CliError> {
    let bootstrap = Bootstrap::load(api).await?;
    let transport = Arc::new(StompTransport::new(config.stomp_config()));
    let board = RealtimeBoard::start(transport, config.board_options(), bootstrap).await;
    let mut snapshots = board.subscribe();

    println!("{}", render_board(&snapshots.borrow_and_update()));
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = render_board(&snapshots.borrow_and_update());
                println!("{text}");
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    board.stop().await;
    Ok(())
}

async fn serve(config: BoardConfig, api: Arc<ApiClient>, port: u16) -> Result<(), CliError> {
    let bootstrap = Bootstrap::load(api.as_ref()).await?;
    let transport = Arc::new(StompTransport::new(config.stomp_config()));
    let board = Arc::new(RealtimeBoard::start(transport, config.board_options(), bootstrap).await);

    let app = boxboard::routes::app(AppState::new(Arc::clone(&board), api));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    info!(%port, "boxboard listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    board.stop().await;
    Ok(())
}
