use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use twimulator::config::Config;
use twimulator::engine::Engine;
use twimulator::rest;
use twimulator::webhook::HttpWebhookTransport;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    println!("twimulator {VERSION}");
    println!();
    println!("A Twilio-compatible voice telephony simulator for integration tests");
    println!("and local development. Drives your application's voice webhooks the");
    println!("way the carrier would, without placing a real call.");
    println!();
    println!("USAGE:");
    println!("    twimulator [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --version    Print version and exit");
    println!("    --help       Print this message and exit");
    println!();
    println!("CONFIGURATION:");
    println!("    Reads TOML config from $TWIMULATOR_CONFIG (default ./twimulator.toml).");
    println!("    See twimulator.example.toml for the full set of keys.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--version") => {
            println!("twimulator {VERSION}");
            return Ok(());
        }
        Some("--help") => {
            print_usage();
            return Ok(());
        }
        _ => {}
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "twimulator=info".into()))
        .init();

    let config = Config::load()?;
    server(config).await
}

async fn server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let transport = Arc::new(HttpWebhookTransport::new(config.webhook.timeout(), config.webhook.user_agent.clone()));
    let engine = Engine::new(transport);

    let app = rest::router(engine)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(%addr, "twimulator listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
