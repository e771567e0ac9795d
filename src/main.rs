use anyhow::Context;
use clap::Parser;
use http::Method;
use httpsrv::lifecycle::ServiceController;
use httpsrv::runtime_config::ServerConfig;
use httpsrv::server::response::send_text;
use httpsrv::server::MiniHttpEngine;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Embedded-style HTTP control surface demo.
#[derive(Parser, Debug)]
#[command(name = "httpsrv", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080", env = "HTTPSRV_ADDR")]
    addr: String,

    /// Directory served as the static volume; omit to serve only the
    /// embedded fallback pages
    #[arg(long, env = "HTTPSRV_STATIC_DIR")]
    static_dir: Option<String>,

    /// Volume label used in logs
    #[arg(long, default_value = "www", env = "HTTPSRV_STATIC_LABEL")]
    label: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::from_env();
    config.bind_addr = args.addr;
    config.volume_label = args.label;
    if let Some(dir) = args.static_dir {
        config.static_enabled = true;
        config.static_dir = dir;
    }

    let engine = Arc::new(MiniHttpEngine::new(&config));
    let controller = Arc::new(ServiceController::new(engine, config));

    controller.start();
    controller
        .wait_until_running(Duration::from_secs(5))
        .context("service did not come up")?;

    // Sample dynamically registered route.
    let status_body = serde_json::json!({ "status": "ok" }).to_string();
    controller
        .register_uri(
            "/status",
            Method::GET,
            Arc::new(move |_req, sink| {
                send_text(sink, 200, "application/json", &status_body)
            }),
        )
        .context("failed to register /status")?;

    info!("service running; send SIGINT or SIGTERM to stop");
    wait_for_shutdown()?;

    controller.close_all_sessions();
    controller.stop();
    Ok(())
}

#[cfg(unix)]
fn wait_for_shutdown() -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("signal registration failed")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "shutdown signal received");
    }
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown() -> anyhow::Result<()> {
    // No signal support; run until the process is killed.
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}
