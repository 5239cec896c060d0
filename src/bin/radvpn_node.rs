//! Process entry point: the external "Bootstrap" collaborator spec.md §1
//! treats as out of scope for the core, kept thin on purpose. Parses the
//! config path, installs tracing (teacher's `FmtSubscriber` setup via
//! `radvpn::init_tracing`), wires up Ctrl-C into the crate-wide
//! cancellation token, and hands off to [`radvpn::datapath::run`].

use clap::Parser;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "radvpn-node", about = "Decentralized mesh VPN dataplane node")]
struct Args {
    /// Path to the node's TOML configuration file.
    #[arg(default_value = "radvpn.toml")]
    config: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = radvpn::init_tracing() {
        eprintln!("failed to install tracing subscriber: {e}");
        std::process::exit(1);
    }

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received interrupt, shutting down");
        shutdown_cancel.cancel();
    });

    if let Err(e) = radvpn::datapath::run(&args.config, cancel).await {
        tracing::error!("fatal startup error: {e}");
        std::process::exit(1);
    }
}
