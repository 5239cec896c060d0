pub mod bridge;
pub mod buffer;
pub mod config;
pub mod crypto;
pub mod datapath;
pub mod error;
pub mod header;
pub mod identity;
pub mod router;
pub mod socket;
pub mod supervisor;
pub mod tunnel;

pub use error::{Error, Result};

/// Name of the multi-queue tun device every node creates.
pub const TUN_DEVICE_NAME: &str = "radvpn";

/// Maximum size of a packet buffer: 1500-byte Ethernet MTU plus slack.
pub const MAX_PACKET_SIZE: usize = 1518;

/// Initializes the global `tracing` subscriber used by the binary entry
/// point. Library consumers embedding the datapath in their own process are
/// free to install their own subscriber instead.
pub fn init_tracing() -> Result<()> {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::EnvFilter;

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with_line_number(true)
            .with_file(true)
            .finish(),
    )
    .map_err(|e| format!("failed to install tracing subscriber: {e}").into())
}
