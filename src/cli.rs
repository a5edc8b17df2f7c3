use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};

/// Options for the demo harness binary. This stands in for "the outer
/// engine's host process" purely to exercise the VM end to end; it is
/// not a validator node, consensus engine or P2P client.
#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct CliOpts {
  #[clap(long, help = "network id: a canonical name, a decimal, or network-<decimal>", default_value = "local")]
  pub network: String,

  #[clap(long, parse(from_os_str), help = "directory for the embedded database")]
  pub db: Option<PathBuf>,

  #[clap(long, help = "address to mount the read-only RPC introspection service on")]
  pub rpc_addr: Option<SocketAddr>,

  #[clap(short, long, parse(from_occurrences), help = "use verbose output (-vv very verbose output)")]
  pub verbose: u64,
}
