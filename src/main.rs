use async_trait::async_trait;
use clap::Parser;
use platformvm::{
  cli::CliOpts,
  consumer::{ChainManager, ChainManagerNotifier},
  genesis::Genesis,
  network_id::{network_id, network_name},
  rpc,
  vm::Vm,
};
use std::{sync::Arc, time::Duration};
use tracing::{info, Level};
use tracing_subscriber::{filter::filter_fn, prelude::*, util::SubscriberInitExt};

fn print_essentials(opts: &CliOpts, network: u32) {
  info!("starting platform chain vm demo harness");
  info!("version: {}", env!("CARGO_PKG_VERSION"));
  info!("network: {} ({})", network, network_name(network));
}

/// Stands in for the outer engine's chain manager: logs rather than
/// spinning up a real chain for the created id.
struct LoggingChainManager;

#[async_trait]
impl ChainManager for LoggingChainManager {
  async fn create_chain(&self, chain_id: [u8; 32]) {
    info!("chain manager notified of new chain {}", bs58::encode(chain_id).into_string());
  }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
  let opts = CliOpts::parse();

  let loglevel = match opts.verbose {
    1 => Level::DEBUG,
    2.. => Level::TRACE,
    _ => Level::INFO,
  };
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_filter(filter_fn(move |metadata| metadata.level() <= &loglevel)))
    .init();

  platformvm::init_codec().or_else(|e| {
    // a second invocation of this binary in the same process (tests,
    // repeated demo runs) observes the registry already initialized;
    // that is not a fresh-process fatal error.
    if matches!(&e, platformvm::error::PlatformError::Fatal(msg) if msg.contains("already initialized")) {
      Ok(())
    } else {
      Err(e)
    }
  })?;

  let network = network_id(&opts.network)?;
  print_essentials(&opts, network);

  let genesis = Genesis::for_network(network)?;
  let genesis_bytes = genesis.marshal()?;

  let db_dir = match &opts.db {
    Some(path) => path.clone(),
    None => tempfile::tempdir()?.into_path(),
  };
  let (vm, mut scheduler_handle) = Vm::initialize(&db_dir, &genesis_bytes, &[])?;
  vm.set_chain_manager(Arc::new(ChainManagerNotifier::new(Arc::new(LoggingChainManager)))).await;

  if let Some(addr) = opts.rpc_addr {
    let router = rpc::create_handlers(vm.clone(), network).merge(rpc::create_static_handlers());
    info!("rpc listening on {addr}");
    tokio::spawn(async move {
      let _ = axum::Server::bind(&addr).serve(router.into_make_service()).await;
    });
  }

  // drive a few build/accept cycles so the demo harness exercises the
  // scheduler end to end, standing in for the outer consensus engine's
  // build/verify/accept loop.
  for _ in 0..3 {
    match vm.build_block().await? {
      Some(block) => {
        let id = block.id;
        info!("built block {}", bs58::encode(id).into_string());
        vm.verify_and_insert(block).await?;
        vm.accept(&id).await?;
      }
      None => {
        tokio::select! {
          _ = scheduler_handle.notify.changed() => {}
          _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
      }
    }
  }

  vm.shutdown().await;
  Ok(())
}
