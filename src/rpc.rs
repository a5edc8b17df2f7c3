//! A thin read-only introspection mount. Full account/transaction REST
//! business logic lives outside this crate — this only exposes enough
//! to answer "is the platform chain vm alive and what does it think the
//! network looks like", for the demo harness and for operators poking
//! at a running node.

use crate::{constants::DEFAULT_SUBNET, network_id::network_name, vm::Vm};
use axum::{extract::Path, routing::get, Extension, Json, Router};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
struct SharedState {
  vm: Arc<Vm>,
  network_id: u32,
}

/// Mounts the "platform" RPC service, named to match the outer engine's
/// `CreateHandlers`/`CreateStaticHandlers` contract.
pub fn create_handlers(vm: Arc<Vm>, network_id: u32) -> Router {
  let state = SharedState { vm, network_id };
  Router::new()
    .route("/health", get(health))
    .route("/network", get(network))
    .route("/blocks/:id", get(get_block))
    .route("/genesis", get(genesis))
    .route("/chain-time", get(chain_time))
    .route("/validators/:subnet", get(validators))
    .layer(Extension(state))
}

pub fn create_static_handlers() -> Router {
  Router::new().route("/version", get(|| async { Json(json!({ "version": env!("CARGO_PKG_VERSION") })) }))
}

async fn health() -> Json<serde_json::Value> {
  Json(json!({ "status": "ok" }))
}

async fn network(Extension(state): Extension<SharedState>) -> Json<serde_json::Value> {
  Json(json!({
    "network_id": state.network_id,
    "network_name": network_name(state.network_id),
  }))
}

fn decode_id(id: &str) -> Option<[u8; 32]> {
  let bytes = bs58::decode(id).into_vec().ok()?;
  if bytes.len() != 32 {
    return None;
  }
  let mut out = [0u8; 32];
  out.copy_from_slice(&bytes);
  Some(out)
}

async fn get_block(Extension(state): Extension<SharedState>, Path(id): Path<String>) -> Json<serde_json::Value> {
  let Some(block_id) = decode_id(&id) else {
    return Json(json!({ "error": "invalid block id" }));
  };
  match state.vm.get_block(&block_id).await {
    Ok(Some(block)) => Json(json!({ "id": id, "height": block.height })),
    Ok(None) => Json(json!({ "error": "unknown block" })),
    Err(e) => Json(json!({ "error": e.to_string() })),
  }
}

async fn genesis(Extension(state): Extension<SharedState>) -> Json<serde_json::Value> {
  let genesis = state.vm.genesis().await;
  Json(json!({
    "timestamp": genesis.timestamp,
    "message": genesis.message,
    "accounts": genesis.accounts,
    "validators": genesis.validators,
    "chains": genesis.chains,
  }))
}

async fn chain_time(Extension(state): Extension<SharedState>) -> Json<serde_json::Value> {
  match state.vm.chain_time().await {
    Ok(t) => Json(json!({ "chain_time": t })),
    Err(e) => Json(json!({ "error": e.to_string() })),
  }
}

async fn validators(Extension(state): Extension<SharedState>, Path(subnet): Path<String>) -> Json<serde_json::Value> {
  let subnet_id = if subnet == "default" {
    DEFAULT_SUBNET
  } else {
    match decode_id(&subnet) {
      Some(id) => id,
      None => return Json(json!({ "error": "invalid subnet id" })),
    }
  };
  match state.vm.current_validators(&subnet_id).await {
    Ok(validators) => Json(json!({ "validators": validators })),
    Err(e) => Json(json!({ "error": e.to_string() })),
  }
}
