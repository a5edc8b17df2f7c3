use thiserror::Error;

/// Error taxonomy for the platform chain virtual machine: fatal errors
/// halt the VM, transient errors are surfaced and retried by the
/// scheduler on the next trigger, user errors reject a transaction
/// without crashing, and block errors reject a block (its descendants
/// follow).
#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("fatal: {0}")]
  Fatal(String),

  #[error("transient storage error: {0}")]
  Transient(#[from] sled::Error),

  #[error("user error: {0}")]
  UserError(String),

  #[error("block error: {0}")]
  BlockError(String),

  #[error("codec error: {0}")]
  Codec(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

impl PlatformError {
  pub fn user(msg: impl Into<String>) -> Self {
    Self::UserError(msg.into())
  }

  pub fn block(msg: impl Into<String>) -> Self {
    Self::BlockError(msg.into())
  }

  pub fn fatal(msg: impl Into<String>) -> Self {
    Self::Fatal(msg.into())
  }
}
