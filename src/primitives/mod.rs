mod account;
mod address;
mod keys;

pub use account::Account;
pub use address::Address;
pub use keys::Keypair;
