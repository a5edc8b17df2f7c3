use super::Address;
use serde::{Deserialize, Serialize};

/// `(address, nonce, balance)`, unique by address. Created by genesis or a
/// transfer; mutated by any transaction that debits/credits it; never
/// deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
  pub address: Address,
  pub nonce: u64,
  pub balance: u64,
}

impl Account {
  pub fn new(address: Address, balance: u64) -> Self {
    Self { address, nonce: 0, balance }
  }

  pub fn debit(&mut self, amount: u64) -> Result<(), super::super::error::PlatformError> {
    self.balance.checked_sub(amount).map(|b| self.balance = b).ok_or_else(|| {
      super::super::error::PlatformError::user(format!(
        "insufficient balance: have {}, need {amount}",
        self.balance
      ))
    })
  }

  pub fn credit(&mut self, amount: u64) {
    self.balance = self.balance.saturating_add(amount);
  }

  #[cfg(test)]
  pub fn test_new(balance: u64) -> Self {
    Self { address: Address::from_bytes([1u8; 20]), nonce: 0, balance }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn debit_fails_on_insufficient_balance() {
    let mut a = Account::test_new(5);
    assert!(a.debit(10).is_err());
    assert_eq!(a.balance, 5);
  }

  #[test]
  fn credit_and_debit_roundtrip() {
    let mut a = Account::test_new(5);
    a.credit(10);
    assert_eq!(a.balance, 15);
    a.debit(15).unwrap();
    assert_eq!(a.balance, 0);
  }
}
