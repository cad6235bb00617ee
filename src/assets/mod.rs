use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type AccountId = String;
pub type AssetId = String;
pub type Amount = u128;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("insufficient funds in account {account}")]
    InsufficientAccountFunds { account: AccountId },
    #[error("insufficient custody balance for asset {asset}")]
    InsufficientCustody { asset: AssetId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferStep {
    /// Move `amount` from a holder's balance into custody.
    Pull { from: AccountId, amount: Amount },
    /// Move `amount` out of custody into a holder's balance.
    Push { to: AccountId, amount: Amount },
}

/// An ordered batch of transfer steps that an [`AssetTransfer`] applies
/// atomically. Zero-amount steps are never recorded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferPlan {
    steps: Vec<TransferStep>,
}

impl TransferPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pull(&mut self, from: &AccountId, amount: Amount) {
        if amount > 0 {
            self.steps.push(TransferStep::Pull {
                from: from.clone(),
                amount,
            });
        }
    }

    pub fn push(&mut self, to: &AccountId, amount: Amount) {
        if amount > 0 {
            self.steps.push(TransferStep::Push {
                to: to.clone(),
                amount,
            });
        }
    }

    pub fn steps(&self) -> &[TransferStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Asset movement consumed by the ledger. `execute` applies every step of
/// the plan or none of them; a failed plan must leave no partial effects.
pub trait AssetTransfer {
    fn execute(&mut self, plan: &TransferPlan) -> Result<(), TransferError>;
}

/// Per-asset balances plus the custody total held on behalf of depositors.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetBook {
    holders: BTreeMap<AccountId, Amount>,
    custody: Amount,
}

impl AssetBook {
    fn debit_holder(&mut self, account: &AccountId, amount: Amount) -> Result<(), TransferError> {
        let balance = self.holders.entry(account.clone()).or_default();
        if *balance < amount {
            return Err(TransferError::InsufficientAccountFunds {
                account: account.clone(),
            });
        }
        *balance -= amount;
        Ok(())
    }

    fn credit_holder(&mut self, account: &AccountId, amount: Amount) {
        *self.holders.entry(account.clone()).or_default() += amount;
    }
}

/// In-memory multi-asset vault. One designated asset is the staked asset the
/// ledger transacts in; `sweep` support and the demo faucet work over
/// arbitrary assets.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenVault {
    staked_asset: AssetId,
    books: BTreeMap<AssetId, AssetBook>,
}

impl TokenVault {
    pub fn new(staked_asset: impl Into<AssetId>) -> Self {
        Self {
            staked_asset: staked_asset.into(),
            books: BTreeMap::new(),
        }
    }

    pub fn staked_asset(&self) -> &AssetId {
        &self.staked_asset
    }

    pub fn mint(&mut self, asset: &AssetId, account: &AccountId, amount: Amount) {
        self.books
            .entry(asset.clone())
            .or_default()
            .credit_holder(account, amount);
    }

    pub fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount {
        self.books
            .get(asset)
            .and_then(|book| book.holders.get(account))
            .copied()
            .unwrap_or(0)
    }

    pub fn custody_of(&self, asset: &AssetId) -> Amount {
        self.books.get(asset).map(|book| book.custody).unwrap_or(0)
    }

    /// Move the entire custody balance of `asset` to a holder, returning the
    /// amount moved. Outstanding liabilities are deliberately not checked.
    pub fn drain_custody(&mut self, asset: &AssetId, to: &AccountId) -> Amount {
        let Some(book) = self.books.get_mut(asset) else {
            return 0;
        };
        let moved = book.custody;
        book.custody = 0;
        book.credit_holder(to, moved);
        moved
    }
}

impl AssetTransfer for TokenVault {
    fn execute(&mut self, plan: &TransferPlan) -> Result<(), TransferError> {
        // Replay the plan against a scratch copy of the staked-asset book and
        // commit only when every step went through.
        let mut book = self
            .books
            .get(&self.staked_asset)
            .cloned()
            .unwrap_or_default();
        for step in plan.steps() {
            match step {
                TransferStep::Pull { from, amount } => {
                    book.debit_holder(from, *amount)?;
                    book.custody += *amount;
                }
                TransferStep::Push { to, amount } => {
                    if book.custody < *amount {
                        return Err(TransferError::InsufficientCustody {
                            asset: self.staked_asset.clone(),
                        });
                    }
                    book.custody -= *amount;
                    book.credit_holder(to, *amount);
                }
            }
        }
        self.books.insert(self.staked_asset.clone(), book);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault_with(account: &str, amount: Amount) -> TokenVault {
        let mut vault = TokenVault::new("STAKE");
        vault.mint(&"STAKE".to_string(), &account.to_string(), amount);
        vault
    }

    #[test]
    fn pull_then_push_moves_through_custody() {
        let mut vault = vault_with("alice", 1_000);
        let mut plan = TransferPlan::new();
        plan.pull(&"alice".to_string(), 600);
        plan.push(&"bob".to_string(), 250);
        vault.execute(&plan).unwrap();
        assert_eq!(vault.balance_of(&"STAKE".into(), &"alice".into()), 400);
        assert_eq!(vault.balance_of(&"STAKE".into(), &"bob".into()), 250);
        assert_eq!(vault.custody_of(&"STAKE".into()), 350);
    }

    #[test]
    fn failing_plan_leaves_vault_untouched() {
        let mut vault = vault_with("alice", 1_000);
        let before = vault.clone();
        let mut plan = TransferPlan::new();
        plan.pull(&"alice".to_string(), 600);
        plan.push(&"bob".to_string(), 700); // custody only holds 600
        let err = vault.execute(&plan).unwrap_err();
        match err {
            TransferError::InsufficientCustody { asset } => assert_eq!(asset, "STAKE"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(vault, before);
    }

    #[test]
    fn pull_from_underfunded_account_fails_whole_plan() {
        let mut vault = vault_with("alice", 100);
        let before = vault.clone();
        let mut plan = TransferPlan::new();
        plan.pull(&"alice".to_string(), 100);
        plan.pull(&"alice".to_string(), 1);
        assert!(vault.execute(&plan).is_err());
        assert_eq!(vault, before);
    }

    #[test]
    fn zero_amount_steps_are_dropped() {
        let mut plan = TransferPlan::new();
        plan.pull(&"alice".to_string(), 0);
        plan.push(&"bob".to_string(), 0);
        assert!(plan.is_empty());
    }

    #[test]
    fn drain_custody_moves_everything_to_target() {
        let mut vault = vault_with("alice", 1_000);
        let mut plan = TransferPlan::new();
        plan.pull(&"alice".to_string(), 800);
        vault.execute(&plan).unwrap();
        let moved = vault.drain_custody(&"STAKE".into(), &"root".into());
        assert_eq!(moved, 800);
        assert_eq!(vault.custody_of(&"STAKE".into()), 0);
        assert_eq!(vault.balance_of(&"STAKE".into(), &"root".into()), 800);
        // Draining an asset the vault never saw is a no-op.
        assert_eq!(vault.drain_custody(&"OTHER".into(), &"root".into()), 0);
    }
}
