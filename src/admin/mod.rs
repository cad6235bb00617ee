use serde::{Deserialize, Serialize};

use crate::assets::{AccountId, Amount, AssetId, TokenVault};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("caller {caller} is not authorized")]
    AccessDenied { caller: AccountId },
}

/// The two facts the ledger core consumes from the administrative layer.
/// Keeping this a trait means the state machine can be verified without any
/// concrete authorization policy.
pub trait AdminGate {
    fn is_paused(&self) -> bool;
    fn root_account(&self) -> &AccountId;
}

/// Concrete gate: a single owner controls the pause toggle, the root-account
/// redirection, and the emergency sweep. Pausing gates the deposit path
/// only; withdraw and claim stay callable so participants can always exit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Operator {
    owner: AccountId,
    root: AccountId,
    paused: bool,
}

impl Operator {
    /// The owner starts out as the root account (the default referral sink
    /// and sweep destination).
    pub fn new(owner: impl Into<AccountId>) -> Self {
        let owner = owner.into();
        Self {
            root: owner.clone(),
            owner,
            paused: false,
        }
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    fn authorize(&self, caller: &AccountId) -> Result<(), AdminError> {
        if caller != &self.owner {
            return Err(AdminError::AccessDenied {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    pub fn pause(&mut self, caller: &AccountId) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.paused = true;
        Ok(())
    }

    pub fn unpause(&mut self, caller: &AccountId) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.paused = false;
        Ok(())
    }

    /// Redirect the default referral sink and sweep destination. Existing
    /// referral edges are not rewired.
    pub fn set_root(&mut self, caller: &AccountId, root: &AccountId) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.root = root.clone();
        Ok(())
    }

    /// Move the vault's entire custody balance of `asset` to the root
    /// account, unconditionally. This ignores outstanding reward and stake
    /// liabilities: sweeping the staked asset leaves later withdraw/claim
    /// calls failing on an under-funded custody balance.
    pub fn sweep(
        &self,
        caller: &AccountId,
        vault: &mut TokenVault,
        asset: &AssetId,
    ) -> Result<Amount, AdminError> {
        self.authorize(caller)?;
        Ok(vault.drain_custody(asset, &self.root))
    }
}

impl AdminGate for Operator {
    fn is_paused(&self) -> bool {
        self.paused
    }

    fn root_account(&self) -> &AccountId {
        &self.root
    }
}
