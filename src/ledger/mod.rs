use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::admin::AdminGate;
use crate::assets::{AccountId, Amount, AssetTransfer, TransferError, TransferPlan};
use crate::referral::ReferralGraph;
use crate::rewards::{self, MIN_STAKE};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("stake of {amount} is below the minimum of {minimum}")]
    BelowMinimumStake { amount: Amount, minimum: Amount },
    #[error("invalid amount {amount} for account {account}")]
    InvalidAmount { account: AccountId, amount: Amount },
    #[error("account {account} has no active stake")]
    InvalidState { account: AccountId },
    #[error("deposits are paused")]
    Paused,
    #[error("asset transfer failed: {0}")]
    Transfer(#[from] TransferError),
    #[error("reentrant ledger call")]
    Reentrancy,
}

/// Per-account ledger record. Accounts are created lazily on first stake and
/// never deleted; a fully withdrawn account keeps its history and totals.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub staked_amount: Amount,
    pub staked_at: u64,
    pub last_claim_at: u64,
    pub active: bool,
    /// Cumulative direct rewards settled to this account.
    pub reward_earnings: Amount,
}

/// Append-only audit record emitted on every state transition.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Staked {
        account: AccountId,
        amount: Amount,
    },
    Unstaked {
        account: AccountId,
        amount: Amount,
    },
    RewardClaimed {
        account: AccountId,
        amount: Amount,
    },
    ReferralAttached {
        account: AccountId,
        referrer: AccountId,
    },
    CommissionPaid {
        referrer: AccountId,
        origin: AccountId,
        amount: Amount,
    },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Earnings {
    pub direct: Amount,
    pub referral: Amount,
}

impl Earnings {
    pub fn total(&self) -> Amount {
        self.direct + self.referral
    }
}

/// Pending payouts computed for one settlement, before anything is moved.
#[derive(Clone, Debug, Default)]
struct Settlement {
    reward: Amount,
    commission: Amount,
    referrer: Option<AccountId>,
}

impl Settlement {
    fn extend_plan(&self, plan: &mut TransferPlan, account: &AccountId) {
        plan.push(account, self.reward);
        if let Some(referrer) = &self.referrer {
            plan.push(referrer, self.commission);
        }
    }
}

/// The staking state machine: a keyed account store, the referral graph, and
/// the append-only event log.
///
/// The three mutating operations share one shape: validate, compute the
/// settlement, build a single [`TransferPlan`], execute it atomically, and
/// only then commit account mutations and events. A failed transfer leaves
/// the ledger byte-identical.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakeLedger {
    accounts: BTreeMap<AccountId, Account>,
    graph: ReferralGraph,
    events: Vec<LedgerEvent>,
    #[serde(skip)]
    entered: bool,
}

impl StakeLedger {
    /// The root account is pre-registered active with zero stake so it can
    /// act as the default referral sink (and collect commissions) without
    /// ever staking itself.
    pub fn new(root: &AccountId) -> Self {
        let mut accounts = BTreeMap::new();
        accounts.insert(
            root.clone(),
            Account {
                active: true,
                ..Account::default()
            },
        );
        Self {
            accounts,
            graph: ReferralGraph::new(),
            events: Vec::new(),
            entered: false,
        }
    }

    /// Reentrancy lock around each mutating operation. Held for the full
    /// call, including the asset-transfer step, so an asset implementation
    /// that calls back into the ledger fails instead of interleaving.
    fn with_guard<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        if self.entered {
            return Err(LedgerError::Reentrancy);
        }
        self.entered = true;
        let result = op(self);
        self.entered = false;
        result
    }

    fn settlement(&self, account: &AccountId, now: u64) -> Settlement {
        let Some(acct) = self.accounts.get(account) else {
            return Settlement::default();
        };
        if !acct.active || acct.staked_amount == 0 {
            return Settlement::default();
        }
        let elapsed = now.saturating_sub(acct.last_claim_at);
        let reward = rewards::accrual(acct.staked_amount, elapsed);
        let referrer = self.graph.referrer_of(account).cloned();
        let commission = match &referrer {
            Some(_) => rewards::commission(reward),
            None => 0,
        };
        Settlement {
            reward,
            commission,
            referrer,
        }
    }

    /// Commit an executed settlement: advance the claim timestamp, credit
    /// the cumulative totals, and emit the audit records.
    fn apply_settlement(&mut self, account: &AccountId, settlement: &Settlement, now: u64) {
        let acct = self.accounts.entry(account.clone()).or_default();
        acct.last_claim_at = now;
        acct.reward_earnings += settlement.reward;
        if settlement.reward > 0 {
            self.events.push(LedgerEvent::RewardClaimed {
                account: account.clone(),
                amount: settlement.reward,
            });
        }
        if let Some(referrer) = &settlement.referrer {
            if settlement.commission > 0 {
                self.graph.record_commission(referrer, settlement.commission);
                self.events.push(LedgerEvent::CommissionPaid {
                    referrer: referrer.clone(),
                    origin: account.clone(),
                    amount: settlement.commission,
                });
            }
        }
    }

    /// Deposit `amount` into the account's stake. An already-active account
    /// settles its pending rewards (against the pre-deposit balance) in the
    /// same atomic step; an inactive account is (re)initialized. The
    /// referrer is attached on the account's first stake ever and never
    /// overwritten afterwards.
    pub fn stake(
        &mut self,
        assets: &mut dyn AssetTransfer,
        gate: &dyn AdminGate,
        account: &AccountId,
        amount: Amount,
        referrer: Option<&AccountId>,
        now: u64,
    ) -> Result<(), LedgerError> {
        self.with_guard(|ledger| {
            if gate.is_paused() {
                return Err(LedgerError::Paused);
            }
            if amount < MIN_STAKE {
                return Err(LedgerError::BelowMinimumStake {
                    amount,
                    minimum: MIN_STAKE,
                });
            }
            let was_active = ledger.accounts.get(account).is_some_and(|a| a.active);
            let settlement = if was_active {
                ledger.settlement(account, now)
            } else {
                Settlement::default()
            };
            let mut plan = TransferPlan::new();
            plan.pull(account, amount);
            settlement.extend_plan(&mut plan, account);
            assets.execute(&plan)?;

            if was_active {
                ledger.apply_settlement(account, &settlement, now);
            } else {
                let acct = ledger.accounts.entry(account.clone()).or_default();
                acct.staked_at = now;
                acct.last_claim_at = now;
                acct.active = true;
            }
            let acct = ledger.accounts.entry(account.clone()).or_default();
            acct.staked_amount += amount;
            ledger.events.push(LedgerEvent::Staked {
                account: account.clone(),
                amount,
            });

            let accounts = &ledger.accounts;
            let attached = ledger
                .graph
                .attach(account, referrer, gate.root_account(), |id| {
                    accounts.get(id).is_some_and(|a| a.active)
                });
            if let Some(referrer) = attached {
                ledger.events.push(LedgerEvent::ReferralAttached {
                    account: account.clone(),
                    referrer,
                });
            }
            Ok(())
        })
    }

    /// Withdraw `amount` of principal, settling pending rewards first in the
    /// same atomic step. A balance that reaches zero deactivates the account
    /// (the record itself persists). Callable while paused.
    pub fn unstake(
        &mut self,
        assets: &mut dyn AssetTransfer,
        account: &AccountId,
        amount: Amount,
        now: u64,
    ) -> Result<(), LedgerError> {
        self.with_guard(|ledger| {
            let staked = match ledger.accounts.get(account) {
                Some(acct) if acct.active => acct.staked_amount,
                _ => {
                    return Err(LedgerError::InvalidState {
                        account: account.clone(),
                    })
                }
            };
            if amount == 0 || amount > staked {
                return Err(LedgerError::InvalidAmount {
                    account: account.clone(),
                    amount,
                });
            }
            let settlement = ledger.settlement(account, now);
            let mut plan = TransferPlan::new();
            settlement.extend_plan(&mut plan, account);
            plan.push(account, amount);
            assets.execute(&plan)?;

            ledger.apply_settlement(account, &settlement, now);
            if let Some(acct) = ledger.accounts.get_mut(account) {
                acct.staked_amount -= amount;
                if acct.staked_amount == 0 {
                    acct.active = false;
                }
            }
            ledger.events.push(LedgerEvent::Unstaked {
                account: account.clone(),
                amount,
            });
            Ok(())
        })
    }

    /// Settle pending rewards only, returning the settled amount (exactly 0
    /// when no time elapsed since the last claim). Advances `last_claim_at`
    /// on success either way. Callable while paused.
    pub fn claim(
        &mut self,
        assets: &mut dyn AssetTransfer,
        account: &AccountId,
        now: u64,
    ) -> Result<Amount, LedgerError> {
        self.with_guard(|ledger| {
            let active = ledger.accounts.get(account).is_some_and(|a| a.active);
            if !active {
                return Err(LedgerError::InvalidState {
                    account: account.clone(),
                });
            }
            let settlement = ledger.settlement(account, now);
            let mut plan = TransferPlan::new();
            settlement.extend_plan(&mut plan, account);
            assets.execute(&plan)?;
            ledger.apply_settlement(account, &settlement, now);
            Ok(settlement.reward)
        })
    }

    /// Reward pending for `account` at `now`, without mutating anything.
    pub fn pending_rewards(&self, account: &AccountId, now: u64) -> Amount {
        self.settlement(account, now).reward
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &Account)> {
        self.accounts.iter()
    }

    pub fn referrer_of(&self, account: &AccountId) -> Option<&AccountId> {
        self.graph.referrer_of(account)
    }

    pub fn referrals(&self, account: &AccountId) -> &[AccountId] {
        self.graph.referrals_of(account)
    }

    pub fn referral_count(&self, account: &AccountId) -> usize {
        self.graph.referral_count(account)
    }

    pub fn total_earnings(&self, account: &AccountId) -> Earnings {
        Earnings {
            direct: self
                .accounts
                .get(account)
                .map(|a| a.reward_earnings)
                .unwrap_or(0),
            referral: self.graph.earnings_of(account),
        }
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Merkle root over the account records and the referral graph, for
    /// cheap state comparison between replicas of the JSON state file.
    pub fn state_root(&self) -> [u8; 32] {
        let mut leaves: Vec<[u8; 32]> = Vec::new();
        for (id, acct) in &self.accounts {
            let mut hasher = Sha256::new();
            hasher.update(b"acct");
            hasher.update(id.as_bytes());
            hasher.update(acct.staked_amount.to_le_bytes());
            hasher.update(acct.staked_at.to_le_bytes());
            hasher.update(acct.last_claim_at.to_le_bytes());
            hasher.update([acct.active as u8]);
            hasher.update(acct.reward_earnings.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
        let mut hasher = Sha256::new();
        hasher.update(b"graph");
        // BTreeMap iteration order makes the JSON encoding deterministic.
        hasher.update(serde_json::to_vec(&self.graph).unwrap_or_default());
        leaves.push(hasher.finalize().into());
        build_merkle(leaves)
    }
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"vaultstake-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
