//! Custody staking ledger with time-proportional rewards and single-level
//! referral commissions.
//!
//! The crate is split into small, focused modules so the core state machine
//! can be verified independently of authorization policy and asset plumbing:
//!
//! * [`assets`] — the asset-transfer seam: all-or-nothing [`assets::TransferPlan`]
//!   batches plus an in-memory multi-asset [`assets::TokenVault`] with a
//!   custody balance per asset.
//! * [`rewards`] — protocol constants and the pure accrual/commission
//!   arithmetic (truncating integer math, rate-then-time order).
//! * [`referral`] — the write-once referral graph and cumulative commission
//!   earnings.
//! * [`admin`] — the pause/root-account gate consumed by the ledger and the
//!   concrete [`admin::Operator`] with its emergency `sweep`.
//! * [`ledger`] — the account store and the three guarded operations
//!   (`stake`, `unstake`, `claim`), together with the append-only event log
//!   and a merkleized state root.
//!
//! Mutating ledger state is all-or-nothing per call: every operation builds a
//! single transfer plan, executes it atomically against the vault, and only
//! then commits its account mutations and events.

pub mod admin;
pub mod assets;
pub mod ledger;
pub mod referral;
pub mod rewards;

pub use admin::{AdminError, AdminGate, Operator};
pub use assets::{
    AccountId, Amount, AssetId, AssetTransfer, TokenVault, TransferError, TransferPlan,
};
pub use ledger::{Account, Earnings, LedgerError, LedgerEvent, StakeLedger};
pub use referral::ReferralGraph;
