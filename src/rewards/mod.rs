use crate::assets::Amount;

/// Minimal units per whole token.
pub const ASSET_SCALE: Amount = 1_000_000_000_000_000_000;

/// Smallest accepted deposit.
pub const MIN_STAKE: Amount = ASSET_SCALE;

/// Monthly reward rate on the staked balance, in percent.
pub const MONTHLY_RATE_PERCENT: Amount = 5;

/// 30-day month used by the per-second reward breakdown.
pub const SECONDS_PER_MONTH: u64 = 2_592_000;

/// Share of a settled reward paid to the upstream referrer, in percent.
pub const REFERRAL_RATE_PERCENT: Amount = 10;

/// Reward accrued by `staked` over `elapsed` seconds since the last claim.
///
/// The two truncating divisions run rate-first, then the per-second split.
/// That order systematically rounds the total down against the exact
/// proportional amount and is load-bearing: callers depend on the numeric
/// output bit-for-bit.
pub fn accrual(staked: Amount, elapsed: u64) -> Amount {
    if staked == 0 {
        return 0;
    }
    let monthly = staked * MONTHLY_RATE_PERCENT / 100;
    let per_second = monthly / SECONDS_PER_MONTH as Amount;
    per_second.saturating_mul(elapsed as Amount)
}

/// Referrer commission on a settled reward, truncating.
pub fn commission(reward: Amount) -> Amount {
    reward * REFERRAL_RATE_PERCENT / 100
}
