use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::assets::{AccountId, Amount};

/// Single-level referral attribution: one write-once upstream referrer per
/// account, an append-only downstream list per referrer, and cumulative
/// commission earnings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferralGraph {
    referrers: BTreeMap<AccountId, AccountId>,
    referrals: BTreeMap<AccountId, Vec<AccountId>>,
    earnings: BTreeMap<AccountId, Amount>,
}

impl ReferralGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn referrer_of(&self, account: &AccountId) -> Option<&AccountId> {
        self.referrers.get(account)
    }

    pub fn referrals_of(&self, account: &AccountId) -> &[AccountId] {
        self.referrals
            .get(account)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn referral_count(&self, account: &AccountId) -> usize {
        self.referrals_of(account).len()
    }

    pub fn earnings_of(&self, account: &AccountId) -> Amount {
        self.earnings.get(account).copied().unwrap_or(0)
    }

    /// Attach a referrer to `invitee` on its first stake. A requested
    /// referrer is accepted only if it is non-empty, not the invitee itself,
    /// and currently active; anything else falls back to the root account.
    /// The root account alone never gets a referrer. Returns the referrer
    /// actually attached, or `None` when the edge already exists (or the
    /// invitee is the root).
    pub fn attach(
        &mut self,
        invitee: &AccountId,
        requested: Option<&AccountId>,
        root: &AccountId,
        is_active: impl Fn(&AccountId) -> bool,
    ) -> Option<AccountId> {
        if invitee == root || self.referrers.contains_key(invitee) {
            return None;
        }
        let referrer = match requested {
            Some(r) if !r.is_empty() && r != invitee && is_active(r) => r.clone(),
            _ => root.clone(),
        };
        self.referrers.insert(invitee.clone(), referrer.clone());
        self.referrals
            .entry(referrer.clone())
            .or_default()
            .push(invitee.clone());
        Some(referrer)
    }

    pub fn record_commission(&mut self, referrer: &AccountId, amount: Amount) {
        *self.earnings.entry(referrer.clone()).or_default() += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> AccountId {
        "root".to_string()
    }

    #[test]
    fn active_referrer_is_attached_as_given() {
        let mut graph = ReferralGraph::new();
        let attached = graph.attach(&"bob".into(), Some(&"alice".into()), &root(), |_| true);
        assert_eq!(attached, Some("alice".to_string()));
        assert_eq!(graph.referrer_of(&"bob".into()), Some(&"alice".to_string()));
        assert_eq!(graph.referrals_of(&"alice".into()), ["bob".to_string()]);
    }

    #[test]
    fn inactive_referrer_falls_back_to_root() {
        let mut graph = ReferralGraph::new();
        let attached = graph.attach(&"bob".into(), Some(&"ghost".into()), &root(), |_| false);
        assert_eq!(attached, Some(root()));
        assert_eq!(graph.referral_count(&root()), 1);
    }

    #[test]
    fn self_referral_falls_back_to_root() {
        let mut graph = ReferralGraph::new();
        let attached = graph.attach(&"bob".into(), Some(&"bob".into()), &root(), |_| true);
        assert_eq!(attached, Some(root()));
    }

    #[test]
    fn missing_or_empty_referrer_falls_back_to_root() {
        let mut graph = ReferralGraph::new();
        assert_eq!(graph.attach(&"bob".into(), None, &root(), |_| true), Some(root()));
        assert_eq!(
            graph.attach(&"carol".into(), Some(&"".into()), &root(), |_| true),
            Some(root())
        );
    }

    #[test]
    fn root_never_gets_a_referrer() {
        let mut graph = ReferralGraph::new();
        assert_eq!(graph.attach(&root(), Some(&"alice".into()), &root(), |_| true), None);
        assert_eq!(graph.referrer_of(&root()), None);
    }

    #[test]
    fn referrer_is_write_once() {
        let mut graph = ReferralGraph::new();
        graph.attach(&"bob".into(), Some(&"alice".into()), &root(), |_| true);
        let second = graph.attach(&"bob".into(), Some(&"mallory".into()), &root(), |_| true);
        assert_eq!(second, None);
        assert_eq!(graph.referrer_of(&"bob".into()), Some(&"alice".to_string()));
        assert_eq!(graph.referral_count(&"alice".into()), 1);
    }

    #[test]
    fn referral_list_preserves_attachment_order() {
        let mut graph = ReferralGraph::new();
        graph.attach(&"bob".into(), Some(&"alice".into()), &root(), |_| true);
        graph.attach(&"carol".into(), Some(&"alice".into()), &root(), |_| true);
        assert_eq!(
            graph.referrals_of(&"alice".into()),
            ["bob".to_string(), "carol".to_string()]
        );
    }

    #[test]
    fn commissions_accumulate() {
        let mut graph = ReferralGraph::new();
        graph.record_commission(&"alice".into(), 40);
        graph.record_commission(&"alice".into(), 2);
        assert_eq!(graph.earnings_of(&"alice".into()), 42);
        assert_eq!(graph.earnings_of(&"bob".into()), 0);
    }
}
