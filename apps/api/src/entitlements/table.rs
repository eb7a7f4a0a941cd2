use serde::Serialize;

use crate::errors::AppError;
use crate::models::user::Tier;

/// Monthly post allowance for a tier.
///
/// `Unlimited` is a distinct case rather than a large number, so the guard never
/// compares usage against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowance {
    Limited(i32),
    Unlimited,
}

impl Allowance {
    /// The numeric cap, or `None` when unlimited.
    pub fn limit(&self) -> Option<i32> {
        match self {
            Allowance::Limited(n) => Some(*n),
            Allowance::Unlimited => None,
        }
    }

    pub fn permits(&self, used: i32) -> bool {
        match self {
            Allowance::Limited(n) => used < *n,
            Allowance::Unlimited => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlement {
    pub tier: Tier,
    pub monthly_allowance: Allowance,
    pub price_cents: i64,
}

/// Static tier table. Total over `Tier`; there is no fallback entry.
pub fn entitlement_for(tier: Tier) -> Entitlement {
    let (monthly_allowance, price_cents) = match tier {
        Tier::Free => (Allowance::Limited(5), 0),
        Tier::Starter => (Allowance::Limited(15), 900),
        Tier::Pro => (Allowance::Limited(50), 2900),
        Tier::Enterprise => (Allowance::Unlimited, 9900),
    };
    Entitlement {
        tier,
        monthly_allowance,
        price_cents,
    }
}

/// Looks up a tier by its wire name, failing with `InvalidTier` for anything unknown.
pub fn entitlement_for_name(name: &str) -> Result<Entitlement, AppError> {
    Ok(entitlement_for(name.parse()?))
}

#[derive(Debug, Serialize)]
pub struct PlanView {
    pub tier: Tier,
    pub name: &'static str,
    /// `null` for unlimited.
    pub monthly_allowance: Option<i32>,
    pub price_cents: i64,
    /// Enterprise is sold by the sales team, not through checkout.
    pub self_service: bool,
}

pub fn plan_catalog() -> Vec<PlanView> {
    Tier::ALL
        .iter()
        .map(|&tier| {
            let entitlement = entitlement_for(tier);
            PlanView {
                tier,
                name: tier.display_name(),
                monthly_allowance: entitlement.monthly_allowance.limit(),
                price_cents: entitlement.price_cents,
                self_service: tier != Tier::Enterprise,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tier_has_exactly_one_entry() {
        for tier in Tier::ALL {
            assert_eq!(entitlement_for(tier).tier, tier);
        }
        assert_eq!(plan_catalog().len(), Tier::ALL.len());
    }

    #[test]
    fn test_finite_allowances_are_positive() {
        for tier in Tier::ALL {
            if let Allowance::Limited(n) = entitlement_for(tier).monthly_allowance {
                assert!(n > 0, "{tier} allowance must be positive");
            }
        }
    }

    #[test]
    fn test_known_allowances_and_prices() {
        assert_eq!(entitlement_for(Tier::Free).monthly_allowance, Allowance::Limited(5));
        assert_eq!(entitlement_for(Tier::Starter).monthly_allowance, Allowance::Limited(15));
        assert_eq!(entitlement_for(Tier::Pro).monthly_allowance, Allowance::Limited(50));
        assert_eq!(entitlement_for(Tier::Enterprise).monthly_allowance, Allowance::Unlimited);
        assert_eq!(entitlement_for(Tier::Starter).price_cents, 900);
        assert_eq!(entitlement_for(Tier::Pro).price_cents, 2900);
    }

    #[test]
    fn test_unknown_tier_name_fails_loudly() {
        assert!(matches!(
            entitlement_for_name("platinum"),
            Err(AppError::InvalidTier(_))
        ));
    }

    #[test]
    fn test_unlimited_permits_any_usage() {
        assert!(Allowance::Unlimited.permits(i32::MAX));
        assert!(Allowance::Limited(5).permits(4));
        assert!(!Allowance::Limited(5).permits(5));
    }
}
