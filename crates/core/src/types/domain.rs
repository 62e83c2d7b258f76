//! Counter domains and the counter pair rendered on badges.

use core::fmt;

use serde::{Deserialize, Serialize};

/// One of the two independently tracked collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Cart,
    Wishlist,
}

impl Domain {
    /// Both domains, in refresh order.
    pub const ALL: [Self; 2] = [Self::Cart, Self::Wishlist];

    /// Lowercase name used in logs and storage keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Wishlist => "wishlist",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cart" => Ok(Self::Cart),
            "wishlist" => Ok(Self::Wishlist),
            _ => Err(format!("invalid domain: {s}")),
        }
    }
}

/// A single-step local counter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delta {
    Increment,
    Decrement,
}

impl Delta {
    /// Apply this delta to a count, clamping at zero.
    #[must_use]
    pub const fn apply(self, count: u32) -> u32 {
        match self {
            Self::Increment => count.saturating_add(1),
            Self::Decrement => count.saturating_sub(1),
        }
    }
}

/// Cart and wishlist badge counts.
///
/// Both counts are unsigned; every mutator saturates so neither can go
/// negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub cart_count: u32,
    pub wishlist_count: u32,
}

impl Counters {
    /// Both counters at zero.
    pub const ZERO: Self = Self {
        cart_count: 0,
        wishlist_count: 0,
    };

    /// Create a counter pair.
    #[must_use]
    pub const fn new(cart_count: u32, wishlist_count: u32) -> Self {
        Self {
            cart_count,
            wishlist_count,
        }
    }

    /// Count for one domain.
    #[must_use]
    pub const fn get(&self, domain: Domain) -> u32 {
        match domain {
            Domain::Cart => self.cart_count,
            Domain::Wishlist => self.wishlist_count,
        }
    }

    /// Overwrite the count for one domain.
    pub const fn set(&mut self, domain: Domain, count: u32) {
        match domain {
            Domain::Cart => self.cart_count = count,
            Domain::Wishlist => self.wishlist_count = count,
        }
    }

    /// Apply a clamped delta to one domain.
    pub const fn bump(&mut self, domain: Domain, delta: Delta) {
        self.set(domain, delta.apply(self.get(domain)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrement_clamps_at_zero() {
        let mut counters = Counters::ZERO;
        counters.bump(Domain::Cart, Delta::Decrement);
        counters.bump(Domain::Wishlist, Delta::Decrement);
        assert_eq!(counters, Counters::ZERO);
    }

    #[test]
    fn test_bump_touches_only_its_domain() {
        let mut counters = Counters::new(2, 7);
        counters.bump(Domain::Cart, Delta::Increment);
        assert_eq!(counters, Counters::new(3, 7));
        counters.bump(Domain::Wishlist, Delta::Decrement);
        assert_eq!(counters, Counters::new(3, 6));
    }

    #[test]
    fn test_increment_saturates() {
        assert_eq!(Delta::Increment.apply(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_domain_round_trips_through_str() {
        for domain in Domain::ALL {
            assert_eq!(domain.as_str().parse::<Domain>(), Ok(domain));
        }
        assert!("basket".parse::<Domain>().is_err());
    }

    #[test]
    fn test_counters_serialize_camel_case() {
        let json = serde_json::to_value(Counters::new(1, 2)).unwrap_or_default();
        assert_eq!(json, serde_json::json!({"cartCount": 1, "wishlistCount": 2}));
    }
}
