//! Quantity negotiation for purchase requests.
//!
//! Pure pre-check run by a buyer's client before a transaction is created.
//! Nothing here is authoritative: the ledger re-validates the final
//! quantity at creation time and again at approval time.

use crate::amount::{Amount, Quantity};
use crate::model::{AssetKind, Listing};

/// Floor applied when a fractional listing sets no minimum purchase.
fn default_min() -> Quantity {
    Quantity::from_scaled(100) // 0.01
}

/// Purchase bounds derived from a listing. Goods trade as exactly one unit.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub floor: Quantity,
    pub ceiling: Quantity,
    pub available: Quantity,
}

pub fn bounds(listing: &Listing) -> Bounds {
    match listing.kind {
        AssetKind::Good => Bounds {
            floor: Quantity::ONE,
            ceiling: Quantity::ONE.min(listing.available),
            available: listing.available,
        },
        AssetKind::Fractional => Bounds {
            floor: listing.min_purchase.unwrap_or_else(default_min),
            ceiling: match listing.max_purchase {
                Some(max) => max.min(listing.available),
                None => listing.available,
            },
            available: listing.available,
        },
    }
}

/// Advisory raised while clamping a request to the listing bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    BelowMinimum,
    AboveMaximum,
    ExceedsAvailable,
}

/// Outcome of clamping a requested quantity to a listing's bounds.
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub quantity: Quantity,
    pub total: Amount,
    pub advisory: Option<Advisory>,
    /// False when even the clamped quantity exceeds remaining supply, i.e.
    /// the listing can no longer satisfy its own minimum purchase. Such a
    /// result must be treated as a validation failure, not submitted.
    pub satisfiable: bool,
}

/// Clamp `requested` to the listing's purchase bounds and price the result.
///
/// The ceiling (`min(max_purchase, available)`) is applied before the
/// floor, so when remaining supply sits below the minimum purchase the
/// result is the unsatisfiable minimum rather than a silently short fill.
pub fn negotiate(listing: &Listing, requested: Quantity, unit_price: Amount) -> Negotiated {
    let b = bounds(listing);

    let mut quantity = requested;
    let mut advisory = None;

    if quantity > b.ceiling {
        advisory = Some(if b.ceiling == b.available {
            Advisory::ExceedsAvailable
        } else {
            Advisory::AboveMaximum
        });
        quantity = b.ceiling;
    }
    if quantity < b.floor {
        advisory = Some(Advisory::BelowMinimum);
        quantity = b.floor;
    }

    let satisfiable = quantity <= b.available;
    if !satisfiable {
        advisory = Some(Advisory::ExceedsAvailable);
    }

    Negotiated {
        quantity,
        total: unit_price.times(quantity),
        advisory,
        satisfiable,
    }
}

/// Increment used by client-side quantity steppers, coarsening with
/// magnitude. Purely a UX affordance; validation never consults it.
pub fn step_for(quantity: Quantity) -> Quantity {
    if quantity < Quantity::from_float(10.0) {
        Quantity::from_scaled(100) // 0.01
    } else if quantity < Quantity::from_float(100.0) {
        Quantity::from_scaled(1_000) // 0.1
    } else {
        Quantity::ONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(available: f64, min: Option<f64>, max: Option<f64>) -> Listing {
        Listing::fractional(
            1,
            10,
            "Solar credits",
            Amount::from_float(100.0),
            Quantity::from_float(available),
            min.map(Quantity::from_float),
            max.map(Quantity::from_float),
        )
    }

    #[test]
    fn in_bounds_request_passes_through() {
        let l = listing(5.0, Some(1.0), Some(10.0));
        let n = negotiate(&l, Quantity::from_float(3.0), l.unit_price);
        assert_eq!(n.quantity, Quantity::from_float(3.0));
        assert_eq!(n.total, Amount::from_float(300.0));
        assert_eq!(n.advisory, None);
        assert!(n.satisfiable);
    }

    #[test]
    fn below_minimum_clamps_up() {
        let l = listing(50.0, Some(2.0), Some(10.0));
        let n = negotiate(&l, Quantity::from_float(0.5), l.unit_price);
        assert_eq!(n.quantity, Quantity::from_float(2.0));
        assert_eq!(n.advisory, Some(Advisory::BelowMinimum));
        assert!(n.satisfiable);
    }

    #[test]
    fn above_maximum_clamps_down() {
        let l = listing(50.0, Some(1.0), Some(10.0));
        let n = negotiate(&l, Quantity::from_float(12.0), l.unit_price);
        assert_eq!(n.quantity, Quantity::from_float(10.0));
        assert_eq!(n.advisory, Some(Advisory::AboveMaximum));
        assert!(n.satisfiable);
    }

    #[test]
    fn above_available_clamps_to_available() {
        let l = listing(4.0, Some(1.0), Some(10.0));
        let n = negotiate(&l, Quantity::from_float(7.0), l.unit_price);
        assert_eq!(n.quantity, Quantity::from_float(4.0));
        assert_eq!(n.advisory, Some(Advisory::ExceedsAvailable));
        assert!(n.satisfiable);
    }

    #[test]
    fn supply_below_minimum_is_unsatisfiable() {
        let l = listing(0.5, Some(1.0), Some(10.0));
        let n = negotiate(&l, Quantity::from_float(3.0), l.unit_price);
        // Clamped to the minimum, which supply cannot cover.
        assert_eq!(n.quantity, Quantity::from_float(1.0));
        assert_eq!(n.advisory, Some(Advisory::ExceedsAvailable));
        assert!(!n.satisfiable);
    }

    #[test]
    fn default_minimum_applies_when_unset() {
        let l = listing(5.0, None, None);
        let n = negotiate(&l, Quantity::ZERO, l.unit_price);
        assert_eq!(n.quantity, Quantity::from_scaled(100)); // 0.01
        assert_eq!(n.advisory, Some(Advisory::BelowMinimum));
        assert!(n.satisfiable);
    }

    #[test]
    fn total_uses_supplied_unit_price() {
        let l = listing(5.0, Some(1.0), None);
        let quoted = Amount::from_float(101.5);
        let n = negotiate(&l, Quantity::from_float(2.0), quoted);
        assert_eq!(n.total, Amount::from_float(203.0));
    }

    #[test]
    fn good_clamps_to_one_unit() {
        let l = Listing::good(2, 10, "Calculus notes", Amount::from_float(25.0));
        let n = negotiate(&l, Quantity::from_float(3.0), l.unit_price);
        assert_eq!(n.quantity, Quantity::ONE);
        assert!(n.satisfiable);

        let n = negotiate(&l, Quantity::ZERO, l.unit_price);
        assert_eq!(n.quantity, Quantity::ONE);
        assert_eq!(n.advisory, Some(Advisory::BelowMinimum));
    }

    #[test]
    fn sold_out_good_is_unsatisfiable() {
        let mut l = Listing::good(2, 10, "Calculus notes", Amount::from_float(25.0));
        l.available = Quantity::ZERO;
        let n = negotiate(&l, Quantity::ONE, l.unit_price);
        assert!(!n.satisfiable);
        assert_eq!(n.advisory, Some(Advisory::ExceedsAvailable));
    }

    #[test]
    fn step_coarsens_with_magnitude() {
        assert_eq!(step_for(Quantity::from_float(0.5)), Quantity::from_scaled(100));
        assert_eq!(step_for(Quantity::from_float(9.99)), Quantity::from_scaled(100));
        assert_eq!(step_for(Quantity::from_float(10.0)), Quantity::from_scaled(1_000));
        assert_eq!(step_for(Quantity::from_float(99.9)), Quantity::from_scaled(1_000));
        assert_eq!(step_for(Quantity::from_float(100.0)), Quantity::ONE);
    }
}
