use std::collections::HashMap;

use crate::amount::{Amount, Quantity};
use crate::model::{AssetKind, Listing, ListingId};

use super::error::CatalogError;

/// In-memory listing catalog. Owns available-quantity bookkeeping.
///
/// Supply is consumed exclusively through [`Catalog::reduce_availability`],
/// whose only caller is the ledger's approve step. Creation and rejection
/// of transactions never touch supply.
#[derive(Debug, Default)]
pub struct Catalog {
    listings: HashMap<ListingId, Listing>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate bounds and publish a listing.
    pub fn publish(&mut self, listing: Listing) -> Result<(), CatalogError> {
        if self.listings.contains_key(&listing.id) {
            return Err(CatalogError::DuplicateListing(listing.id));
        }

        match listing.kind {
            AssetKind::Good => {
                // Goods carry exactly one unit and no fractional bounds.
                if listing.available != Quantity::ONE
                    || listing.min_purchase.is_some()
                    || listing.max_purchase.is_some()
                {
                    return Err(CatalogError::InvalidBounds(listing.id));
                }
            }
            AssetKind::Fractional => {
                if listing.available.is_zero() {
                    return Err(CatalogError::InvalidBounds(listing.id));
                }
                if let (Some(min), Some(max)) = (listing.min_purchase, listing.max_purchase) {
                    if min > max {
                        return Err(CatalogError::InvalidBounds(listing.id));
                    }
                }
                if let Some(max) = listing.max_purchase {
                    if max > listing.available {
                        return Err(CatalogError::InvalidBounds(listing.id));
                    }
                }
            }
        }

        self.listings.insert(listing.id, listing);
        Ok(())
    }

    pub fn get(&self, id: ListingId) -> Result<&Listing, CatalogError> {
        self.listings.get(&id).ok_or(CatalogError::UnknownListing(id))
    }

    /// Remaining supply of a listing.
    pub fn availability(&self, id: ListingId) -> Result<Quantity, CatalogError> {
        self.get(id).map(|listing| listing.available)
    }

    /// Consume supply. Shortfalls are rejected, never clamped.
    pub fn reduce_availability(&mut self, id: ListingId, amount: Quantity) -> Result<(), CatalogError> {
        let listing = self
            .listings
            .get_mut(&id)
            .ok_or(CatalogError::UnknownListing(id))?;

        let remaining = listing
            .available
            .checked_sub(amount)
            .ok_or(CatalogError::InsufficientSupply {
                listing: id,
                requested: amount,
                available: listing.available,
            })?;

        listing.available = remaining;
        Ok(())
    }

    /// Refresh the posted unit price from an external quote. Amounts on
    /// existing transactions are snapshots and do not change.
    pub fn set_unit_price(&mut self, id: ListingId, price: Amount) -> Result<(), CatalogError> {
        let listing = self
            .listings
            .get_mut(&id)
            .ok_or(CatalogError::UnknownListing(id))?;
        listing.unit_price = price;
        Ok(())
    }

    pub fn listings(&self) -> impl Iterator<Item = &Listing> + '_ {
        self.listings.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;

    fn fractional(id: ListingId, available: f64, min: Option<f64>, max: Option<f64>) -> Listing {
        Listing::fractional(
            id,
            10,
            "Solar credits",
            Amount::from_float(100.0),
            Quantity::from_float(available),
            min.map(Quantity::from_float),
            max.map(Quantity::from_float),
        )
    }

    #[test]
    fn publish_and_read_back() {
        let mut catalog = Catalog::new();
        catalog.publish(fractional(1, 5.0, Some(1.0), Some(5.0))).unwrap();

        assert_eq!(catalog.availability(1).unwrap(), Quantity::from_float(5.0));
        assert_eq!(catalog.get(1).unwrap().seller, 10);
    }

    #[test]
    fn publish_duplicate_id_fails() {
        let mut catalog = Catalog::new();
        catalog.publish(fractional(1, 5.0, None, None)).unwrap();

        let result = catalog.publish(fractional(1, 3.0, None, None));
        assert!(matches!(result, Err(CatalogError::DuplicateListing(1))));
    }

    #[test]
    fn publish_min_above_max_fails() {
        let mut catalog = Catalog::new();
        let result = catalog.publish(fractional(1, 5.0, Some(4.0), Some(2.0)));
        assert!(matches!(result, Err(CatalogError::InvalidBounds(1))));
    }

    #[test]
    fn publish_max_above_available_fails() {
        let mut catalog = Catalog::new();
        let result = catalog.publish(fractional(1, 5.0, Some(1.0), Some(8.0)));
        assert!(matches!(result, Err(CatalogError::InvalidBounds(1))));
    }

    #[test]
    fn publish_empty_fractional_fails() {
        let mut catalog = Catalog::new();
        let result = catalog.publish(fractional(1, 0.0, None, None));
        assert!(matches!(result, Err(CatalogError::InvalidBounds(1))));
    }

    #[test]
    fn publish_good_with_bounds_fails() {
        let mut catalog = Catalog::new();
        let mut listing = Listing::good(1, 10, "Calculus notes", Amount::from_float(25.0));
        listing.max_purchase = Some(Quantity::from_float(2.0));
        let result = catalog.publish(listing);
        assert!(matches!(result, Err(CatalogError::InvalidBounds(1))));
    }

    #[test]
    fn reduce_availability_decrements() {
        let mut catalog = Catalog::new();
        catalog.publish(fractional(1, 5.0, None, None)).unwrap();

        catalog.reduce_availability(1, Quantity::from_float(4.0)).unwrap();
        assert_eq!(catalog.availability(1).unwrap(), Quantity::from_float(1.0));
    }

    #[test]
    fn reduce_availability_to_zero_is_allowed() {
        let mut catalog = Catalog::new();
        catalog.publish(fractional(1, 5.0, None, None)).unwrap();

        catalog.reduce_availability(1, Quantity::from_float(5.0)).unwrap();
        assert_eq!(catalog.availability(1).unwrap(), Quantity::ZERO);
    }

    #[test]
    fn reduce_availability_rejects_shortfall() {
        let mut catalog = Catalog::new();
        catalog.publish(fractional(1, 5.0, None, None)).unwrap();

        let result = catalog.reduce_availability(1, Quantity::from_float(6.0));
        assert!(matches!(
            result,
            Err(CatalogError::InsufficientSupply { listing: 1, .. })
        ));
        // Never clamped: supply is untouched on failure.
        assert_eq!(catalog.availability(1).unwrap(), Quantity::from_float(5.0));
    }

    #[test]
    fn reduce_availability_unknown_listing() {
        let mut catalog = Catalog::new();
        let result = catalog.reduce_availability(9, Quantity::ONE);
        assert!(matches!(result, Err(CatalogError::UnknownListing(9))));
    }

    #[test]
    fn set_unit_price_updates_listing() {
        let mut catalog = Catalog::new();
        catalog.publish(fractional(1, 5.0, None, None)).unwrap();

        catalog.set_unit_price(1, Amount::from_float(110.0)).unwrap();
        assert_eq!(catalog.get(1).unwrap().unit_price, Amount::from_float(110.0));
    }
}
