//! Core domain types for the marketplace ledger.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::amount::{Amount, Quantity};

/// User identifier, issued by the external identity provider.
pub type UserId = u32;

/// Listing identifier.
pub type ListingId = u32;

/// Transaction identifier.
pub type TxId = u32;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Current wall-clock time as a unix timestamp.
pub fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Reference to a payment-proof image held in external object storage.
/// Only the reference string is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRef(String);

impl ProofRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProofRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a listing sells a single discrete item or a divisible asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Good,
    Fractional,
}

/// A sellable catalog entry.
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: ListingId,
    pub seller: UserId,
    pub title: String,
    pub unit_price: Amount,
    pub kind: AssetKind,
    /// Remaining supply. Decremented only when a transaction is approved.
    pub available: Quantity,
    /// Smallest quantity a buyer may request. Fractional listings only.
    pub min_purchase: Option<Quantity>,
    /// Largest quantity a buyer may request. Fractional listings only.
    pub max_purchase: Option<Quantity>,
}

impl Listing {
    /// A discrete item. Goods trade as exactly one unit.
    pub fn good(id: ListingId, seller: UserId, title: impl Into<String>, unit_price: Amount) -> Self {
        Self {
            id,
            seller,
            title: title.into(),
            unit_price,
            kind: AssetKind::Good,
            available: Quantity::ONE,
            min_purchase: None,
            max_purchase: None,
        }
    }

    /// A quantity-divisible asset with optional purchase bounds.
    pub fn fractional(
        id: ListingId,
        seller: UserId,
        title: impl Into<String>,
        unit_price: Amount,
        available: Quantity,
        min_purchase: Option<Quantity>,
        max_purchase: Option<Quantity>,
    ) -> Self {
        Self {
            id,
            seller,
            title: title.into(),
            unit_price,
            kind: AssetKind::Fractional,
            available,
            min_purchase,
            max_purchase,
        }
    }
}

/// Transaction status. Approval and rejection are terminal; the decision
/// stamp lives on the terminal variants so it cannot exist on a pending
/// record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Pending,
    Approved {
        by: UserId,
        at: Timestamp,
    },
    Rejected {
        by: UserId,
        at: Timestamp,
        reason: Option<String>,
    },
}

impl Status {
    pub fn is_pending(&self) -> bool {
        matches!(self, Status::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    pub fn kind(&self) -> StatusKind {
        match self {
            Status::Pending => StatusKind::Pending,
            Status::Approved { .. } => StatusKind::Approved,
            Status::Rejected { .. } => StatusKind::Rejected,
        }
    }
}

/// Status discriminant, used for queue filtering and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusKind::Pending => "pending",
            StatusKind::Approved => "approved",
            StatusKind::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A buyer's claim against a listing, awaiting an admin decision.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TxId,
    pub listing: ListingId,
    pub buyer: UserId,
    /// Denormalized from the listing at creation time.
    pub seller: UserId,
    pub quantity: Quantity,
    /// Quantity x unit price, snapshotted at creation. Never recomputed,
    /// even if the listing is repriced later.
    pub amount: Amount,
    pub proof: Option<ProofRef>,
    pub status: Status,
    pub created_at: Timestamp,
}

impl Transaction {
    /// The rejection reason, when one was recorded.
    pub fn rejection_reason(&self) -> Option<&str> {
        match &self.status {
            Status::Rejected { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }
}

/// A command representing the possible inputs of the ledger.
#[derive(Debug, Clone)]
pub enum Command {
    /// Publish a new listing in the catalog.
    Publish { listing: Listing },
    /// Open a pending transaction against a listing. Never touches supply.
    Create {
        tx: TxId,
        listing: ListingId,
        buyer: UserId,
        quantity: Quantity,
        proof: Option<ProofRef>,
    },
    /// Attach or replace the payment proof on a pending transaction.
    AttachProof { tx: TxId, proof: ProofRef },
    /// Approve a pending transaction, consuming listing supply.
    Approve { tx: TxId, admin: UserId },
    /// Reject a pending transaction. Supply is untouched.
    Reject {
        tx: TxId,
        admin: UserId,
        reason: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn good_listing_sells_one_unit() {
        let listing = Listing::good(1, 10, "Calculus notes", Amount::from_float(25.0));
        assert_eq!(listing.kind, AssetKind::Good);
        assert_eq!(listing.available, Quantity::ONE);
        assert!(listing.min_purchase.is_none());
        assert!(listing.max_purchase.is_none());
    }

    #[test]
    fn status_terminal_checks() {
        assert!(Status::Pending.is_pending());
        assert!(!Status::Pending.is_terminal());
        assert!(Status::Approved { by: 1, at: 0 }.is_terminal());
        assert!(
            Status::Rejected {
                by: 1,
                at: 0,
                reason: None
            }
            .is_terminal()
        );
    }

    #[test]
    fn status_kind_display() {
        assert_eq!(StatusKind::Pending.to_string(), "pending");
        assert_eq!(StatusKind::Approved.to_string(), "approved");
        assert_eq!(StatusKind::Rejected.to_string(), "rejected");
    }

    #[test]
    fn rejection_reason_only_on_rejected() {
        let mut tx = Transaction {
            id: 1,
            listing: 1,
            buyer: 2,
            seller: 3,
            quantity: Quantity::ONE,
            amount: Amount::from_float(10.0),
            proof: None,
            status: Status::Pending,
            created_at: 0,
        };
        assert_eq!(tx.rejection_reason(), None);

        tx.status = Status::Rejected {
            by: 9,
            at: 1,
            reason: Some("proof illegible".to_string()),
        };
        assert_eq!(tx.rejection_reason(), Some("proof illegible"));
    }
}
