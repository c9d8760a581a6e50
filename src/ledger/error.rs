//! Error types for the marketplace ledger.

use thiserror::Error;

use crate::amount::Quantity;
use crate::model::{ListingId, TxId, UserId};

/// Top-level error returned by [`Ledger::apply`](super::Ledger::apply).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("create failed: {0}")]
    Create(#[from] CreateError),

    #[error("{0}")]
    Proof(#[from] ProofError),

    #[error("{0}")]
    Decision(#[from] DecisionError),
}

/// Error in listing catalog bookkeeping.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("listing {0} not found")]
    UnknownListing(ListingId),

    #[error("duplicate listing id {0}")]
    DuplicateListing(ListingId),

    #[error("listing {0} has inconsistent purchase bounds")]
    InvalidBounds(ListingId),

    #[error("listing {listing}: requested {requested} exceeds available {available}")]
    InsufficientSupply {
        listing: ListingId,
        requested: Quantity,
        available: Quantity,
    },
}

/// Error during transaction creation.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error("listing {0} not found")]
    UnknownListing(ListingId),

    #[error("duplicate transaction id {0}")]
    DuplicateTxId(TxId),

    #[error("buyer {1} owns listing {0}")]
    SelfTrade(ListingId, UserId),

    #[error("quantity must be positive")]
    QuantityNotPositive,

    #[error("listing {0} sells as a single unit")]
    NotDivisible(ListingId),

    #[error("listing {listing}: requested {requested} exceeds available {available}")]
    ExceedsAvailable {
        listing: ListingId,
        requested: Quantity,
        available: Quantity,
    },
}

/// Error attaching a payment proof.
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("transaction {0} not found")]
    TxNotFound(TxId),

    #[error("transaction {0} is already settled")]
    InvalidState(TxId),
}

/// The decision an admin is applying to a pending transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Error settling a pending transaction.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("{0:?}: transaction {1} not found")]
    TxNotFound(Decision, TxId),

    #[error("{0:?}: transaction {1} is already settled")]
    InvalidState(Decision, TxId),

    #[error("transaction {0} has no payment proof attached")]
    MissingProof(TxId),

    #[error("listing {0} not found")]
    UnknownListing(ListingId),

    #[error("listing {listing}: approving {requested} exceeds available {available}")]
    InsufficientSupply {
        listing: ListingId,
        requested: Quantity,
        available: Quantity,
    },
}
