//! Marketplace transaction ledger.
//!
//! The ledger is the single source of truth for transaction state and the
//! only mutator of listing supply. Transactions move from `pending` to
//! either `approved` or `rejected`; both outcomes are terminal. Supply is
//! checked, not reserved, at creation time; the authoritative sufficiency
//! check runs inside `approve`, so competing claims settle
//! first-committed-first-served.

use std::collections::HashMap;

use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::amount::{Amount, Quantity};
use crate::model::{
    AssetKind, Command, ListingId, ProofRef, Status, StatusKind, Transaction, TxId, UserId,
    unix_now,
};

mod catalog;
pub use catalog::Catalog;

mod error;
pub use error::{
    CatalogError, CreateError, Decision, DecisionError, LedgerError, ProofError,
};

/// The marketplace transaction ledger.
///
/// Holds the listing catalog and every transaction ever created. Settled
/// transactions are retained for buyer history and auditability.
pub struct Ledger {
    catalog: Catalog,
    transactions: HashMap<TxId, Transaction>,
}

/// Public API
impl Ledger {
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            transactions: HashMap::new(),
        }
    }

    /// Run the ledger over the given command stream.
    pub async fn run(&mut self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(cmd) = stream.next().await {
            // a refused command should not stop the ledger
            let _ = self.apply(cmd);
        }
    }

    /// Apply a single command on top of the current ledger state.
    pub fn apply(&mut self, cmd: Command) -> Result<(), LedgerError> {
        match cmd {
            Command::Publish { listing } => {
                let id = listing.id;
                let result = self.catalog.publish(listing);
                match &result {
                    Ok(()) => info!(listing = id, "listing published"),
                    Err(e) => info!(listing = id, reason = %e, "publish skipped"),
                }
                result?;
            }
            Command::Create {
                tx,
                listing,
                buyer,
                quantity,
                proof,
            } => {
                let result = self.create(tx, listing, buyer, quantity, proof);
                Self::log_result("create", tx, &result);
                result?;
            }
            Command::AttachProof { tx, proof } => {
                let result = self.attach_proof(tx, proof);
                Self::log_result("attach_proof", tx, &result);
                result?;
            }
            Command::Approve { tx, admin } => {
                let result = self.approve(tx, admin);
                Self::log_result("approve", tx, &result);
                result?;
            }
            Command::Reject { tx, admin, reason } => {
                let result = self.reject(tx, admin, reason);
                Self::log_result("reject", tx, &result);
                result?;
            }
        }
        Ok(())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Refresh a listing's posted unit price from an external quote.
    pub fn reprice(&mut self, listing: ListingId, price: Amount) -> Result<(), CatalogError> {
        self.catalog.set_unit_price(listing, price)
    }

    pub fn get(&self, tx: TxId) -> Option<&Transaction> {
        self.transactions.get(&tx)
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.transactions.values()
    }

    /// A buyer's purchase history, settled and pending alike.
    pub fn list_for_buyer(&self, buyer: UserId) -> impl Iterator<Item = &Transaction> + '_ {
        self.transactions.values().filter(move |t| t.buyer == buyer)
    }

    /// The admin review queue. Defaults to pending transactions only.
    pub fn admin_queue(
        &self,
        status: Option<StatusKind>,
    ) -> impl Iterator<Item = &Transaction> + '_ {
        let wanted = status.unwrap_or(StatusKind::Pending);
        self.transactions
            .values()
            .filter(move |t| t.status.kind() == wanted)
    }
}

/// Private API
impl Ledger {
    /// Small helper to log `apply` results
    fn log_result<E: std::fmt::Display>(op: &str, tx: TxId, result: &Result<(), E>) {
        match result {
            Ok(()) => info!(tx, "{op} applied"),
            Err(e) => info!(tx, reason = %e, "{op} skipped"),
        }
    }

    /// Open a pending transaction:
    /// - Ensure transaction ID is unique
    /// - Forbid self-trade and non-positive or indivisible quantities
    /// - Check (without reserving) quantity against current supply
    /// - Snapshot `amount` from the listing's current unit price
    fn create(
        &mut self,
        tx: TxId,
        listing_id: ListingId,
        buyer: UserId,
        quantity: Quantity,
        proof: Option<ProofRef>,
    ) -> Result<(), CreateError> {
        if self.transactions.contains_key(&tx) {
            return Err(CreateError::DuplicateTxId(tx));
        }

        let listing = self
            .catalog
            .get(listing_id)
            .map_err(|_| CreateError::UnknownListing(listing_id))?;

        if listing.seller == buyer {
            return Err(CreateError::SelfTrade(listing_id, buyer));
        }
        if quantity.is_zero() {
            return Err(CreateError::QuantityNotPositive);
        }
        if listing.kind == AssetKind::Good && quantity != Quantity::ONE {
            return Err(CreateError::NotDivisible(listing_id));
        }
        if quantity > listing.available {
            return Err(CreateError::ExceedsAvailable {
                listing: listing_id,
                requested: quantity,
                available: listing.available,
            });
        }

        let record = Transaction {
            id: tx,
            listing: listing_id,
            buyer,
            seller: listing.seller,
            quantity,
            amount: listing.unit_price.times(quantity),
            proof,
            status: Status::Pending,
            created_at: unix_now(),
        };
        self.transactions.insert(tx, record);

        Ok(())
    }

    /// Attach or replace the payment proof on a pending transaction.
    /// Attaching the same reference again is a no-op; a terminal
    /// transaction is never touched.
    fn attach_proof(&mut self, tx_id: TxId, proof: ProofRef) -> Result<(), ProofError> {
        let tx = self
            .transactions
            .get_mut(&tx_id)
            .ok_or(ProofError::TxNotFound(tx_id))?;

        if tx.status.is_terminal() {
            return Err(ProofError::InvalidState(tx_id));
        }

        tx.proof = Some(proof);
        Ok(())
    }

    /// Approve a pending transaction:
    /// - Require an attached proof
    /// - Re-validate quantity against current supply; the supply may have
    ///   shrunk since creation through other approvals
    /// - Decrement supply and stamp the terminal state
    ///
    /// On a shortfall the transaction stays pending so the admin can
    /// reject it or revisit it.
    fn approve(&mut self, tx_id: TxId, admin: UserId) -> Result<(), DecisionError> {
        let tx = self
            .transactions
            .get(&tx_id)
            .ok_or(DecisionError::TxNotFound(Decision::Approve, tx_id))?;

        if tx.status.is_terminal() {
            return Err(DecisionError::InvalidState(Decision::Approve, tx_id));
        }
        if tx.proof.is_none() {
            return Err(DecisionError::MissingProof(tx_id));
        }

        let (listing, quantity) = (tx.listing, tx.quantity);
        match self.catalog.reduce_availability(listing, quantity) {
            Ok(()) => {}
            Err(CatalogError::InsufficientSupply {
                listing,
                requested,
                available,
            }) => {
                warn!(
                    tx = tx_id,
                    listing,
                    requested = %requested,
                    available = %available,
                    "approval exceeds remaining supply"
                );
                return Err(DecisionError::InsufficientSupply {
                    listing,
                    requested,
                    available,
                });
            }
            Err(_) => return Err(DecisionError::UnknownListing(listing)),
        }

        let tx = self
            .transactions
            .get_mut(&tx_id)
            .ok_or(DecisionError::TxNotFound(Decision::Approve, tx_id))?;
        tx.status = Status::Approved {
            by: admin,
            at: unix_now(),
        };

        Ok(())
    }

    /// Reject a pending transaction. Supply is untouched; the reason, if
    /// any, is recorded on the terminal state.
    fn reject(
        &mut self,
        tx_id: TxId,
        admin: UserId,
        reason: Option<String>,
    ) -> Result<(), DecisionError> {
        let tx = self
            .transactions
            .get_mut(&tx_id)
            .ok_or(DecisionError::TxNotFound(Decision::Reject, tx_id))?;

        if tx.status.is_terminal() {
            return Err(DecisionError::InvalidState(Decision::Reject, tx_id));
        }

        tx.status = Status::Rejected {
            by: admin,
            at: unix_now(),
            reason,
        };

        Ok(())
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
