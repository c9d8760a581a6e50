//! Buyer and admin coordination on top of the ledger.
//!
//! The ledger owns all workflow state; this layer adds role checks, proof
//! upload against external object storage, and price refresh for
//! fractional assets. Ledger access is serialized through one async mutex,
//! and no lock is held across an upload or delete.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use crate::amount::{Amount, Quantity};
use crate::ledger::{Ledger, LedgerError};
use crate::model::{AssetKind, Command, Listing, ListingId, ProofRef, StatusKind, Transaction, TxId, UserId};
use crate::negotiate::{self, Negotiated};

/// Role attached to an authenticated user by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Member,
    Admin,
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn member(id: UserId) -> Self {
        Self { id, role: Role::Member }
    }

    pub fn admin(id: UserId) -> Self {
        Self { id, role: Role::Admin }
    }
}

/// External object storage for payment-proof images. The ledger persists
/// only the returned reference.
pub trait ProofStore {
    fn upload(
        &self,
        bytes: &[u8],
    ) -> impl Future<Output = Result<ProofRef, StoreError>> + Send;

    fn delete(&self, proof: &ProofRef) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: ProofStore + Sync + Send> ProofStore for Arc<S> {
    async fn upload(&self, bytes: &[u8]) -> Result<ProofRef, StoreError> {
        (**self).upload(bytes).await
    }

    async fn delete(&self, proof: &ProofRef) -> Result<(), StoreError> {
        (**self).delete(proof).await
    }
}

/// Error from the external proof store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("proof storage unavailable: {0}")]
    Unavailable(String),

    #[error("proof object {0} not found")]
    NotFound(ProofRef),
}

/// External quote source for fractional assets.
pub trait PriceFeed {
    /// Current unit price, if the feed tracks this listing.
    fn quote(&self, listing: ListingId) -> Option<Amount>;
}

/// Feed that never quotes; listings keep their posted price.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoQuotes;

impl PriceFeed for NoQuotes {
    fn quote(&self, _listing: ListingId) -> Option<Amount> {
        None
    }
}

/// Everything an admin needs in front of them to decide a claim.
#[derive(Debug, Clone)]
pub struct Review {
    pub transaction: Transaction,
    pub listing: Listing,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("admin role required")]
    AdminRequired,

    #[error("listing seller must match the caller")]
    SellerMismatch,

    #[error("transaction {0} not found")]
    UnknownTransaction(TxId),

    #[error("transaction {0} does not belong to the caller")]
    NotOwner(TxId),

    #[error("remaining supply cannot satisfy the minimum purchase")]
    Unsatisfiable,

    #[error("proof upload failed: {0}")]
    Upload(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Coordinator for the buyer and admin sides of the purchase workflow.
pub struct Workflow<S, F> {
    ledger: Arc<Mutex<Ledger>>,
    store: S,
    feed: F,
}

impl<S: ProofStore, F: PriceFeed> Workflow<S, F> {
    pub fn new(ledger: Arc<Mutex<Ledger>>, store: S, feed: F) -> Self {
        Self { ledger, store, feed }
    }

    /// Publish a listing on behalf of its seller.
    pub async fn publish(&self, actor: Actor, listing: Listing) -> Result<(), WorkflowError> {
        if listing.seller != actor.id {
            return Err(WorkflowError::SellerMismatch);
        }
        let mut ledger = self.ledger.lock().await;
        ledger.apply(Command::Publish { listing })?;
        Ok(())
    }

    /// Quote-and-clamp pre-check for a purchase form. Advisory only.
    pub async fn preview(
        &self,
        listing_id: ListingId,
        requested: Quantity,
    ) -> Result<Negotiated, WorkflowError> {
        let mut ledger = self.ledger.lock().await;
        self.refresh_price(&mut ledger, listing_id)?;
        let listing = ledger.catalog().get(listing_id).map_err(LedgerError::from)?;
        Ok(negotiate::negotiate(listing, requested, listing.unit_price))
    }

    /// Open a pending transaction for the caller.
    ///
    /// The proof upload completes before the ledger sees the command, so a
    /// failed upload creates nothing. If the ledger refuses the claim the
    /// uploaded image is orphaned and deleted best-effort.
    pub async fn submit(
        &self,
        actor: Actor,
        tx: TxId,
        listing_id: ListingId,
        requested: Quantity,
        proof_image: &[u8],
    ) -> Result<Transaction, WorkflowError> {
        let proof = self.store.upload(proof_image).await?;

        let created = {
            let mut ledger = self.ledger.lock().await;
            self.create_in(&mut ledger, actor, tx, listing_id, requested, proof.clone())
        };

        match created {
            Ok(record) => Ok(record),
            Err(e) => {
                self.discard(&proof).await;
                Err(e)
            }
        }
    }

    /// Attach (or re-attach) a proof to the caller's pending transaction.
    pub async fn attach_proof(
        &self,
        actor: Actor,
        tx: TxId,
        proof_image: &[u8],
    ) -> Result<ProofRef, WorkflowError> {
        {
            let ledger = self.ledger.lock().await;
            let record = ledger.get(tx).ok_or(WorkflowError::UnknownTransaction(tx))?;
            if record.buyer != actor.id {
                return Err(WorkflowError::NotOwner(tx));
            }
        }

        let proof = self.store.upload(proof_image).await?;
        let attached = {
            let mut ledger = self.ledger.lock().await;
            ledger.apply(Command::AttachProof { tx, proof: proof.clone() })
        };

        match attached {
            Ok(()) => Ok(proof),
            Err(e) => {
                self.discard(&proof).await;
                Err(e.into())
            }
        }
    }

    /// The caller's purchase history.
    pub async fn history(&self, actor: Actor) -> Vec<Transaction> {
        let ledger = self.ledger.lock().await;
        ledger.list_for_buyer(actor.id).cloned().collect()
    }

    /// The admin review queue, pending transactions by default.
    pub async fn queue(
        &self,
        actor: Actor,
        status: Option<StatusKind>,
    ) -> Result<Vec<Transaction>, WorkflowError> {
        self.require_admin(actor)?;
        let ledger = self.ledger.lock().await;
        Ok(ledger.admin_queue(status).cloned().collect())
    }

    /// Load a claim with its listing for an admin decision.
    pub async fn review(&self, actor: Actor, tx: TxId) -> Result<Review, WorkflowError> {
        self.require_admin(actor)?;
        let ledger = self.ledger.lock().await;
        let transaction = ledger
            .get(tx)
            .cloned()
            .ok_or(WorkflowError::UnknownTransaction(tx))?;
        let listing = ledger
            .catalog()
            .get(transaction.listing)
            .map_err(LedgerError::from)?
            .clone();
        Ok(Review { transaction, listing })
    }

    pub async fn approve(&self, actor: Actor, tx: TxId) -> Result<(), WorkflowError> {
        self.require_admin(actor)?;
        let mut ledger = self.ledger.lock().await;
        ledger.apply(Command::Approve { tx, admin: actor.id })?;
        Ok(())
    }

    pub async fn reject(
        &self,
        actor: Actor,
        tx: TxId,
        reason: Option<String>,
    ) -> Result<(), WorkflowError> {
        self.require_admin(actor)?;
        let mut ledger = self.ledger.lock().await;
        ledger.apply(Command::Reject { tx, admin: actor.id, reason })?;
        Ok(())
    }
}

/// Private API
impl<S: ProofStore, F: PriceFeed> Workflow<S, F> {
    fn require_admin(&self, actor: Actor) -> Result<(), WorkflowError> {
        if actor.role != Role::Admin {
            return Err(WorkflowError::AdminRequired);
        }
        Ok(())
    }

    /// Pull a fresh quote for a fractional listing before pricing a claim.
    fn refresh_price(&self, ledger: &mut Ledger, listing: ListingId) -> Result<(), LedgerError> {
        let fractional = matches!(ledger.catalog().get(listing)?.kind, AssetKind::Fractional);
        if fractional {
            if let Some(price) = self.feed.quote(listing) {
                ledger.reprice(listing, price)?;
            }
        }
        Ok(())
    }

    fn create_in(
        &self,
        ledger: &mut Ledger,
        actor: Actor,
        tx: TxId,
        listing_id: ListingId,
        requested: Quantity,
        proof: ProofRef,
    ) -> Result<Transaction, WorkflowError> {
        self.refresh_price(ledger, listing_id)?;
        let listing = ledger.catalog().get(listing_id).map_err(LedgerError::from)?;
        let negotiated = negotiate::negotiate(listing, requested, listing.unit_price);
        if !negotiated.satisfiable {
            return Err(WorkflowError::Unsatisfiable);
        }

        ledger.apply(Command::Create {
            tx,
            listing: listing_id,
            buyer: actor.id,
            quantity: negotiated.quantity,
            proof: Some(proof),
        })?;

        ledger
            .get(tx)
            .cloned()
            .ok_or(WorkflowError::UnknownTransaction(tx))
    }

    /// Best-effort removal of an orphaned proof object. Failures are
    /// logged and swallowed.
    async fn discard(&self, proof: &ProofRef) {
        if let Err(e) = self.store.delete(proof).await {
            warn!(proof = %proof, reason = %e, "orphaned proof cleanup failed");
        }
    }
}
