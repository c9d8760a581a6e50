pub mod amount;
pub mod csv;
pub mod ledger;
pub mod model;
pub mod negotiate;
pub mod workflow;

pub use amount::{Amount, Quantity};
pub use ledger::Ledger;
pub use model::{Command, Listing, ListingId, Transaction, TxId, UserId};
