use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::amount::{Amount, Quantity};
use crate::model::{Command, Listing, ProofRef, Transaction};

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{cmd_type}'")]
    UnrecognizedType { line: usize, cmd_type: String },

    #[error("line {line}: unrecognized listing kind '{kind}'")]
    UnrecognizedKind { line: usize, kind: String },

    #[error("line {line}: {cmd_type} missing {field}")]
    MissingField {
        line: usize,
        cmd_type: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    listing: Option<u32>,
    user: Option<u32>,
    tx: Option<u32>,
    quantity: Option<f64>,
    price: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    kind: Option<String>,
    title: Option<String>,
    proof: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    tx: u32,
    listing: u32,
    buyer: u32,
    quantity: String,
    amount: String,
    status: String,
    reason: String,
}

fn require<T>(
    value: Option<T>,
    line: usize,
    cmd_type: &'static str,
    field: &'static str,
) -> Result<T, CsvError> {
    value.ok_or(CsvError::MissingField {
        line,
        cmd_type,
        field,
    })
}

fn listing_from_row(row: InputRow, line: usize) -> Result<Listing, CsvError> {
    let id = require(row.listing, line, "listing", "listing")?;
    let seller = require(row.user, line, "listing", "user")?;
    let price = require(row.price, line, "listing", "price")?;
    let title = row.title.unwrap_or_default();

    let kind = row.kind.unwrap_or_else(|| "fractional".to_string());
    match kind.as_str() {
        "good" => Ok(Listing::good(id, seller, title, Amount::from_float(price))),
        "fractional" => {
            let available = require(row.quantity, line, "listing", "quantity")?;
            Ok(Listing::fractional(
                id,
                seller,
                title,
                Amount::from_float(price),
                Quantity::from_float(available),
                row.min.map(Quantity::from_float),
                row.max.map(Quantity::from_float),
            ))
        }
        other => Err(CsvError::UnrecognizedKind {
            line,
            kind: other.to_string(),
        }),
    }
}

/// Read workflow commands from a csv file
pub fn read_commands(path: impl AsRef<Path>) -> impl Iterator<Item = Result<Command, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            match row.r#type.as_str() {
                "listing" => Ok(Command::Publish {
                    listing: listing_from_row(row, line)?,
                }),
                "create" => Ok(Command::Create {
                    tx: require(row.tx, line, "create", "tx")?,
                    listing: require(row.listing, line, "create", "listing")?,
                    buyer: require(row.user, line, "create", "user")?,
                    quantity: Quantity::from_float(require(
                        row.quantity,
                        line,
                        "create",
                        "quantity",
                    )?),
                    proof: row.proof.map(ProofRef::new),
                }),
                "attach" => Ok(Command::AttachProof {
                    tx: require(row.tx, line, "attach", "tx")?,
                    proof: ProofRef::new(require(row.proof, line, "attach", "proof")?),
                }),
                "approve" => Ok(Command::Approve {
                    tx: require(row.tx, line, "approve", "tx")?,
                    admin: require(row.user, line, "approve", "user")?,
                }),
                "reject" => Ok(Command::Reject {
                    tx: require(row.tx, line, "reject", "tx")?,
                    admin: require(row.user, line, "reject", "user")?,
                    reason: row.reason,
                }),
                other => Err(CsvError::UnrecognizedType {
                    line,
                    cmd_type: other.to_string(),
                }),
            }
        })
}

/// write the transaction report to stdout in csv format
pub fn write_transactions<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for tx in transactions {
        let row = OutputRow {
            tx: tx.id,
            listing: tx.listing,
            buyer: tx.buyer,
            quantity: tx.quantity.to_string(),
            amount: tx.amount.to_currency_string(),
            status: tx.status.kind().to_string(),
            reason: tx.rejection_reason().unwrap_or_default().to_string(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
