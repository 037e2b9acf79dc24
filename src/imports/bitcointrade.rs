//! BitcoinTrade statement import.
//!
//! The statement is a `;`-separated CSV with free-text categories and
//! locale-formatted numerics. All text handling lives here: the engine only
//! ever sees typed [`LedgerEvent`]s with a closed [`Category`].

use crate::model::amount::AssetAmount;
use crate::model::asset::AssetName;
use crate::model::events::{Category, LedgerEvent};
use crate::model::Stats;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::{io::Read, path::Path};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StatementError {
    #[error("CSV Error")]
    Io(#[from] csv::Error),

    #[error("FS Error")]
    Fs(#[from] std::io::Error),

    #[error("Unparseable timestamp: `{0} {1}`")]
    DateTime(String, String),
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct StatementCSVRow {
    #[serde(rename = "Data")]
    pub(crate) date: String,

    #[serde(rename = "Hora")]
    pub(crate) time: String,

    #[serde(rename = "Categoria")]
    pub(crate) category: String,

    #[serde(rename = "Moeda")]
    pub(crate) currency: String,

    /// Some exports label this column "Valor" instead.
    #[serde(rename = "Quantidade", alias = "Valor")]
    pub(crate) amount: String,
}

/// Normalize a locale-formatted numeric string into an amount.
///
/// Handles Brazilian/Portuguese separators ("1.234,56" becomes "1234.56") and
/// strips currency symbols. An unparseable value normalizes to zero: malformed
/// amounts must be resolved before a row reaches the engine, and a zero leg
/// falls out of every classification.
fn clean_amount(raw: &str) -> AssetAmount {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    let normalized = if stripped.contains(',') && stripped.contains('.') {
        // "1.234,56": drop thousands separators, comma is the decimal point
        stripped.replace('.', "").replace(',', ".")
    } else if stripped.contains(',') {
        stripped.replace(',', ".")
    } else {
        stripped
    };

    normalized.parse().unwrap_or_else(|_| {
        warn!("Unparseable amount `{raw}` normalized to zero");
        AssetAmount::default()
    })
}

/// Raise the statement's free-text category to the closed enum. This is the
/// only place substring matching happens.
///
/// Returns `None` for categories the engine has no use for; callers skip the
/// row.
fn classify_category(raw: &str, fiat: bool) -> Option<Category> {
    let lower = raw.to_lowercase();

    // "Taxa sobre compra" must match before the plain fee and purchase checks.
    if lower.contains("taxa sobre compra") || lower.contains("purchase fee") {
        Some(Category::PurchaseFee)
    } else if lower.contains("taxa") || lower.contains("fee") {
        Some(Category::Fee)
    } else if lower.contains("compra") || lower.contains("purchase") {
        Some(Category::Purchase)
    } else if lower.contains("venda") || lower.contains("sale") {
        Some(Category::Sale)
    } else if lower.contains("retirada") || lower.contains("withdrawal") {
        Some(Category::Withdrawal)
    } else if lower.contains("depósito") || lower.contains("deposito") || lower.contains("deposit")
    {
        if fiat {
            Some(Category::BankDeposit)
        } else {
            Some(Category::Deposit)
        }
    } else {
        None
    }
}

/// Statements use day-first dates; ISO dates appear in some exports.
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M",
];

fn parse_timestamp(date: &str, time: &str) -> Result<NaiveDateTime, StatementError> {
    let combined = format!("{date} {time}", date = date.trim(), time = time.trim());

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&combined, format).ok())
        .ok_or_else(|| StatementError::DateTime(date.to_string(), time.to_string()))
}

pub fn read_statement(
    s: &mut Stats,
    path: impl AsRef<Path>,
) -> Result<Vec<LedgerEvent>, StatementError> {
    let file = std::fs::File::open(path)?;
    read_statement_from(s, file)
}

/// Read and normalize statement rows. Row order is irrelevant; the grouper
/// re-sorts deterministically.
pub fn read_statement_from(
    s: &mut Stats,
    reader: impl Read,
) -> Result<Vec<LedgerEvent>, StatementError> {
    let mut events = Vec::new();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .comment(Some(b'#'))
        .from_reader(reader);

    debug!("Parsing statement rows");
    for result in reader.deserialize() {
        let record: StatementCSVRow = result?;
        debug!("Deserialized: {record:?}");

        let asset = AssetName::new(&record.currency);
        let Some(category) = classify_category(&record.category, asset.is_fiat()) else {
            warn!(
                "Skipping row with unrecognized category `{category}`",
                category = record.category,
            );
            s.inc_skipped_rows();
            continue;
        };

        let event = LedgerEvent {
            time: parse_timestamp(&record.date, &record.time)?.and_utc(),
            category,
            asset,
            amount: clean_amount(&record.amount),
        };
        debug!("Parsed: {event:?}");

        events.push(event);
        s.inc_statement_rows();
    }

    Ok(events)
}
