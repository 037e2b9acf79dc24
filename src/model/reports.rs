use crate::model::amount::{AssetAmount, CashValue};
use crate::model::asset::AssetName;
use crate::model::results::{
    ChunkSource, Classification, Counterpart, DisposalResult, ProcessedLedger,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::Display;

/// Rendered when a chunk has no source lot to date.
const NO_INVENTORY_MARKER: &str = "no inventory (verify)";

/// Inclusive date window restricting which swaps are reported.
#[derive(Copy, Clone, Debug)]
pub struct ReportWindow {
    pub from: NaiveDate,
    pub until: NaiveDate,
}

impl ReportWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.until
    }
}

/// One row per FIFO chunk of every fiat-counterpart sale. This is the tax
/// worksheet: each consumed lot carries its own acquisition date, inherited
/// cost, proceeds share, and exemption status.
#[derive(Debug)]
pub struct CashSaleReport {
    rows: Vec<CashSaleRow>,
}

#[derive(Debug)]
struct CashSaleRow {
    disposal_date: NaiveDate,
    asset: AssetName,
    quantity: AssetAmount,
    acquired: Option<NaiveDate>,
    cost: CashValue,
    counter_currency: String,
    proceeds: CashValue,
    gain: CashValue,
    exemption: String,
}

impl CashSaleReport {
    pub fn new(ledger: &ProcessedLedger) -> Self {
        let rows = ledger
            .disposals
            .iter()
            .filter(|disposal| disposal.classification == Classification::CashSale)
            .flat_map(|disposal| {
                disposal.chunks.iter().map(|chunk| CashSaleRow {
                    disposal_date: disposal.time.date_naive(),
                    asset: disposal.asset.clone(),
                    quantity: chunk.quantity,
                    acquired: match chunk.source {
                        ChunkSource::Lot { acquired, .. } => Some(acquired.date_naive()),
                        ChunkSource::NoInventory => None,
                    },
                    cost: chunk.cost,
                    counter_currency: disposal.counterpart.label(),
                    proceeds: chunk.proceeds_share,
                    gain: chunk.net_gain(),
                    exemption: chunk.exemption.to_string(),
                })
            })
            .collect();

        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Display for CashSaleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Write the CSV header
        writeln!(
            f,
            concat!(
                r#""Disposal Date","Asset","Quantity","Acquisition Date","Acquisition Cost","#,
                r#""Counter Currency","Proceeds","Realized Gain","Exemption Status""#,
            )
        )?;

        // Write CSV rows
        for row in &self.rows {
            writeln!(f, "{row}")?;
        }

        Ok(())
    }
}

impl Display for CashSaleRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let acquired = self
            .acquired
            .map(|date| date.format("%F").to_string())
            .unwrap_or_else(|| NO_INVENTORY_MARKER.to_string());

        write!(
            f,
            r#""{disposal_date}","{asset}","{quantity}","{acquired}","{cost}","#,
            disposal_date = self.disposal_date.format("%F"),
            asset = self.asset,
            quantity = self.quantity.rounded(),
            cost = self.cost.rounded(),
        )?;
        write!(
            f,
            r#""{counter_currency}","{proceeds}","{gain}","{exemption}""#,
            counter_currency = self.counter_currency,
            proceeds = self.proceeds.rounded(),
            gain = self.gain.rounded(),
            exemption = self.exemption,
        )?;

        Ok(())
    }
}

/// One aggregated row per crypto-to-crypto swap inside the reporting window,
/// as proof-of-exchange evidence: what left, what arrived, and the cost basis
/// carried out.
#[derive(Debug)]
pub struct SwapReport {
    rows: Vec<SwapRow>,
}

#[derive(Debug)]
struct SwapRow {
    date: NaiveDate,
    asset_out: AssetName,
    quantity_out: AssetAmount,
    asset_in: AssetName,
    quantity_in: AssetAmount,
    cost_transferred: CashValue,
    earliest_source: Option<NaiveDate>,
}

impl SwapReport {
    pub fn new(ledger: &ProcessedLedger, window: ReportWindow) -> Self {
        let rows = ledger
            .disposals
            .iter()
            .filter(|disposal| disposal.classification == Classification::Swap)
            .filter(|disposal| window.contains(disposal.time.date_naive()))
            .filter_map(|disposal| match &disposal.counterpart {
                Counterpart::Crypto { asset, amount } => Some(SwapRow {
                    date: disposal.time.date_naive(),
                    asset_out: disposal.asset.clone(),
                    quantity_out: disposal.quantity,
                    asset_in: asset.clone(),
                    quantity_in: *amount,
                    cost_transferred: disposal.inherited_cost,
                    earliest_source: disposal.earliest_source_date().map(|d| d.date_naive()),
                }),
                _ => None,
            })
            .collect();

        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Display for SwapReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Write the CSV header
        writeln!(
            f,
            concat!(
                r#""Date","Asset Out","Quantity Out","Asset In","Quantity In","#,
                r#""Cost Transferred","Earliest Source Date""#,
            )
        )?;

        // Write CSV rows
        for row in &self.rows {
            writeln!(f, "{row}")?;
        }

        Ok(())
    }
}

impl Display for SwapRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let earliest = self
            .earliest_source
            .map(|date| date.format("%F").to_string())
            .unwrap_or_default();

        write!(
            f,
            r#""{date}","{asset_out}","{quantity_out}","{asset_in}","{quantity_in}","{cost}","{earliest}""#,
            date = self.date.format("%F"),
            asset_out = self.asset_out,
            quantity_out = self.quantity_out.rounded(),
            asset_in = self.asset_in,
            quantity_in = self.quantity_in.rounded(),
            cost = self.cost_transferred.rounded(),
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Direction {
    Inbound,
    Outbound,
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ReconciliationStatus {
    PendingManualMatch,
    NoInventoryAvailable,
}

impl Display for ReconciliationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::PendingManualMatch => "pending manual match",
            Self::NoInventoryAvailable => "no inventory available",
        })
    }
}

/// Checklist of custody movements to reconcile against third-party records:
/// externally sourced deposits (inbound) and withdrawals to external wallets
/// (outbound).
#[derive(Debug)]
pub struct ReconciliationReport {
    rows: Vec<ReconciliationRow>,
}

#[derive(Debug)]
struct ReconciliationRow {
    time: DateTime<Utc>,
    asset: AssetName,
    quantity: AssetAmount,
    direction: Direction,
    status: ReconciliationStatus,
}

impl ReconciliationReport {
    pub fn new(ledger: &ProcessedLedger) -> Self {
        let inbound = ledger
            .acquisitions
            .iter()
            .filter(|acquisition| acquisition.external_origin)
            .map(|acquisition| ReconciliationRow {
                time: acquisition.time,
                asset: acquisition.asset.clone(),
                quantity: acquisition.quantity,
                direction: Direction::Inbound,
                status: ReconciliationStatus::PendingManualMatch,
            });

        let outbound = ledger
            .disposals
            .iter()
            .filter(|disposal| disposal.classification == Classification::Custodial)
            .map(|disposal| ReconciliationRow {
                time: disposal.time,
                asset: disposal.asset.clone(),
                quantity: disposal.quantity,
                direction: Direction::Outbound,
                status: if disposal.had_shortfall() {
                    ReconciliationStatus::NoInventoryAvailable
                } else {
                    ReconciliationStatus::PendingManualMatch
                },
            });

        let mut rows: Vec<_> = inbound.chain(outbound).collect();
        rows.sort_by_key(|row| row.time);

        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Display for ReconciliationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Write the CSV header
        writeln!(f, r#""Date","Asset","Quantity","Direction","Status""#)?;

        // Write CSV rows
        for row in &self.rows {
            writeln!(f, "{row}")?;
        }

        Ok(())
    }
}

impl Display for ReconciliationRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            r#""{date}","{asset}","{quantity}","{direction}","{status}""#,
            date = self.time.format("%F"),
            asset = self.asset,
            quantity = self.quantity.rounded(),
            direction = self.direction,
            status = self.status,
        )
    }
}

/// Consolidated view of every economic operation in the run, in time order.
#[derive(Debug)]
pub struct FullReport {
    rows: Vec<FullRow>,
}

#[derive(Debug)]
struct FullRow {
    time: DateTime<Utc>,
    operation: &'static str,
    asset: AssetName,
    quantity: Option<AssetAmount>,
    fifo_cost: CashValue,
    counterpart: String,
    received: String,
    fees: CashValue,
}

impl FullReport {
    pub fn new(ledger: &ProcessedLedger) -> Self {
        let fiat = ledger.fiat_inflows.iter().map(|inflow| FullRow {
            time: inflow.time,
            operation: "fiat deposit",
            asset: inflow.currency.clone(),
            quantity: None,
            fifo_cost: inflow.amount,
            counterpart: "bank".to_string(),
            received: inflow.amount.rounded().to_string(),
            fees: CashValue::default(),
        });

        let acquisitions = ledger.acquisitions.iter().map(|acquisition| FullRow {
            time: acquisition.time,
            operation: if acquisition.external_origin {
                "external deposit"
            } else {
                "purchase"
            },
            asset: acquisition.asset.clone(),
            quantity: Some(acquisition.quantity),
            fifo_cost: acquisition.cost,
            counterpart: match (&acquisition.funded_with, acquisition.external_origin) {
                (Some(currency), _) => currency.to_string(),
                (None, true) => "external wallet".to_string(),
                (None, false) => "unknown".to_string(),
            },
            received: if acquisition.external_origin {
                acquisition.quantity.rounded().to_string()
            } else {
                acquisition.cost.rounded().to_string()
            },
            fees: acquisition.fee_share,
        });

        let disposals = ledger.disposals.iter().map(|disposal| FullRow {
            time: disposal.time,
            operation: disposal_operation(disposal),
            asset: disposal.asset.clone(),
            quantity: Some(disposal.quantity),
            fifo_cost: disposal.inherited_cost,
            counterpart: disposal.counterpart.label(),
            received: disposal.proceeds.rounded().to_string(),
            fees: disposal.fees,
        });

        let mut rows: Vec<_> = fiat.chain(acquisitions).chain(disposals).collect();
        rows.sort_by_key(|row| row.time);

        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn disposal_operation(disposal: &DisposalResult) -> &'static str {
    match disposal.classification {
        Classification::CashSale => "sale",
        Classification::Swap => "swap",
        Classification::Custodial => "withdrawal",
        Classification::Unresolved => "sale",
    }
}

impl Display for FullReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Write the CSV header
        writeln!(
            f,
            concat!(
                r#""Operation","Date","Time","Asset","Quantity","FIFO Cost","#,
                r#""Counterpart","Received","Fees""#,
            )
        )?;

        // Write CSV rows
        for row in &self.rows {
            writeln!(f, "{row}")?;
        }

        Ok(())
    }
}

impl Display for FullRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let quantity = self
            .quantity
            .map(|quantity| quantity.rounded().to_string())
            .unwrap_or_default();

        write!(
            f,
            r#""{operation}","{date}","{time}","{asset}","{quantity}","{cost}","#,
            operation = self.operation,
            date = self.time.format("%F"),
            time = self.time.format("%T"),
            asset = self.asset,
            cost = self.fifo_cost.rounded(),
        )?;
        write!(
            f,
            r#""{counterpart}","{received}","{fees}""#,
            counterpart = self.counterpart,
            received = self.received,
            fees = self.fees.rounded(),
        )?;

        Ok(())
    }
}
