use crate::model::amount::{AssetAmount, CashValue};
use crate::model::asset::AssetName;
use chrono::{DateTime, Utc};
use std::fmt;

/// What a disposal was exchanged for, resolved from the other legs of its
/// transaction group.
#[derive(Clone, Debug, PartialEq)]
pub enum Counterpart {
    /// Sold against a fiat currency.
    Fiat {
        currency: AssetName,
        amount: CashValue,
    },

    /// Swapped for a different crypto asset.
    Crypto {
        asset: AssetName,
        amount: AssetAmount,
    },

    /// Withdrawn to external custody; nothing was received on the exchange.
    ExternalCustody,

    /// No funding or receipt leg found in the group. Surfaced for manual
    /// review, never guessed.
    Unknown,
}

impl Counterpart {
    /// Label for report cells.
    pub fn label(&self) -> String {
        match self {
            Self::Fiat { currency, .. } => currency.to_string(),
            Self::Crypto { asset, .. } => asset.to_string(),
            Self::ExternalCustody => "external custody".to_string(),
            Self::Unknown => "unknown".to_string(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Classification {
    CashSale,
    Swap,
    Custodial,
    Unresolved,
}

/// Holding-period exemption of one disposal chunk.
///
/// External-origin lots stay undetermined: their acquisition provenance is not
/// established by this engine, so the holding period cannot be trusted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExemptionStatus {
    Exempt { held_days: i64 },
    Taxable { held_days: i64 },
    Undetermined,
}

impl fmt::Display for ExemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exempt { held_days } => write!(f, "exempt ({held_days} days)"),
            Self::Taxable { held_days } => write!(f, "taxable ({held_days} days)"),
            Self::Undetermined => f.write_str("undetermined"),
        }
    }
}

/// Where a disposal chunk's quantity came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChunkSource {
    Lot {
        acquired: DateTime<Utc>,
        external_origin: bool,
    },

    /// The asset's inventory ran dry before the disposal was satisfied.
    /// Zero cost, data-quality condition.
    NoInventory,
}

/// The portion of one disposal satisfied by one lot (or by nothing, on
/// shortfall).
#[derive(Clone, Debug)]
pub struct DisposalChunk {
    pub quantity: AssetAmount,
    pub cost: CashValue,
    pub proceeds_share: CashValue,
    pub source: ChunkSource,
    pub exemption: ExemptionStatus,
}

impl DisposalChunk {
    pub fn net_gain(&self) -> CashValue {
        self.proceeds_share - self.cost
    }
}

/// One processed disposal event with its FIFO consumption detail.
#[derive(Clone, Debug)]
pub struct DisposalResult {
    pub time: DateTime<Utc>,
    pub asset: AssetName,
    pub quantity: AssetAmount,
    pub inherited_cost: CashValue,
    pub counterpart: Counterpart,
    pub proceeds: CashValue,
    pub fees: CashValue,
    pub classification: Classification,
    pub chunks: Vec<DisposalChunk>,
}

impl DisposalResult {
    pub fn realized_gain(&self) -> CashValue {
        self.proceeds - self.inherited_cost
    }

    /// Earliest acquisition date among the consumed lots, skipping shortfall
    /// chunks.
    pub fn earliest_source_date(&self) -> Option<DateTime<Utc>> {
        self.chunks
            .iter()
            .filter_map(|chunk| match chunk.source {
                ChunkSource::Lot { acquired, .. } => Some(acquired),
                ChunkSource::NoInventory => None,
            })
            .min()
    }

    pub fn had_shortfall(&self) -> bool {
        self.chunks
            .iter()
            .any(|chunk| chunk.source == ChunkSource::NoInventory)
    }
}

/// One lot created by an acquisition leg.
#[derive(Clone, Debug)]
pub struct AcquisitionRecord {
    pub time: DateTime<Utc>,
    pub asset: AssetName,
    pub quantity: AssetAmount,
    pub cost: CashValue,
    pub fee_share: CashValue,
    /// Currency of the funding legs; `None` for external-origin deposits and
    /// unfunded acquisitions (e.g. the incoming side of a swap).
    pub funded_with: Option<AssetName>,
    pub external_origin: bool,
}

/// A fiat deposit from a bank. Tracked for the consolidated report only; fiat
/// never enters the lot inventory.
#[derive(Clone, Debug)]
pub struct FiatInflow {
    pub time: DateTime<Utc>,
    pub currency: AssetName,
    pub amount: CashValue,
}

/// Data-quality conditions captured as output rather than thrown. The intended
/// consumer is a human reconciling records against exchange statements.
#[derive(Clone, Debug)]
pub enum Finding {
    InventoryShortfall {
        time: DateTime<Utc>,
        asset: AssetName,
        missing: AssetAmount,
    },
    UnresolvedCounterpart {
        time: DateTime<Utc>,
        asset: AssetName,
        quantity: AssetAmount,
    },
    ConservationMismatch {
        time: DateTime<Utc>,
        asset: AssetName,
        expected: AssetAmount,
        actual: AssetAmount,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InventoryShortfall {
                time,
                asset,
                missing,
            } => write!(
                f,
                "{date}: disposal of {asset} exceeds inventory by {missing} (consumed at zero cost)",
                date = time.format("%F"),
            ),
            Self::UnresolvedCounterpart {
                time,
                asset,
                quantity,
            } => write!(
                f,
                "{date}: no counterpart leg found for disposal of {quantity} {asset}",
                date = time.format("%F"),
            ),
            Self::ConservationMismatch {
                time,
                asset,
                expected,
                actual,
            } => write!(
                f,
                "{date}: chunk quantities for {asset} sum to {actual}, expected {expected}",
                date = time.format("%F"),
            ),
        }
    }
}

/// Everything one engine run produces. The report projections are independent
/// views over this value.
#[derive(Debug, Default)]
pub struct ProcessedLedger {
    pub fiat_inflows: Vec<FiatInflow>,
    pub acquisitions: Vec<AcquisitionRecord>,
    pub disposals: Vec<DisposalResult>,
    pub findings: Vec<Finding>,
}
