//! FIFO consumption of acquisition lots by a disposal.

use crate::model::amount::{AssetAmount, CashValue};
use crate::model::asset::AssetName;
use crate::model::inventory::Inventory;
use crate::model::results::ChunkSource;
use tracing::debug;

/// One step of FIFO consumption, before proceeds and exemption are attached.
#[derive(Clone, Debug)]
pub(crate) struct ConsumedChunk {
    pub(crate) quantity: AssetAmount,
    pub(crate) cost: CashValue,
    pub(crate) source: ChunkSource,
}

/// The outcome of consuming one disposal's quantity from an asset's pool.
#[derive(Debug, Default)]
pub(crate) struct Consumption {
    pub(crate) chunks: Vec<ConsumedChunk>,
    pub(crate) inherited_cost: CashValue,
    /// Quantity the inventory could not satisfy, if any.
    pub(crate) shortfall: Option<AssetAmount>,
}

/// Consume `quantity` of `asset` oldest-lot-first.
///
/// Whole lots are inherited at their full cost; the final lot is split
/// proportionally, leaving its unit cost unchanged. When the pool runs dry a
/// terminal zero-cost chunk records the unsatisfied remainder; shortfalls are
/// data-quality findings, never fabricated cost.
pub(crate) fn consume(
    inventory: &mut Inventory,
    asset: &AssetName,
    quantity: AssetAmount,
) -> Consumption {
    let mut consumption = Consumption::default();
    if !quantity.is_positive() || quantity.is_negligible() {
        return consumption;
    }

    let mut remaining = quantity;
    while !remaining.is_negligible() {
        let Some(head) = inventory.peek_oldest(asset) else {
            break;
        };

        // consume the head whole when it fits, otherwise split it
        let step = if head.quantity <= remaining {
            head.quantity
        } else {
            remaining
        };
        let take = inventory
            .shrink_head(asset, step)
            .expect("peeked head lot must be consumable");

        remaining -= take.quantity;
        consumption.inherited_cost += take.cost;
        consumption.chunks.push(ConsumedChunk {
            quantity: take.quantity,
            cost: take.cost,
            source: ChunkSource::Lot {
                acquired: take.acquired,
                external_origin: take.external_origin,
            },
        });
    }

    if !remaining.is_negligible() {
        debug!("inventory exhausted for {asset}: {remaining} unmatched");
        consumption.chunks.push(ConsumedChunk {
            quantity: remaining,
            cost: CashValue::default(),
            source: ChunkSource::NoInventory,
        });
        consumption.shortfall = Some(remaining);
    }

    consumption
}
