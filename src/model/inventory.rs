use crate::model::amount::{AssetAmount, CashValue};
use crate::model::asset::AssetName;
use crate::util::fifo::FIFO;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::trace;

/// One acquisition batch of an asset, held until disposals consume it.
///
/// Mutated in place on partial consumption; removed from its pool when the
/// remaining quantity falls to epsilon.
#[derive(Clone, Debug)]
pub struct CostLot {
    pub quantity: AssetAmount,
    pub cost: CashValue,
    pub acquired: DateTime<Utc>,
    /// True when the lot entered via a deposit with no identifiable funding
    /// leg. Such lots carry zero cost pending manual reconciliation.
    pub external_origin: bool,
}

/// The slice of a lot consumed by one disposal step.
#[derive(Clone, Debug)]
pub struct LotTake {
    pub quantity: AssetAmount,
    pub cost: CashValue,
    pub acquired: DateTime<Utc>,
    pub external_origin: bool,
}

/// Per-asset FIFO queues of acquisition lots.
///
/// Exclusively owned by one engine instance for the duration of a run. This is
/// the sole place FIFO discipline is enforced: lots append at the tail and only
/// the head lot may be consumed or split.
#[derive(Debug, Default)]
pub struct Inventory {
    pools: HashMap<AssetName, FIFO<CostLot>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new lot at the tail of the asset's queue.
    ///
    /// Cost may be zero (external-origin and unfunded acquisitions); a
    /// non-positive quantity or negative cost is an invariant violation.
    pub fn push(&mut self, asset: AssetName, lot: CostLot) {
        debug_assert!(lot.quantity.is_positive());
        debug_assert!(!lot.cost.is_negative());

        trace!(
            "push lot: {quantity} {asset} costing {cost}",
            quantity = lot.quantity,
            cost = lot.cost,
        );
        self.pools.entry(asset).or_default().append_back(lot);
    }

    pub fn peek_oldest(&self, asset: &AssetName) -> Option<&CostLot> {
        self.pools.get(asset).and_then(|pool| pool.peek_front())
    }

    /// Consume `consumed` units from the head lot, inheriting a proportional
    /// share of its cost. The head's unit cost is invariant under the split.
    /// Removes the lot once its remaining quantity is negligible.
    ///
    /// `consumed` must not exceed the head lot's quantity; the disposal loop
    /// clamps it before calling.
    pub fn shrink_head(&mut self, asset: &AssetName, consumed: AssetAmount) -> Option<LotTake> {
        let pool = self.pools.get_mut(asset)?;
        let head = pool.peek_front_mut()?;
        debug_assert!(consumed.is_positive());

        let take = if (head.quantity - consumed).is_negligible() {
            // consume the lot whole, cost fully inherited
            let lot = pool.pop_front().unwrap();

            LotTake {
                quantity: lot.quantity,
                cost: lot.cost,
                acquired: lot.acquired,
                external_origin: lot.external_origin,
            }
        } else {
            debug_assert!(consumed < head.quantity);
            let fraction = consumed.fraction_of(head.quantity)?;
            let cost_part = head.cost.portion(fraction);

            head.quantity -= consumed;
            head.cost -= cost_part;

            LotTake {
                quantity: consumed,
                cost: cost_part,
                acquired: head.acquired,
                external_origin: head.external_origin,
            }
        };

        trace!(
            "consume {quantity} {asset} inheriting {cost} from lot of {acquired}",
            quantity = take.quantity,
            cost = take.cost,
            acquired = take.acquired,
        );

        Some(take)
    }

    /// Total live quantity for an asset.
    pub fn balance(&self, asset: &AssetName) -> AssetAmount {
        self.pools
            .get(asset)
            .map(|pool| pool.iter().map(|lot| lot.quantity).sum())
            .unwrap_or_default()
    }

    pub fn lot_count(&self, asset: &AssetName) -> usize {
        self.pools.get(asset).map(|pool| pool.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(ymd: (i32, u32, u32)) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(ymd.0, ymd.1, ymd.2, 12, 0, 0).unwrap()
    }

    fn lot(quantity: &str, cost: &str, acquired: (i32, u32, u32)) -> CostLot {
        CostLot {
            quantity: quantity.parse().unwrap(),
            cost: cost.parse().unwrap(),
            acquired: date(acquired),
            external_origin: false,
        }
    }

    #[test]
    fn partial_consumption_preserves_unit_cost() {
        let asset = AssetName::new("BTC");
        let mut inventory = Inventory::new();
        inventory.push(asset.clone(), lot("1.0", "100", (2021, 1, 1)));

        let take = inventory
            .shrink_head(&asset, "0.6".parse().unwrap())
            .unwrap();
        assert_eq!(take.quantity, "0.6".parse().unwrap());
        assert_eq!(take.cost, "60".parse().unwrap());

        // remaining lot keeps quantity 0.4 at cost 40: unit cost unchanged
        let remaining = inventory.peek_oldest(&asset).unwrap();
        assert!(remaining.quantity.is_fuzzy_eq("0.4".parse().unwrap()));
        assert!(remaining.cost.is_fuzzy_eq("40".parse().unwrap()));
    }

    #[test]
    fn whole_consumption_removes_the_lot() {
        let asset = AssetName::new("ETH");
        let mut inventory = Inventory::new();
        inventory.push(asset.clone(), lot("2.0", "500", (2021, 3, 1)));

        let take = inventory
            .shrink_head(&asset, "2.0".parse().unwrap())
            .unwrap();
        assert_eq!(take.cost, "500".parse().unwrap());
        assert!(inventory.peek_oldest(&asset).is_none());
        assert_eq!(inventory.lot_count(&asset), 0);
    }

    #[test]
    fn consumption_to_epsilon_remainder_removes_the_lot() {
        let asset = AssetName::new("BTC");
        let mut inventory = Inventory::new();
        inventory.push(asset.clone(), lot("1.0", "100", (2021, 1, 1)));

        // remainder of 1e-10 is below epsilon; the lot must not linger
        inventory
            .shrink_head(&asset, "0.9999999999".parse().unwrap())
            .unwrap();
        assert_eq!(inventory.lot_count(&asset), 0);
    }

    #[test]
    fn only_the_head_lot_is_touched() {
        let asset = AssetName::new("BTC");
        let mut inventory = Inventory::new();
        inventory.push(asset.clone(), lot("0.5", "50", (2020, 1, 1)));
        inventory.push(asset.clone(), lot("0.5", "80", (2020, 6, 1)));
        inventory.push(asset.clone(), lot("0.5", "90", (2020, 9, 1)));

        let take = inventory
            .shrink_head(&asset, "0.5".parse().unwrap())
            .unwrap();
        assert_eq!(take.acquired, date((2020, 1, 1)));

        let take = inventory
            .shrink_head(&asset, "0.25".parse().unwrap())
            .unwrap();
        assert_eq!(take.acquired, date((2020, 6, 1)));
        assert_eq!(take.cost, "40".parse().unwrap());

        // third lot untouched
        assert_eq!(inventory.balance(&asset), "0.75".parse().unwrap());
        assert_eq!(inventory.lot_count(&asset), 2);
    }

    #[test]
    fn balance_of_unknown_asset_is_zero() {
        let inventory = Inventory::new();
        assert_eq!(
            inventory.balance(&AssetName::new("XMR")),
            AssetAmount::default()
        );
    }
}
