pub(crate) use self::allocate::{allocate, share};
pub(crate) use self::consume::consume;
pub(crate) use self::resolve::{find_receipt, ClassifiedLegs, GroupReceipt};

use crate::model::amount::{AssetAmount, CashValue};
use crate::model::events::TransactionGroup;
use crate::model::inventory::{CostLot, Inventory};
use crate::model::results::{
    AcquisitionRecord, ChunkSource, Classification, Counterpart, DisposalChunk, DisposalResult,
    ExemptionStatus, FiatInflow, Finding, ProcessedLedger,
};
use tracing::debug;

mod allocate;
mod consume;
mod resolve;


/// Engine knobs. The exemption threshold is the only tax rule this engine
/// knows about.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Holding period in days beyond which a realized gain is exempt.
    pub exemption_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { exemption_days: 365 }
    }
}

/// The FIFO cost-accounting engine.
///
/// Owns the only mutable state of a run (the lot inventory) and processes
/// transaction groups strictly in timestamp order; each group's inventory
/// reads and writes complete before the next group is considered, because
/// later consumption depends on the exact inventory state left behind.
/// Reordering groups would change which lots are consumed and therefore the
/// computed cost basis.
#[derive(Debug, Default)]
pub struct Engine {
    inventory: Inventory,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            inventory: Inventory::new(),
            config,
        }
    }

    /// Run the engine over grouped events. Consumes the engine: the inventory
    /// lives exactly as long as one run.
    pub fn process(mut self, groups: &[TransactionGroup]) -> ProcessedLedger {
        let mut output = ProcessedLedger::default();

        for group in groups {
            self.process_group(group, &mut output);
        }

        output
    }

    fn process_group(&mut self, group: &TransactionGroup, output: &mut ProcessedLedger) {
        let legs = ClassifiedLegs::classify(group);

        for deposit in &legs.bank_deposits {
            output.fiat_inflows.push(FiatInflow {
                time: group.time,
                currency: deposit.asset.clone(),
                amount: CashValue::from(deposit.amount.abs()),
            });
        }

        // In-bound custody transfers: no funding leg exists, so the lot enters
        // at zero cost pending manual reconciliation.
        for deposit in &legs.external_deposits {
            let quantity = deposit.amount.abs();
            if quantity.is_negligible() {
                continue;
            }

            self.inventory.push(
                deposit.asset.clone(),
                CostLot {
                    quantity,
                    cost: CashValue::default(),
                    acquired: group.time,
                    external_origin: true,
                },
            );
            output.acquisitions.push(AcquisitionRecord {
                time: group.time,
                asset: deposit.asset.clone(),
                quantity,
                cost: CashValue::default(),
                fee_share: CashValue::default(),
                funded_with: None,
                external_origin: true,
            });
        }

        // Funded purchases: the group's aggregate fiat outflow and purchase
        // fees are distributed over the acquisition legs by quantity.
        if !legs.acquisitions.is_empty() {
            let quantities: Vec<AssetAmount> = legs
                .acquisitions
                .iter()
                .map(|event| event.amount.abs())
                .collect();
            let costs = allocate(legs.funding, &quantities);
            let fees = allocate(legs.purchase_fees, &quantities);

            for ((event, cost), fee_share) in legs.acquisitions.iter().zip(costs).zip(fees) {
                let quantity = event.amount.abs();
                if quantity.is_negligible() {
                    continue;
                }

                debug!(
                    "acquisition: {quantity} {asset} for {cost}",
                    asset = event.asset,
                );
                self.inventory.push(
                    event.asset.clone(),
                    CostLot {
                        quantity,
                        cost,
                        acquired: group.time,
                        external_origin: false,
                    },
                );
                output.acquisitions.push(AcquisitionRecord {
                    time: group.time,
                    asset: event.asset.clone(),
                    quantity,
                    cost,
                    fee_share,
                    funded_with: legs.funding_currency.clone(),
                    external_origin: false,
                });
            }
        }

        self.process_disposals(group, &legs, output);
    }

    fn process_disposals(
        &mut self,
        group: &TransactionGroup,
        legs: &ClassifiedLegs<'_>,
        output: &mut ProcessedLedger,
    ) {
        let disposed = legs.disposed_assets();
        if disposed.is_empty() {
            return;
        }

        let receipt = find_receipt(group, &disposed);
        let total_disposed: AssetAmount = legs
            .disposals
            .iter()
            .map(|event| event.amount.abs())
            .sum();

        for asset in &disposed {
            let quantity: AssetAmount = legs
                .disposals
                .iter()
                .filter(|event| event.asset == *asset)
                .map(|event| event.amount.abs())
                .sum();
            if quantity.is_negligible() {
                continue;
            }

            // Counterpart resolution priority: withdrawal to custody, then
            // fiat receipt, then cross-asset receipt, else unresolved.
            // Receipts are shared over multiple disposed assets by quantity.
            let (counterpart, proceeds, classification) = if legs.is_withdrawal(asset) {
                (
                    Counterpart::ExternalCustody,
                    CashValue::default(),
                    Classification::Custodial,
                )
            } else {
                match &receipt {
                    GroupReceipt::Fiat { currency, amount } => {
                        let proceeds = share(*amount, quantity, total_disposed);
                        (
                            Counterpart::Fiat {
                                currency: currency.clone(),
                                amount: proceeds,
                            },
                            proceeds,
                            Classification::CashSale,
                        )
                    }
                    GroupReceipt::Crypto {
                        asset: received,
                        amount,
                    } => {
                        let fraction = quantity.fraction_of(total_disposed).unwrap_or_default();
                        let received_share = amount.portion(fraction);
                        (
                            Counterpart::Crypto {
                                asset: received.clone(),
                                amount: received_share,
                            },
                            CashValue::from(received_share),
                            Classification::Swap,
                        )
                    }
                    GroupReceipt::None => {
                        output.findings.push(Finding::UnresolvedCounterpart {
                            time: group.time,
                            asset: asset.clone(),
                            quantity,
                        });
                        (
                            Counterpart::Unknown,
                            CashValue::default(),
                            Classification::Unresolved,
                        )
                    }
                }
            };

            let fees = share(legs.disposal_fees, quantity, total_disposed);

            debug!(
                "disposal: {quantity} {asset} as {classification:?} against {label}",
                label = counterpart.label(),
            );
            let consumption = consume(&mut self.inventory, asset, quantity);

            if let Some(missing) = consumption.shortfall {
                output.findings.push(Finding::InventoryShortfall {
                    time: group.time,
                    asset: asset.clone(),
                    missing,
                });
            }

            let consumed: AssetAmount = consumption
                .chunks
                .iter()
                .map(|chunk| chunk.quantity)
                .sum();
            if !consumed.is_fuzzy_eq(quantity) {
                output.findings.push(Finding::ConservationMismatch {
                    time: group.time,
                    asset: asset.clone(),
                    expected: quantity,
                    actual: consumed,
                });
            }

            let chunks = consumption
                .chunks
                .into_iter()
                .map(|chunk| DisposalChunk {
                    quantity: chunk.quantity,
                    cost: chunk.cost,
                    proceeds_share: share(proceeds, chunk.quantity, quantity),
                    source: chunk.source,
                    exemption: self.exemption(chunk.source, group),
                })
                .collect();

            output.disposals.push(DisposalResult {
                time: group.time,
                asset: asset.clone(),
                quantity,
                inherited_cost: consumption.inherited_cost,
                counterpart: counterpart.clone(),
                proceeds,
                fees,
                classification,
                chunks,
            });
        }
    }

    /// Day-granularity holding period against the configured threshold.
    /// External-origin lots stay undetermined: this engine does not establish
    /// acquisition provenance for custody transfers.
    fn exemption(&self, source: ChunkSource, group: &TransactionGroup) -> ExemptionStatus {
        match source {
            ChunkSource::NoInventory => ExemptionStatus::Undetermined,
            ChunkSource::Lot {
                external_origin: true,
                ..
            } => ExemptionStatus::Undetermined,
            ChunkSource::Lot { acquired, .. } => {
                let held_days = (group.time.date_naive() - acquired.date_naive()).num_days();

                if held_days > self.config.exemption_days {
                    ExemptionStatus::Exempt { held_days }
                } else {
                    ExemptionStatus::Taxable { held_days }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::asset::AssetName;
    use crate::model::events::{group_events, Category, LedgerEvent};
    use chrono::{DateTime, Utc};

    fn at(date: &str) -> DateTime<Utc> {
        format!("{date}T12:00:00Z").parse().unwrap()
    }

    fn event(time: DateTime<Utc>, category: Category, asset: &str, amount: &str) -> LedgerEvent {
        LedgerEvent {
            time,
            category,
            asset: AssetName::new(asset),
            amount: amount.parse().unwrap(),
        }
    }

    fn run(events: Vec<LedgerEvent>) -> ProcessedLedger {
        let groups = group_events(events);
        Engine::new(EngineConfig::default()).process(&groups)
    }

    #[test]
    fn purchase_then_partial_sale() {
        let buy = at("2021-01-01");
        let sell = at("2021-06-01");
        let output = run(vec![
            event(buy, Category::Purchase, "BTC", "1.0"),
            event(buy, Category::Purchase, "BRL", "-100"),
            event(sell, Category::Sale, "BTC", "-0.6"),
            event(sell, Category::Sale, "BRL", "90"),
        ]);

        assert_eq!(output.disposals.len(), 1);
        let disposal = &output.disposals[0];
        assert_eq!(disposal.classification, Classification::CashSale);
        assert_eq!(disposal.inherited_cost, "60".parse().unwrap());
        assert_eq!(disposal.proceeds, "90".parse().unwrap());
        assert_eq!(disposal.realized_gain(), "30".parse().unwrap());

        assert_eq!(disposal.chunks.len(), 1);
        assert_eq!(disposal.chunks[0].quantity, "0.6".parse().unwrap());
        assert_eq!(disposal.chunks[0].cost, "60".parse().unwrap());
        assert!(output.findings.is_empty());
    }

    #[test]
    fn exemption_splits_across_lots() {
        let output = run(vec![
            event(at("2020-01-01"), Category::Purchase, "BTC", "0.5"),
            event(at("2020-01-01"), Category::Purchase, "BRL", "-50"),
            event(at("2020-08-01"), Category::Purchase, "BTC", "0.5"),
            event(at("2020-08-01"), Category::Purchase, "BRL", "-80"),
            event(at("2021-07-01"), Category::Sale, "BTC", "-0.8"),
            event(at("2021-07-01"), Category::Sale, "BRL", "400"),
        ]);

        let disposal = &output.disposals[0];
        assert_eq!(disposal.chunks.len(), 2);

        // first lot held 547 days: exempt; second held 334 days: taxable
        let first = &disposal.chunks[0];
        assert_eq!(first.quantity, "0.5".parse().unwrap());
        assert_eq!(first.cost, "50".parse().unwrap());
        assert_eq!(first.exemption, ExemptionStatus::Exempt { held_days: 547 });
        assert_eq!(first.proceeds_share, "250".parse().unwrap());

        let second = &disposal.chunks[1];
        assert_eq!(second.quantity, "0.3".parse().unwrap());
        assert_eq!(second.cost, "48".parse().unwrap());
        assert_eq!(second.exemption, ExemptionStatus::Taxable { held_days: 334 });
        assert_eq!(second.proceeds_share, "150".parse().unwrap());
    }

    #[test]
    fn swap_classifies_and_stocks_the_incoming_asset() {
        let buy = at("2022-01-10");
        let swap = at("2022-03-15");
        let output = run(vec![
            event(buy, Category::Purchase, "BTC", "0.5"),
            event(buy, Category::Purchase, "BRL", "-100000"),
            event(swap, Category::Sale, "BTC", "-0.5"),
            event(swap, Category::Purchase, "ETH", "8.0"),
        ]);

        let disposal = &output.disposals[0];
        assert_eq!(disposal.classification, Classification::Swap);
        assert_eq!(
            disposal.counterpart,
            Counterpart::Crypto {
                asset: AssetName::new("ETH"),
                amount: "8.0".parse().unwrap(),
            }
        );
        assert_eq!(disposal.inherited_cost, "100000".parse().unwrap());

        // the incoming ETH is a zero-cost lot acquired at the swap instant
        let eth = output
            .acquisitions
            .iter()
            .find(|acq| acq.asset == AssetName::new("ETH"))
            .unwrap();
        assert_eq!(eth.quantity, "8.0".parse().unwrap());
        assert_eq!(eth.cost, CashValue::default());
    }

    #[test]
    fn withdrawal_is_custodial_with_zero_proceeds() {
        let buy = at("2022-01-10");
        let out = at("2022-02-01");
        let output = run(vec![
            event(buy, Category::Purchase, "BTC", "1.0"),
            event(buy, Category::Purchase, "BRL", "-50000"),
            event(out, Category::Withdrawal, "BTC", "-0.4"),
        ]);

        let disposal = &output.disposals[0];
        assert_eq!(disposal.classification, Classification::Custodial);
        assert_eq!(disposal.counterpart, Counterpart::ExternalCustody);
        assert_eq!(disposal.proceeds, CashValue::default());
        assert_eq!(disposal.inherited_cost, "20000".parse().unwrap());
    }

    #[test]
    fn external_deposit_is_a_zero_cost_external_lot() {
        let output = run(vec![event(
            at("2022-01-10"),
            Category::Deposit,
            "BTC",
            "0.25",
        )]);

        assert_eq!(output.acquisitions.len(), 1);
        let acquisition = &output.acquisitions[0];
        assert!(acquisition.external_origin);
        assert_eq!(acquisition.cost, CashValue::default());
    }

    #[test]
    fn disposal_of_external_lot_is_undetermined() {
        let output = run(vec![
            event(at("2020-01-01"), Category::Deposit, "BTC", "1.0"),
            event(at("2022-01-01"), Category::Sale, "BTC", "-1.0"),
            event(at("2022-01-01"), Category::Sale, "BRL", "200000"),
        ]);

        let chunk = &output.disposals[0].chunks[0];
        assert_eq!(chunk.cost, CashValue::default());
        assert_eq!(chunk.exemption, ExemptionStatus::Undetermined);
    }

    #[test]
    fn unresolved_counterpart_is_flagged_not_fatal() {
        let buy = at("2022-01-10");
        let sell = at("2022-02-01");
        let output = run(vec![
            event(buy, Category::Purchase, "BTC", "1.0"),
            event(buy, Category::Purchase, "BRL", "-50000"),
            event(sell, Category::Sale, "BTC", "-0.5"),
        ]);

        let disposal = &output.disposals[0];
        assert_eq!(disposal.classification, Classification::Unresolved);
        assert_eq!(disposal.counterpart, Counterpart::Unknown);
        assert_eq!(disposal.proceeds, CashValue::default());
        assert!(matches!(
            output.findings[0],
            Finding::UnresolvedCounterpart { .. }
        ));
    }

    #[test]
    fn shortfall_is_recorded_and_the_run_continues() {
        let output = run(vec![
            event(at("2022-01-10"), Category::Purchase, "BTC", "1.0"),
            event(at("2022-01-10"), Category::Purchase, "BRL", "-50000"),
            event(at("2022-02-01"), Category::Sale, "BTC", "-2.0"),
            event(at("2022-02-01"), Category::Sale, "BRL", "120000"),
            // the run continues past the shortfall
            event(at("2022-03-01"), Category::Purchase, "BTC", "0.1"),
            event(at("2022-03-01"), Category::Purchase, "BRL", "-6000"),
        ]);

        let disposal = &output.disposals[0];
        assert!(disposal.had_shortfall());
        assert_eq!(disposal.chunks.len(), 2);
        assert_eq!(disposal.chunks[1].cost, CashValue::default());
        assert!(matches!(
            output.findings[0],
            Finding::InventoryShortfall { .. }
        ));
        assert_eq!(output.acquisitions.len(), 2);
    }

    #[test]
    fn group_receipts_allocate_across_disposed_assets() {
        let buy = at("2022-01-10");
        let sell = at("2022-02-01");
        let output = run(vec![
            event(buy, Category::Purchase, "XRP", "0.3"),
            event(buy, Category::Purchase, "ADA", "0.7"),
            event(buy, Category::Purchase, "BRL", "-500"),
            event(sell, Category::Sale, "XRP", "-0.3"),
            event(sell, Category::Sale, "ADA", "-0.7"),
            event(sell, Category::Sale, "BRL", "1000"),
        ]);

        assert_eq!(output.disposals.len(), 2);
        let xrp = output
            .disposals
            .iter()
            .find(|d| d.asset == AssetName::new("XRP"))
            .unwrap();
        let ada = output
            .disposals
            .iter()
            .find(|d| d.asset == AssetName::new("ADA"))
            .unwrap();

        assert_eq!(xrp.proceeds, "300".parse().unwrap());
        assert_eq!(ada.proceeds, "700".parse().unwrap());
    }

    #[test]
    fn fees_attach_to_disposals() {
        let buy = at("2022-01-10");
        let sell = at("2022-02-01");
        let output = run(vec![
            event(buy, Category::Purchase, "BTC", "1.0"),
            event(buy, Category::Purchase, "BRL", "-50000"),
            event(sell, Category::Sale, "BTC", "-1.0"),
            event(sell, Category::Sale, "BRL", "60000"),
            event(sell, Category::Fee, "BRL", "-90"),
        ]);

        assert_eq!(output.disposals[0].fees, "90".parse().unwrap());
    }

    #[test]
    fn bank_deposit_is_tracked_but_never_stocked() {
        let output = run(vec![event(
            at("2022-01-05"),
            Category::BankDeposit,
            "BRL",
            "5000",
        )]);

        assert_eq!(output.fiat_inflows.len(), 1);
        assert_eq!(output.fiat_inflows[0].amount, "5000".parse().unwrap());
        assert!(output.acquisitions.is_empty());
        assert!(output.disposals.is_empty());
    }
}
