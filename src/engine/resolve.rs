//! Leg classification and counterpart resolution within one transaction
//! group.

use crate::model::amount::{AssetAmount, CashValue};
use crate::model::asset::AssetName;
use crate::model::events::{Category, LedgerEvent, TransactionGroup};

/// A group's legs, sorted into the roles they play in the transaction.
#[derive(Debug, Default)]
pub(crate) struct ClassifiedLegs<'g> {
    /// Fiat inflows from a bank. Never enter the lot inventory.
    pub(crate) bank_deposits: Vec<&'g LedgerEvent>,

    /// Non-fiat deposits: acquisitions with no funding, external origin.
    pub(crate) external_deposits: Vec<&'g LedgerEvent>,

    /// Non-fiat purchase legs: acquisitions funded by the group's fiat
    /// outflow.
    pub(crate) acquisitions: Vec<&'g LedgerEvent>,

    /// Non-fiat outflows via sale or withdrawal.
    pub(crate) disposals: Vec<&'g LedgerEvent>,

    /// Aggregate fiat spent on the group's purchases.
    pub(crate) funding: CashValue,

    /// Currency of the funding legs, when any exist.
    pub(crate) funding_currency: Option<AssetName>,

    /// Aggregate purchase fees, allocated over acquisition legs.
    pub(crate) purchase_fees: CashValue,

    /// Aggregate plain fees, attached to the group's disposals.
    pub(crate) disposal_fees: CashValue,
}

impl<'g> ClassifiedLegs<'g> {
    pub(crate) fn classify(group: &'g TransactionGroup) -> Self {
        let mut legs = Self::default();

        for event in &group.events {
            let fiat = event.asset.is_fiat();
            match event.category {
                Category::BankDeposit if event.amount.is_positive() => {
                    legs.bank_deposits.push(event);
                }
                Category::Deposit if event.amount.is_positive() => {
                    if fiat {
                        legs.bank_deposits.push(event);
                    } else {
                        legs.external_deposits.push(event);
                    }
                }
                Category::Purchase if !fiat && event.amount.is_positive() => {
                    legs.acquisitions.push(event);
                }
                Category::Purchase if fiat && event.amount.is_negative() => {
                    legs.funding += CashValue::from(event.amount.abs());
                    legs.funding_currency.get_or_insert_with(|| event.asset.clone());
                }
                Category::Sale | Category::Withdrawal
                    if !fiat && event.amount.is_negative() =>
                {
                    legs.disposals.push(event);
                }
                Category::PurchaseFee => {
                    legs.purchase_fees += CashValue::from(event.amount.abs());
                }
                Category::Fee => {
                    legs.disposal_fees += CashValue::from(event.amount.abs());
                }
                // sale proceeds and swap receipts are resolved per disposal
                _ => {}
            }
        }

        // A deposit grouped with a funding leg was paid for like any other
        // acquisition; external origin applies only when nothing funded it.
        if legs.funding.is_positive() {
            legs.acquisitions.append(&mut legs.external_deposits);
        }

        legs
    }

    /// Distinct assets disposed in this group, in leg order.
    pub(crate) fn disposed_assets(&self) -> Vec<AssetName> {
        let mut assets: Vec<AssetName> = Vec::new();
        for event in &self.disposals {
            if !assets.contains(&event.asset) {
                assets.push(event.asset.clone());
            }
        }
        assets
    }

    /// True when any disposal leg of `asset` is a withdrawal to external
    /// custody.
    pub(crate) fn is_withdrawal(&self, asset: &AssetName) -> bool {
        self.disposals
            .iter()
            .any(|event| event.asset == *asset && event.category == Category::Withdrawal)
    }
}

/// What the group received in exchange for its disposals.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum GroupReceipt {
    Fiat {
        currency: AssetName,
        amount: CashValue,
    },
    Crypto {
        asset: AssetName,
        amount: AssetAmount,
    },
    None,
}

/// Resolve the receipt side of a group's disposals.
///
/// A fiat inflow wins over a crypto inflow; a crypto inflow only counts when
/// its asset differs from every disposed asset (otherwise it would be change,
/// not proceeds). No receipt at all leaves the disposal unresolved: reportable
/// but flagged for manual review, never a guess.
pub(crate) fn find_receipt(group: &TransactionGroup, disposed: &[AssetName]) -> GroupReceipt {
    let fiat_total: CashValue = group
        .events
        .iter()
        .filter(|event| event.asset.is_fiat() && event.amount.is_positive())
        .map(|event| CashValue::from(event.amount))
        .sum();
    if fiat_total.is_positive() {
        let currency = group
            .events
            .iter()
            .find(|event| event.asset.is_fiat() && event.amount.is_positive())
            .map(|event| event.asset.clone())
            .expect("positive fiat total implies a fiat receipt leg");

        return GroupReceipt::Fiat {
            currency,
            amount: fiat_total,
        };
    }

    let incoming = group.events.iter().find(|event| {
        !event.asset.is_fiat() && event.amount.is_positive() && !disposed.contains(&event.asset)
    });
    if let Some(receipt) = incoming {
        let amount: AssetAmount = group
            .events
            .iter()
            .filter(|event| event.asset == receipt.asset && event.amount.is_positive())
            .map(|event| event.amount)
            .sum();

        return GroupReceipt::Crypto {
            asset: receipt.asset.clone(),
            amount,
        };
    }

    GroupReceipt::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn group(legs: &[(Category, &str, &str)]) -> TransactionGroup {
        let time = Utc.with_ymd_and_hms(2022, 5, 1, 10, 0, 0).unwrap();
        TransactionGroup {
            time,
            events: legs
                .iter()
                .map(|(category, asset, amount)| LedgerEvent {
                    time,
                    category: *category,
                    asset: AssetName::new(asset),
                    amount: amount.parse().unwrap(),
                })
                .collect(),
        }
    }

    #[test]
    fn purchase_group_classification() {
        let group = group(&[
            (Category::Purchase, "BTC", "0.3"),
            (Category::Purchase, "ETH", "0.7"),
            (Category::Purchase, "BRL", "-1000"),
            (Category::PurchaseFee, "BRL", "-5"),
        ]);

        let legs = ClassifiedLegs::classify(&group);
        assert_eq!(legs.acquisitions.len(), 2);
        assert_eq!(legs.funding, "1000".parse().unwrap());
        assert_eq!(legs.purchase_fees, "5".parse().unwrap());
        assert!(legs.disposals.is_empty());
    }

    #[test]
    fn fiat_receipt_wins_over_crypto() {
        let group = group(&[
            (Category::Sale, "BTC", "-0.5"),
            (Category::Sale, "BRL", "15000"),
            (Category::Purchase, "ETH", "2.0"),
        ]);
        let disposed = [AssetName::new("BTC")];

        let receipt = find_receipt(&group, &disposed);
        assert_eq!(
            receipt,
            GroupReceipt::Fiat {
                currency: AssetName::new("BRL"),
                amount: "15000".parse().unwrap(),
            }
        );
    }

    #[test]
    fn crypto_receipt_must_differ_from_the_disposed_asset() {
        let swap = group(&[
            (Category::Sale, "BTC", "-0.5"),
            (Category::Purchase, "ETH", "8.0"),
        ]);
        let disposed = [AssetName::new("BTC")];

        assert_eq!(
            find_receipt(&swap, &disposed),
            GroupReceipt::Crypto {
                asset: AssetName::new("ETH"),
                amount: "8.0".parse().unwrap(),
            }
        );

        // an inflow of the disposed asset itself is not a receipt
        let not_a_swap = group(&[
            (Category::Sale, "BTC", "-0.5"),
            (Category::Purchase, "BTC", "0.1"),
        ]);
        assert_eq!(find_receipt(&not_a_swap, &disposed), GroupReceipt::None);
    }

    #[test]
    fn withdrawal_detection_is_per_asset() {
        let group = group(&[
            (Category::Withdrawal, "BTC", "-0.5"),
            (Category::Sale, "ETH", "-1.0"),
        ]);

        let legs = ClassifiedLegs::classify(&group);
        assert!(legs.is_withdrawal(&AssetName::new("BTC")));
        assert!(!legs.is_withdrawal(&AssetName::new("ETH")));
        assert_eq!(legs.disposed_assets().len(), 2);
    }

    #[test]
    fn funded_deposit_is_an_ordinary_acquisition() {
        let group = group(&[
            (Category::Deposit, "BTC", "0.2"),
            (Category::Purchase, "BRL", "-8000"),
        ]);

        let legs = ClassifiedLegs::classify(&group);
        assert!(legs.external_deposits.is_empty());
        assert_eq!(legs.acquisitions.len(), 1);
        assert_eq!(legs.funding, "8000".parse().unwrap());
    }

    #[test]
    fn fiat_deposit_routes_to_bank_deposits() {
        let group = group(&[
            (Category::BankDeposit, "BRL", "5000"),
            (Category::Deposit, "BTC", "0.1"),
        ]);

        let legs = ClassifiedLegs::classify(&group);
        assert_eq!(legs.bank_deposits.len(), 1);
        assert_eq!(legs.external_deposits.len(), 1);
    }
}
