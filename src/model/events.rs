use crate::model::amount::AssetAmount;
use crate::model::asset::AssetName;
use chrono::{DateTime, Utc};

/// Ledger event categories, raised from the statement's free-text strings
/// exactly once at the import boundary. The engine never sees raw text.
///
/// `PurchaseFee` is kept distinct from `Fee` because purchase fees allocate
/// over the acquisition legs of a group, while plain fees attach to the
/// group's disposal.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Category {
    BankDeposit,
    Deposit,
    Purchase,
    PurchaseFee,
    Sale,
    Fee,
    Withdrawal,
}

/// One leg of an exchange transaction. Immutable once produced by the
/// normalizer.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerEvent {
    pub time: DateTime<Utc>,
    pub category: Category,
    pub asset: AssetName,
    /// Negative = outflow from the account, positive = inflow.
    pub amount: AssetAmount,
}

/// All legs sharing one exact timestamp, assumed to form a single economic
/// transaction. Processed atomically by the engine.
#[derive(Clone, Debug)]
pub struct TransactionGroup {
    pub time: DateTime<Utc>,
    pub events: Vec<LedgerEvent>,
}

/// Partition events into transaction groups, one per distinct timestamp, in
/// ascending time order.
///
/// Chronological order is a correctness precondition for FIFO consumption, so
/// it is restored here deterministically: events sort on
/// (time, category, asset, amount) regardless of input order. Legs of one
/// transaction must share an exact timestamp; economically related events at
/// distinct timestamps are never merged.
pub fn group_events(mut events: Vec<LedgerEvent>) -> Vec<TransactionGroup> {
    events.sort_by(|a, b| {
        (a.time, a.category, &a.asset, a.amount).cmp(&(b.time, b.category, &b.asset, b.amount))
    });

    let mut groups: Vec<TransactionGroup> = Vec::new();
    for event in events {
        match groups.last_mut() {
            Some(group) if group.time == event.time => group.events.push(event),
            _ => groups.push(TransactionGroup {
                time: event.time,
                events: vec![event],
            }),
        }
    }

    groups
}
