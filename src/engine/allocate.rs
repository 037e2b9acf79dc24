//! Proportional allocation of an aggregate cost, fee, or proceeds figure
//! over the legs of a transaction group.

use crate::model::amount::{AssetAmount, CashValue};

/// Distribute `aggregate` over `quantities` proportionally by quantity:
/// `allocated_i = aggregate * quantity_i / sum(quantity)`.
///
/// A zero quantity sum yields zero for every leg. Allocation runs in full
/// precision; rounding belongs to the report boundary, otherwise repeated
/// partial-lot splits would compound the error.
pub(crate) fn allocate(aggregate: CashValue, quantities: &[AssetAmount]) -> Vec<CashValue> {
    let total: AssetAmount = quantities.iter().copied().sum();

    quantities
        .iter()
        .map(|quantity| share(aggregate, *quantity, total))
        .collect()
}

/// The share of `aggregate` that `part` represents of `whole`. Zero when
/// `whole` is zero.
pub(crate) fn share(aggregate: CashValue, part: AssetAmount, whole: AssetAmount) -> CashValue {
    part.fraction_of(whole)
        .map(|fraction| aggregate.portion(fraction))
        .unwrap_or_default()
}
