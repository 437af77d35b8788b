//! Proportional allocation of a vault breakdown to one investor.

use crate::domain::Decimal;

/// Per-token balances owned by an investor holding `investor_shares` of
/// `total_share_supply`.
///
/// `per_token[i] = underlying[i] * investor_shares / total_share_supply`.
///
/// Returns `None` when `total_share_supply <= 0`; the caller keeps the previous
/// snapshot.
pub fn allocate(
    investor_shares: &Decimal,
    total_share_supply: &Decimal,
    underlying: &[Decimal],
) -> Option<Vec<Decimal>> {
    if !total_share_supply.is_positive() {
        return None;
    }
    underlying
        .iter()
        .map(|u| (u * investor_shares).checked_div(total_share_supply))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_allocates_proportionally() {
        let out = allocate(&d("250"), &d("1000"), &[d("500")]).unwrap();
        assert_eq!(out, vec![d("125")]);
    }

    #[test]
    fn test_multi_token() {
        let out = allocate(&d("1"), &d("4"), &[d("100"), d("0.5"), d("0")]).unwrap();
        assert_eq!(out, vec![d("25"), d("0.125"), d("0")]);
    }

    #[test]
    fn test_non_positive_supply_is_skipped() {
        assert!(allocate(&d("1"), &Decimal::zero(), &[d("1")]).is_none());
        assert!(allocate(&d("1"), &d("-5"), &[d("1")]).is_none());
    }

    #[test]
    fn test_conserves_total_across_holders() {
        let supply = d("1000");
        let underlying = [d("500"), d("12.5")];
        let holders = [d("250"), d("600"), d("150")];

        let mut sums = vec![Decimal::zero(); underlying.len()];
        for shares in &holders {
            let alloc = allocate(shares, &supply, &underlying).unwrap();
            for (sum, v) in sums.iter_mut().zip(alloc) {
                *sum = &*sum + &v;
            }
        }
        assert_eq!(sums, underlying.to_vec());
    }

    #[test]
    fn test_empty_underlying() {
        assert_eq!(allocate(&d("1"), &d("2"), &[]), Some(vec![]));
    }
}
