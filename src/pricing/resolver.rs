use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::campaign::models::DiscountBracket;
use crate::error::BracketError;

/// Where a quantity sits inside a campaign's bracket partition
#[derive(Debug, Clone, PartialEq)]
pub struct BracketResolution {
    pub current: DiscountBracket,
    /// Next tier in order, absent when the quantity is in the open top tier
    pub next: Option<DiscountBracket>,
    /// Percent progress toward the next tier, in [0, 100). `None` (not
    /// zero) when there is no next tier.
    pub percent_to_next: Option<Decimal>,
}

/// Resolve the tier containing `quantity` against an ordered bracket list.
///
/// The list must satisfy the partition invariant (see `validate_partition`).
/// An empty list or a quantity below the first minimum is a configuration
/// error, never a silent default.
pub fn resolve(
    brackets: &[DiscountBracket],
    quantity: i64,
) -> Result<BracketResolution, BracketError> {
    let first = brackets.first().ok_or(BracketError::Empty)?;
    if quantity < first.min_quantity {
        return Err(BracketError::BelowFirstTier {
            quantity,
            min: first.min_quantity,
        });
    }

    let idx = brackets
        .iter()
        .position(|b| b.contains(quantity))
        .ok_or(BracketError::UncoveredQuantity(quantity))?;

    let current = brackets[idx].clone();
    let next = brackets.get(idx + 1).cloned();

    let percent_to_next = next.as_ref().map(|next| {
        let span = Decimal::from(next.min_quantity - current.min_quantity);
        let covered = Decimal::from(quantity - current.min_quantity);
        (covered / span * dec!(100))
            .round_dp(2)
            .clamp(Decimal::ZERO, dec!(100))
    });

    Ok(BracketResolution {
        current,
        next,
        percent_to_next,
    })
}

/// Enforce the partition invariant: sorted by position, starting at zero,
/// contiguous, non-overlapping, with an unbounded final tier and positive
/// prices throughout.
pub fn validate_partition(brackets: &[DiscountBracket]) -> Result<(), BracketError> {
    if brackets.is_empty() {
        return Err(BracketError::Empty);
    }

    let mut expected_min = 0i64;
    let last = brackets.len() - 1;

    for (i, bracket) in brackets.iter().enumerate() {
        if bracket.min_quantity != expected_min {
            return Err(BracketError::NonContiguous {
                position: bracket.position,
                expected: expected_min,
                found: bracket.min_quantity,
            });
        }
        if bracket.unit_price <= Decimal::ZERO {
            return Err(BracketError::NonPositivePrice {
                position: bracket.position,
            });
        }
        match bracket.max_quantity {
            Some(max) => {
                if max < bracket.min_quantity {
                    return Err(BracketError::EmptyRange {
                        position: bracket.position,
                    });
                }
                if i == last {
                    return Err(BracketError::BoundedFinalTier);
                }
                expected_min = max + 1;
            }
            None => {
                if i != last {
                    return Err(BracketError::UnboundedInterior {
                        position: bracket.position,
                    });
                }
            }
        }
    }

    Ok(())
}
