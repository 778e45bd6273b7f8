//! Daily spending-limit challenge.
//!
//! Each day one partner picks a limit; whatever is spent beyond it becomes
//! forced savings split evenly between both. With "no limit" everything
//! spent is split.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ValidationError};
use crate::records::LimitBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitChoice {
    /// $30
    Strict,
    /// $20
    Moderate,
    /// $10
    Gentle,
    NoLimit,
}

impl LimitChoice {
    pub fn amount(self) -> Decimal {
        match self {
            Self::Strict => Decimal::new(30, 0),
            Self::Moderate => Decimal::new(20, 0),
            Self::Gentle => Decimal::new(10, 0),
            Self::NoLimit => Decimal::ZERO,
        }
    }

    /// Map a stored limit amount back to a choice.
    pub fn from_amount(amount: Decimal) -> Option<Self> {
        [Self::Strict, Self::Moderate, Self::Gentle, Self::NoLimit]
            .into_iter()
            .find(|choice| choice.amount() == amount)
    }
}

pub fn compute_limit_outcome(
    spent: Decimal,
    choice: LimitChoice,
    description: Option<&str>,
) -> Result<LimitBody> {
    if spent <= Decimal::ZERO {
        return Err(ValidationError::InvalidAmount(spent.to_string()).into());
    }

    let limit = choice.amount();
    let two = Decimal::TWO;
    let (excess, saved_total, within_limit) = if choice == LimitChoice::NoLimit {
        (spent, spent, false)
    } else {
        let excess = (spent - limit).max(Decimal::ZERO);
        if excess > Decimal::ZERO {
            (excess, excess, false)
        } else {
            (Decimal::ZERO, Decimal::ZERO, true)
        }
    };

    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("Daily spending")
        .to_string();

    Ok(LimitBody {
        spent,
        limit,
        excess,
        saved_total,
        saved_per_person: saved_total / two,
        within_limit,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use rust_decimal_macros::dec;

    #[test]
    fn spending_over_the_limit_splits_the_excess() {
        let outcome = compute_limit_outcome(dec!(42.50), LimitChoice::Strict, None).unwrap();
        assert_eq!(outcome.excess, dec!(12.50));
        assert_eq!(outcome.saved_total, dec!(12.50));
        assert_eq!(outcome.saved_per_person, dec!(6.25));
        assert!(!outcome.within_limit);
        assert_eq!(outcome.description, "Daily spending");
    }

    #[test]
    fn spending_within_the_limit_saves_nothing() {
        let outcome =
            compute_limit_outcome(dec!(20), LimitChoice::Moderate, Some(" lunch ")).unwrap();
        assert_eq!(outcome.excess, Decimal::ZERO);
        assert_eq!(outcome.saved_per_person, Decimal::ZERO);
        assert!(outcome.within_limit);
        assert_eq!(outcome.description, "lunch");
    }

    #[test]
    fn no_limit_splits_everything() {
        let outcome = compute_limit_outcome(dec!(9), LimitChoice::NoLimit, None).unwrap();
        assert_eq!(outcome.limit, Decimal::ZERO);
        assert_eq!(outcome.excess, dec!(9));
        assert_eq!(outcome.saved_per_person, dec!(4.5));
        assert!(!outcome.within_limit);
    }

    #[test]
    fn non_positive_spending_is_rejected() {
        let err = compute_limit_outcome(Decimal::ZERO, LimitChoice::Gentle, None).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidAmount(_))
        ));
    }

    #[test]
    fn stored_amount_maps_back_to_choice() {
        assert_eq!(LimitChoice::from_amount(dec!(10)), Some(LimitChoice::Gentle));
        assert_eq!(LimitChoice::from_amount(dec!(0)), Some(LimitChoice::NoLimit));
        assert_eq!(LimitChoice::from_amount(dec!(15)), None);
    }
}
