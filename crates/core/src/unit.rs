//! Measurement units and unit-group conversion.
//!
//! Units are partitioned into incompatible groups (weight, volume, count). Every
//! unit carries a fixed multiplicative factor to its group's base unit:
//!
//! | Unit | Group | Factor to base |
//! |---|---|---|
//! | `kg` | weight | 1000 (base: `g`) |
//! | `g` | weight | 1 |
//! | `l` | volume | 1000 (base: `ml`) |
//! | `ml` | volume | 1 |
//! | `pcs` | count | 1 |
//!
//! Amounts are exact decimals; conversions under these factors never lose
//! precision. Only display rounds (to 3 decimal places).

use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value_object::ValueObject;

/// Number of decimal places shown when a quantity is displayed.
pub const DISPLAY_DECIMALS: u32 = 3;

/// A group of mutually convertible units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitGroup {
    Weight,
    Volume,
    Count,
}

impl UnitGroup {
    /// Canonical base unit of the group.
    pub fn base_unit(self) -> MeasurementUnit {
        match self {
            UnitGroup::Weight => MeasurementUnit::Gram,
            UnitGroup::Volume => MeasurementUnit::Milliliter,
            UnitGroup::Count => MeasurementUnit::Piece,
        }
    }
}

impl core::fmt::Display for UnitGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            UnitGroup::Weight => "weight",
            UnitGroup::Volume => "volume",
            UnitGroup::Count => "count",
        };
        f.write_str(s)
    }
}

/// Unit of physical quantity used for stock and recipes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementUnit {
    #[serde(rename = "kg", alias = "kilogram")]
    Kilogram,
    #[serde(rename = "g", alias = "gram")]
    Gram,
    #[serde(rename = "l", alias = "liter", alias = "litre")]
    Liter,
    #[serde(rename = "ml", alias = "milliliter", alias = "millilitre")]
    Milliliter,
    #[serde(rename = "pcs", alias = "piece", alias = "pc")]
    Piece,
}

impl MeasurementUnit {
    pub const ALL: [MeasurementUnit; 5] = [
        MeasurementUnit::Kilogram,
        MeasurementUnit::Gram,
        MeasurementUnit::Liter,
        MeasurementUnit::Milliliter,
        MeasurementUnit::Piece,
    ];

    pub fn group(self) -> UnitGroup {
        match self {
            MeasurementUnit::Kilogram | MeasurementUnit::Gram => UnitGroup::Weight,
            MeasurementUnit::Liter | MeasurementUnit::Milliliter => UnitGroup::Volume,
            MeasurementUnit::Piece => UnitGroup::Count,
        }
    }

    /// Multiplicative factor from this unit to its group's base unit.
    pub fn factor(self) -> Decimal {
        match self {
            MeasurementUnit::Kilogram | MeasurementUnit::Liter => Decimal::ONE_THOUSAND,
            MeasurementUnit::Gram | MeasurementUnit::Milliliter | MeasurementUnit::Piece => {
                Decimal::ONE
            }
        }
    }

    pub fn base_unit(self) -> MeasurementUnit {
        self.group().base_unit()
    }

    pub fn is_base(self) -> bool {
        self.base_unit() == self
    }

    /// Canonical symbol (`kg`, `g`, `l`, `ml`, `pcs`), also used for storage.
    pub fn symbol(self) -> &'static str {
        match self {
            MeasurementUnit::Kilogram => "kg",
            MeasurementUnit::Gram => "g",
            MeasurementUnit::Liter => "l",
            MeasurementUnit::Milliliter => "ml",
            MeasurementUnit::Piece => "pcs",
        }
    }
}

impl core::fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for MeasurementUnit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit = match s.trim().to_ascii_lowercase().as_str() {
            "kg" | "kilogram" | "kilograms" => MeasurementUnit::Kilogram,
            "g" | "gram" | "grams" => MeasurementUnit::Gram,
            "l" | "liter" | "liters" | "litre" | "litres" => MeasurementUnit::Liter,
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
                MeasurementUnit::Milliliter
            }
            "pcs" | "pc" | "piece" | "pieces" => MeasurementUnit::Piece,
            _ => return Err(UnitError::Unknown(s.to_string())),
        };
        Ok(unit)
    }
}

/// Unit-level failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// The two units belong to different groups (e.g. volume vs weight).
    #[error("incompatible units: {left} ({left_group}) vs {right} ({right_group})")]
    Incompatible {
        left: MeasurementUnit,
        left_group: UnitGroup,
        right: MeasurementUnit,
        right_group: UnitGroup,
    },

    #[error("unknown unit: {0:?}")]
    Unknown(String),

    /// The converted amount does not fit in a `Decimal`.
    #[error("{amount} {unit} is too large to convert to {target}")]
    Overflow {
        amount: Decimal,
        unit: MeasurementUnit,
        target: MeasurementUnit,
    },
}

/// Express `quantity` (given in `unit`) in the base unit of the unit's group.
pub fn to_base(quantity: Decimal, unit: MeasurementUnit) -> Result<Decimal, UnitError> {
    quantity
        .checked_mul(unit.factor())
        .ok_or(UnitError::Overflow {
            amount: quantity,
            unit,
            target: unit.base_unit(),
        })
}

/// Express a base-unit `quantity` in `unit`.
pub fn from_base(quantity: Decimal, unit: MeasurementUnit) -> Decimal {
    quantity / unit.factor()
}

/// Fail with [`UnitError::Incompatible`] if the units belong to different groups.
pub fn assert_compatible(left: MeasurementUnit, right: MeasurementUnit) -> Result<(), UnitError> {
    if left.group() == right.group() {
        return Ok(());
    }
    Err(UnitError::Incompatible {
        left,
        left_group: left.group(),
        right,
        right_group: right.group(),
    })
}

/// Convert `quantity` from one unit to another unit of the same group.
pub fn convert(
    quantity: Decimal,
    from: MeasurementUnit,
    to: MeasurementUnit,
) -> Result<Decimal, UnitError> {
    assert_compatible(from, to)?;
    let base = to_base(quantity, from).map_err(|_| UnitError::Overflow {
        amount: quantity,
        unit: from,
        target: to,
    })?;
    Ok(from_base(base, to))
}

/// Round an amount for display (3 dp, half away from zero, trailing zeros trimmed).
pub fn display_amount(amount: Decimal) -> Decimal {
    amount
        .round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// An amount in a specific unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quantity {
    amount: Decimal,
    unit: MeasurementUnit,
}

impl ValueObject for Quantity {}

impl Quantity {
    pub fn new(amount: Decimal, unit: MeasurementUnit) -> Self {
        Self { amount, unit }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn unit(&self) -> MeasurementUnit {
        self.unit
    }

    /// Same amount expressed in the group's base unit.
    pub fn to_base(&self) -> Result<Quantity, UnitError> {
        Ok(Quantity::new(
            to_base(self.amount, self.unit)?,
            self.unit.base_unit(),
        ))
    }

    pub fn convert_to(&self, unit: MeasurementUnit) -> Result<Quantity, UnitError> {
        Ok(Quantity::new(convert(self.amount, self.unit, unit)?, unit))
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", display_amount(self.amount), self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn kilograms_convert_to_grams() {
        assert_eq!(to_base(dec!(0.25), MeasurementUnit::Kilogram).unwrap(), dec!(250));
        assert_eq!(to_base(dec!(0.75), MeasurementUnit::Kilogram).unwrap(), dec!(750));
        assert_eq!(from_base(dec!(750), MeasurementUnit::Kilogram), dec!(0.75));
    }

    #[test]
    fn base_units_have_unit_factor() {
        for unit in MeasurementUnit::ALL {
            assert_eq!(unit.base_unit().factor(), Decimal::ONE);
            assert!(unit.base_unit().is_base());
        }
        assert!(!MeasurementUnit::Liter.is_base());
    }

    #[test]
    fn compatible_units_share_a_group() {
        assert!(assert_compatible(MeasurementUnit::Kilogram, MeasurementUnit::Gram).is_ok());
        assert!(assert_compatible(MeasurementUnit::Liter, MeasurementUnit::Milliliter).is_ok());
        assert!(assert_compatible(MeasurementUnit::Piece, MeasurementUnit::Piece).is_ok());
    }

    #[test]
    fn volume_against_weight_is_rejected() {
        let err = assert_compatible(MeasurementUnit::Milliliter, MeasurementUnit::Kilogram)
            .unwrap_err();
        assert_eq!(
            err,
            UnitError::Incompatible {
                left: MeasurementUnit::Milliliter,
                left_group: UnitGroup::Volume,
                right: MeasurementUnit::Kilogram,
                right_group: UnitGroup::Weight,
            }
        );
        assert!(convert(dec!(1), MeasurementUnit::Piece, MeasurementUnit::Gram).is_err());
    }

    #[test]
    fn convert_between_non_base_and_base() {
        assert_eq!(
            convert(dec!(1500), MeasurementUnit::Milliliter, MeasurementUnit::Liter).unwrap(),
            dec!(1.5)
        );
        let q = Quantity::new(dec!(2), MeasurementUnit::Liter);
        assert_eq!(q.to_base().unwrap(), Quantity::new(dec!(2000), MeasurementUnit::Milliliter));
    }

    #[test]
    fn oversized_amounts_fail_instead_of_overflowing() {
        let err = to_base(Decimal::MAX, MeasurementUnit::Liter).unwrap_err();
        assert_eq!(
            err,
            UnitError::Overflow {
                amount: Decimal::MAX,
                unit: MeasurementUnit::Liter,
                target: MeasurementUnit::Milliliter,
            }
        );
        assert!(matches!(
            convert(Decimal::MAX, MeasurementUnit::Kilogram, MeasurementUnit::Gram),
            Err(UnitError::Overflow { .. })
        ));
        assert_eq!(to_base(Decimal::MAX, MeasurementUnit::Gram).unwrap(), Decimal::MAX);
    }

    #[test]
    fn display_rounds_to_three_places() {
        let third = Decimal::ONE / dec!(3);
        assert_eq!(
            Quantity::new(third, MeasurementUnit::Kilogram).to_string(),
            "0.333 kg"
        );
        assert_eq!(Quantity::new(dec!(250.000), MeasurementUnit::Gram).to_string(), "250 g");
        assert_eq!(display_amount(dec!(0.0005)), dec!(0.001));
    }

    #[test]
    fn parse_accepts_symbols_and_names() {
        assert_eq!("KG".parse::<MeasurementUnit>().unwrap(), MeasurementUnit::Kilogram);
        assert_eq!("litre".parse::<MeasurementUnit>().unwrap(), MeasurementUnit::Liter);
        assert_eq!(" pcs ".parse::<MeasurementUnit>().unwrap(), MeasurementUnit::Piece);
        assert_eq!(
            "cup".parse::<MeasurementUnit>().unwrap_err(),
            UnitError::Unknown("cup".to_string())
        );
        for unit in MeasurementUnit::ALL {
            assert_eq!(unit.symbol().parse::<MeasurementUnit>().unwrap(), unit);
        }
    }

    #[test]
    fn serde_uses_symbols() {
        let json = serde_json::to_string(&MeasurementUnit::Milliliter).unwrap();
        assert_eq!(json, "\"ml\"");
        let unit: MeasurementUnit = serde_json::from_str("\"kilogram\"").unwrap();
        assert_eq!(unit, MeasurementUnit::Kilogram);
    }

    fn any_unit() -> impl Strategy<Value = MeasurementUnit> {
        prop::sample::select(MeasurementUnit::ALL.to_vec())
    }

    fn any_amount() -> impl Strategy<Value = Decimal> {
        (0i64..1_000_000_000_000i64, 0u32..=6).prop_map(|(m, s)| Decimal::new(m, s))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: from_base(to_base(q, u), u) == q for every unit.
        #[test]
        fn base_round_trip_is_exact(amount in any_amount(), unit in any_unit()) {
            prop_assert_eq!(from_base(to_base(amount, unit).unwrap(), unit), amount);
        }

        /// Property: converting to a compatible unit and back returns the original amount.
        #[test]
        fn compatible_conversion_round_trips(amount in any_amount(), from in any_unit(), to in any_unit()) {
            match convert(amount, from, to) {
                Ok(converted) => {
                    prop_assert_eq!(from.group(), to.group());
                    prop_assert_eq!(convert(converted, to, from).unwrap(), amount);
                }
                Err(_) => prop_assert_ne!(from.group(), to.group()),
            }
        }
    }
}
