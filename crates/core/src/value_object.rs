//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. A
/// [`Quantity`](crate::Quantity) of `250 g` is a value object; an ingredient
/// holding 250 g of stock is an entity.
///
/// To "modify" a value object, build a new one:
///
/// ```ignore
/// let grams = Quantity::new(dec!(0.25), MeasurementUnit::Kilogram).to_base()?;
/// assert_eq!(grams, Quantity::new(dec!(250), MeasurementUnit::Gram));
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
