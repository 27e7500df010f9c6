//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are never mutated in place: a transfer's
/// counterpart snapshot, a report window, a movement total. Two values with the
/// same attributes are the same value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
