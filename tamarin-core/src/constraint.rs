//! Constraint resolution: from raw metadata to merged generation bounds.

use crate::error::{Result, TamarinError};
use crate::property::{Metadata, Property};
use crate::reflect::TypeKind;
use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;

/// The families of constraint a leaf generator asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    StringLength,
    ContainerSize,
    NumericRange,
    DecimalScale,
    DateRange,
}

/// One side of a numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    /// An inclusive integer bound.
    Integer(i128),
    Decimal { value: f64, inclusive: bool },
}

impl Limit {
    pub fn as_f64(&self) -> f64 {
        match self {
            Limit::Integer(i) => *i as f64,
            Limit::Decimal { value, .. } => *value,
        }
    }

    pub fn is_inclusive(&self) -> bool {
        match self {
            Limit::Integer(_) => true,
            Limit::Decimal { inclusive, .. } => *inclusive,
        }
    }

    /// Smallest integer admitted by this limit used as a lower bound.
    pub fn integer_lower(&self) -> i128 {
        match self {
            Limit::Integer(i) => *i,
            Limit::Decimal { value, inclusive } => {
                let ceil = value.ceil();
                if !inclusive && ceil == *value {
                    ceil as i128 + 1
                } else {
                    ceil as i128
                }
            }
        }
    }

    /// Largest integer admitted by this limit used as an upper bound.
    pub fn integer_upper(&self) -> i128 {
        match self {
            Limit::Integer(i) => *i,
            Limit::Decimal { value, inclusive } => {
                let floor = value.floor();
                if !inclusive && floor == *value {
                    floor as i128 - 1
                } else {
                    floor as i128
                }
            }
        }
    }

    fn compare(&self, other: &Limit) -> Ordering {
        match (self, other) {
            (Limit::Integer(a), Limit::Integer(b)) => a.cmp(b),
            _ => self
                .as_f64()
                .partial_cmp(&other.as_f64())
                .unwrap_or(Ordering::Equal),
        }
    }
}

/// Numeric bounds; `None` leaves that direction unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NumericRange {
    pub min: Option<Limit>,
    pub max: Option<Limit>,
}

impl NumericRange {
    fn raise_min(&mut self, limit: Limit) {
        self.min = Some(match self.min {
            None => limit,
            Some(current) => match limit.compare(&current) {
                Ordering::Greater => limit,
                Ordering::Equal if !limit.is_inclusive() => limit,
                _ => current,
            },
        });
    }

    fn lower_max(&mut self, limit: Limit) {
        self.max = Some(match self.max {
            None => limit,
            Some(current) => match limit.compare(&current) {
                Ordering::Less => limit,
                Ordering::Equal if !limit.is_inclusive() => limit,
                _ => current,
            },
        });
    }

    fn is_empty(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => match min.compare(&max) {
                Ordering::Greater => true,
                Ordering::Equal => !(min.is_inclusive() && max.is_inclusive()),
                Ordering::Less => false,
            },
            _ => false,
        }
    }
}

/// One side of a date or date-time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateLimit {
    pub at: NaiveDateTime,
    pub inclusive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub min: Option<DateLimit>,
    pub max: Option<DateLimit>,
}

/// Merged bounds for one property and one constraint kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    /// Inclusive string length or container element count.
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    Range(NumericRange),
    /// Maximum digits left and right of the decimal point.
    Scale {
        integer: Option<u32>,
        fraction: Option<u32>,
    },
    Dates(DateRange),
}

/// Maps a property's metadata to constraints.
///
/// Implementations must be pure: the same property and kind always yield the
/// same answer. Adapters for other metadata vocabularies implement this trait
/// and are installed on the engine builder.
pub trait ConstraintResolver: Send + Sync {
    fn constraint_for(&self, property: &Property, kind: ConstraintKind)
        -> Result<Option<Constraint>>;
}

/// Resolver for the built-in [`Metadata`] vocabulary.
///
/// Several entries of one kind are merged by intersection: the narrowest bound
/// in each direction wins, regardless of declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataConstraintResolver;

impl ConstraintResolver for MetadataConstraintResolver {
    fn constraint_for(
        &self,
        property: &Property,
        kind: ConstraintKind,
    ) -> Result<Option<Constraint>> {
        let metadata = property.metadata();
        match kind {
            ConstraintKind::StringLength | ConstraintKind::ContainerSize => {
                length_constraint(property, metadata, kind == ConstraintKind::StringLength)
            }
            ConstraintKind::NumericRange => numeric_constraint(property, metadata),
            ConstraintKind::DecimalScale => Ok(scale_constraint(metadata)),
            ConstraintKind::DateRange => date_constraint(property, metadata),
        }
    }
}

fn conflict(property: &Property, message: String) -> TamarinError {
    TamarinError::ConstraintConflict {
        property: property.to_string(),
        message,
    }
}

fn length_constraint(
    property: &Property,
    metadata: &[Metadata],
    text: bool,
) -> Result<Option<Constraint>> {
    let mut min: Option<usize> = None;
    let mut max: Option<usize> = None;
    let mut found = false;
    for entry in metadata {
        let (lo, hi) = match entry {
            Metadata::Size { min, max } => (*min, *max),
            Metadata::NotEmpty => (1, usize::MAX),
            Metadata::NotBlank if text => (1, usize::MAX),
            _ => continue,
        };
        found = true;
        min = Some(min.map_or(lo, |m| m.max(lo)));
        if hi != usize::MAX {
            max = Some(max.map_or(hi, |m| m.min(hi)));
        }
    }
    if !found {
        return Ok(None);
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(conflict(
                property,
                format!("minimum length {lo} exceeds maximum {hi}"),
            ));
        }
    }
    Ok(Some(Constraint::Length { min, max }))
}

fn numeric_constraint(property: &Property, metadata: &[Metadata]) -> Result<Option<Constraint>> {
    let mut range = NumericRange::default();
    for entry in metadata {
        match entry {
            Metadata::Min(value) => range.raise_min(Limit::Integer(*value)),
            Metadata::Max(value) => range.lower_max(Limit::Integer(*value)),
            Metadata::DecimalMin { value, inclusive } => range.raise_min(Limit::Decimal {
                value: *value,
                inclusive: *inclusive,
            }),
            Metadata::DecimalMax { value, inclusive } => range.lower_max(Limit::Decimal {
                value: *value,
                inclusive: *inclusive,
            }),
            Metadata::Positive => range.raise_min(Limit::Decimal {
                value: 0.0,
                inclusive: false,
            }),
            Metadata::PositiveOrZero => range.raise_min(Limit::Integer(0)),
            Metadata::Negative => range.lower_max(Limit::Decimal {
                value: 0.0,
                inclusive: false,
            }),
            Metadata::NegativeOrZero => range.lower_max(Limit::Integer(0)),
            _ => {}
        }
    }
    if range.min.is_none() && range.max.is_none() {
        return Ok(None);
    }
    if range.is_empty() {
        return Err(conflict(
            property,
            format!("numeric range {:?} is empty", (range.min, range.max)),
        ));
    }
    Ok(Some(Constraint::Range(range)))
}

fn scale_constraint(metadata: &[Metadata]) -> Option<Constraint> {
    let mut integer: Option<u32> = None;
    let mut fraction: Option<u32> = None;
    for entry in metadata {
        if let Metadata::Digits {
            integer: i,
            fraction: f,
        } = entry
        {
            integer = Some(integer.map_or(*i, |current| current.min(*i)));
            fraction = Some(fraction.map_or(*f, |current| current.min(*f)));
        }
    }
    if integer.is_none() && fraction.is_none() {
        return None;
    }
    Some(Constraint::Scale { integer, fraction })
}

fn date_constraint(property: &Property, metadata: &[Metadata]) -> Result<Option<Constraint>> {
    // Dates compare against the start of today so "past" excludes today.
    let now = match property.ty().kind() {
        TypeKind::Date => Local::now().date_naive().and_time(NaiveTime::default()),
        _ => Local::now().naive_local(),
    };
    let mut range = DateRange::default();
    for entry in metadata {
        let (limit, is_min) = match entry {
            Metadata::Past => (DateLimit { at: now, inclusive: false }, false),
            Metadata::PastOrPresent => (DateLimit { at: now, inclusive: true }, false),
            Metadata::Future => (DateLimit { at: now, inclusive: false }, true),
            Metadata::FutureOrPresent => (DateLimit { at: now, inclusive: true }, true),
            _ => continue,
        };
        let slot = if is_min { &mut range.min } else { &mut range.max };
        *slot = Some(match *slot {
            None => limit,
            Some(current) => narrower_date(current, limit, is_min),
        });
    }
    if range.min.is_none() && range.max.is_none() {
        return Ok(None);
    }
    if let (Some(min), Some(max)) = (range.min, range.max) {
        let gap = max.at - min.at;
        let empty = gap < Duration::zero()
            || (gap == Duration::zero() && !(min.inclusive && max.inclusive));
        if empty {
            return Err(conflict(
                property,
                format!("date range {} to {} is empty", min.at, max.at),
            ));
        }
    }
    Ok(Some(Constraint::Dates(range)))
}

fn narrower_date(current: DateLimit, candidate: DateLimit, is_min: bool) -> DateLimit {
    match candidate.at.cmp(&current.at) {
        Ordering::Greater if is_min => candidate,
        Ordering::Less if !is_min => candidate,
        Ordering::Equal if !candidate.inclusive => candidate,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyCache, PropertyResolver};
    use crate::reflect::{FieldDescriptor, Reflect, TypeDescriptor};
    use chrono::NaiveDate;
    use std::sync::Arc;

    struct Holder;

    fn field(ty: crate::reflect::TypeRef, metadata: Vec<Metadata>) -> Property {
        let record = TypeDescriptor::record::<Holder>(
            "Holder",
            vec![FieldDescriptor::new("value", ty).with_metadata(metadata)],
        );
        let resolver = PropertyResolver::new(Arc::new(PropertyCache::new(4)));
        resolver.resolve(&record)[0].clone()
    }

    fn resolve(property: &Property, kind: ConstraintKind) -> Result<Option<Constraint>> {
        MetadataConstraintResolver.constraint_for(property, kind)
    }

    #[test]
    fn test_no_metadata_means_unconstrained() {
        let property = field(i32::descriptor, vec![]);
        for kind in [
            ConstraintKind::NumericRange,
            ConstraintKind::StringLength,
            ConstraintKind::DecimalScale,
            ConstraintKind::DateRange,
        ] {
            assert_eq!(resolve(&property, kind), Ok(None));
        }
    }

    #[test]
    fn test_min_and_max_merge_into_one_range() {
        let property = field(i32::descriptor, vec![Metadata::Min(10), Metadata::Max(20)]);
        let Some(Constraint::Range(range)) =
            resolve(&property, ConstraintKind::NumericRange).unwrap()
        else {
            panic!("expected a numeric range");
        };
        assert_eq!(range.min, Some(Limit::Integer(10)));
        assert_eq!(range.max, Some(Limit::Integer(20)));
    }

    #[test]
    fn test_repeated_bounds_intersect_regardless_of_order() {
        let narrow_last = field(
            i32::descriptor,
            vec![Metadata::Min(1), Metadata::Min(5), Metadata::Max(50), Metadata::Max(9)],
        );
        let narrow_first = field(
            i32::descriptor,
            vec![Metadata::Min(5), Metadata::Min(1), Metadata::Max(9), Metadata::Max(50)],
        );
        let expected = Some(Constraint::Range(NumericRange {
            min: Some(Limit::Integer(5)),
            max: Some(Limit::Integer(9)),
        }));
        assert_eq!(resolve(&narrow_last, ConstraintKind::NumericRange), Ok(expected));
        assert_eq!(resolve(&narrow_first, ConstraintKind::NumericRange), Ok(expected));
    }

    #[test]
    fn test_sign_metadata_folds_into_range() {
        let property = field(i64::descriptor, vec![Metadata::Positive, Metadata::Max(3)]);
        let Some(Constraint::Range(range)) =
            resolve(&property, ConstraintKind::NumericRange).unwrap()
        else {
            panic!("expected a numeric range");
        };
        assert_eq!(range.min.map(|l| l.integer_lower()), Some(1));
        assert_eq!(range.max.map(|l| l.integer_upper()), Some(3));
    }

    #[test]
    fn test_conflicting_bounds_are_an_error() {
        let property = field(i32::descriptor, vec![Metadata::Min(30), Metadata::Max(20)]);
        assert!(matches!(
            resolve(&property, ConstraintKind::NumericRange),
            Err(TamarinError::ConstraintConflict { .. })
        ));

        let exclusive = field(
            f64::descriptor,
            vec![
                Metadata::DecimalMin { value: 1.0, inclusive: false },
                Metadata::DecimalMax { value: 1.0, inclusive: true },
            ],
        );
        assert!(resolve(&exclusive, ConstraintKind::NumericRange).is_err());
    }

    #[test]
    fn test_size_and_not_blank_for_strings() {
        let property = field(
            String::descriptor,
            vec![Metadata::NotBlank, Metadata::Size { min: 0, max: 5 }],
        );
        assert_eq!(
            resolve(&property, ConstraintKind::StringLength),
            Ok(Some(Constraint::Length { min: Some(1), max: Some(5) }))
        );
        let conflicting = field(String::descriptor, vec![Metadata::Size { min: 6, max: 2 }]);
        assert!(resolve(&conflicting, ConstraintKind::StringLength).is_err());
    }

    #[test]
    fn test_digits_become_scale() {
        let property = field(
            crate::value::Decimal::descriptor,
            vec![Metadata::Digits { integer: 4, fraction: 2 }],
        );
        assert_eq!(
            resolve(&property, ConstraintKind::DecimalScale),
            Ok(Some(Constraint::Scale { integer: Some(4), fraction: Some(2) }))
        );
    }

    #[test]
    fn test_past_and_future_conflict() {
        let property = field(NaiveDate::descriptor, vec![Metadata::Past, Metadata::Future]);
        assert!(matches!(
            resolve(&property, ConstraintKind::DateRange),
            Err(TamarinError::ConstraintConflict { .. })
        ));
        let past = field(NaiveDate::descriptor, vec![Metadata::Past]);
        let Some(Constraint::Dates(range)) = resolve(&past, ConstraintKind::DateRange).unwrap()
        else {
            panic!("expected a date range");
        };
        assert!(range.min.is_none());
        assert_eq!(range.max.map(|l| l.inclusive), Some(false));
    }
}
