//! Leaf arbitraries: one generator per primitive property, honoring its
//! resolved constraints.

use crate::arbitrary::{
    CombinableArbitrary, DateArbitrary, DateTimeArbitrary, DecimalArbitrary, FloatArbitrary,
    IntegerArbitrary, StringArbitrary, ValueArbitrary,
};
use crate::constraint::{Constraint, ConstraintKind, ConstraintResolver, DateLimit, NumericRange};
use crate::data::GenerateOptions;
use crate::error::{Result, TamarinError};
use crate::property::{CharSet, Metadata, Property};
use crate::reflect::TypeKind;
use crate::value::Value;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::sync::Arc;

/// Half-width of the float range used when a side is unconstrained.
const FLOAT_SPAN: f64 = 1.0e9;

/// Builds the arbitrary of every leaf property from its type and constraints.
#[derive(Clone)]
pub struct LeafGenerator {
    options: GenerateOptions,
    constraints: Arc<dyn ConstraintResolver>,
}

impl fmt::Debug for LeafGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafGenerator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl LeafGenerator {
    pub fn new(options: GenerateOptions, constraints: Arc<dyn ConstraintResolver>) -> Self {
        LeafGenerator {
            options,
            constraints,
        }
    }

    fn constraint(&self, property: &Property, kind: ConstraintKind) -> Result<Option<Constraint>> {
        self.constraints.constraint_for(property, kind)
    }

    /// The arbitrary for a leaf property. Constraint conflicts surface here,
    /// when the tree is built, not when the arbitrary is sampled.
    pub fn generate(&self, property: &Property) -> Result<ValueArbitrary> {
        let charset = charset(property);
        let arbitrary = match property.ty().kind() {
            TypeKind::Bool => CombinableArbitrary::from_fn(|source| Ok(Value::Bool(source.next_bool()))),
            TypeKind::Char => {
                CombinableArbitrary::from_fn(move |source| Ok(Value::Char(charset.pick(source))))
            }
            TypeKind::Integer(kind) => {
                let (type_min, type_max) = kind.bounds();
                let mut spec = IntegerArbitrary::new(*kind);
                if let Some(range) = self.numeric_range(property)? {
                    let min = range.min.map_or(type_min, |limit| limit.integer_lower());
                    let max = range.max.map_or(type_max, |limit| limit.integer_upper());
                    if min > type_max || max < type_min {
                        return Err(conflict(
                            property,
                            format!("[{min}, {max}] lies outside [{type_min}, {type_max}]"),
                        ));
                    }
                    spec = spec.range(min, max);
                }
                spec.build()
                    .map_err(|error| attribute(error, property))?
                    .map(Value::Int)
            }
            TypeKind::Float(_) => {
                let (min, min_inclusive, max, max_inclusive) =
                    float_bounds(self.numeric_range(property)?);
                FloatArbitrary::new()
                    .min(min, min_inclusive)
                    .max(max, max_inclusive)
                    .build()
                    .map_err(|error| attribute(error, property))?
                    .map(Value::Float)
            }
            TypeKind::Decimal => {
                let (min, min_inclusive, max, max_inclusive) =
                    float_bounds(self.numeric_range(property)?);
                let mut spec = DecimalArbitrary::new()
                    .min(min, min_inclusive)
                    .max(max, max_inclusive);
                if let Some(Constraint::Scale { integer, fraction }) =
                    self.constraint(property, ConstraintKind::DecimalScale)?
                {
                    if let Some(fraction) = fraction {
                        spec = spec.scale(fraction);
                    }
                    if let Some(integer) = integer {
                        spec = spec.integer_digits(integer);
                    }
                }
                spec.build()
                    .map_err(|error| attribute(error, property))?
                    .map(Value::Decimal)
            }
            TypeKind::String => {
                let (min, max) = self.length(
                    property,
                    ConstraintKind::StringLength,
                    self.options.string_length,
                )?;
                let mut spec = StringArbitrary::new().length(min, max).charset(charset);
                if property.metadata().contains(&Metadata::NotBlank) {
                    spec = spec.not_blank();
                }
                spec.build()
                    .map_err(|error| attribute(error, property))?
                    .map(Value::Str)
            }
            TypeKind::Date => self.date(property)?,
            TypeKind::DateTime => self.date_time(property)?,
            TypeKind::Enum(variants) => {
                if variants.is_empty() {
                    return Err(TamarinError::Resolution {
                        type_name: property.ty().name().to_string(),
                        reason: "enum has no variants".to_string(),
                    });
                }
                let choices = variants.iter().map(|v| Value::Variant(v.to_string())).collect();
                CombinableArbitrary::element_of(choices)
            }
            TypeKind::Opaque => {
                let type_name = property.ty().name().to_string();
                CombinableArbitrary::from_fn(move |_| {
                    Err(TamarinError::Resolution {
                        type_name: type_name.clone(),
                        reason: "no registered arbitrary or construction strategy".to_string(),
                    })
                })
            }
            _ => {
                return Err(TamarinError::Resolution {
                    type_name: property.ty().name().to_string(),
                    reason: "not a leaf type".to_string(),
                })
            }
        };
        Ok(arbitrary)
    }

    /// Inclusive element-count range of a container property.
    pub fn size_range(&self, property: &Property) -> Result<(usize, usize)> {
        self.length(
            property,
            ConstraintKind::ContainerSize,
            self.options.container_size,
        )
    }

    fn numeric_range(&self, property: &Property) -> Result<Option<NumericRange>> {
        match self.constraint(property, ConstraintKind::NumericRange)? {
            Some(Constraint::Range(range)) => Ok(Some(range)),
            _ => Ok(None),
        }
    }

    fn length(
        &self,
        property: &Property,
        kind: ConstraintKind,
        (default_min, default_max): (usize, usize),
    ) -> Result<(usize, usize)> {
        let (min, max) = match self.constraint(property, kind)? {
            Some(Constraint::Length { min, max }) => (min, max),
            _ => (None, None),
        };
        let range = match (min, max) {
            (Some(min), Some(max)) => (min, max),
            (Some(min), None) => (min, default_max.max(min)),
            (None, Some(max)) => (default_min.min(max), max),
            (None, None) => (default_min, default_max),
        };
        if range.0 > range.1 {
            return Err(conflict(
                property,
                format!("minimum size {} exceeds maximum {}", range.0, range.1),
            ));
        }
        Ok(range)
    }

    fn date_range(&self, property: &Property) -> Result<(Option<DateLimit>, Option<DateLimit>)> {
        match self.constraint(property, ConstraintKind::DateRange)? {
            Some(Constraint::Dates(range)) => Ok((range.min, range.max)),
            _ => Ok((None, None)),
        }
    }

    fn date(&self, property: &Property) -> Result<ValueArbitrary> {
        let (min, max) = self.date_range(property)?;
        let mut spec = DateArbitrary::new();
        if let Some(limit) = min {
            spec = spec.after(first_date(property, limit)?);
        }
        if let Some(limit) = max {
            spec = spec.before(last_date(property, limit)?);
        }
        Ok(spec
            .build()
            .map_err(|error| attribute(error, property))?
            .map(Value::Date))
    }

    fn date_time(&self, property: &Property) -> Result<ValueArbitrary> {
        let (min, max) = self.date_range(property)?;
        let mut spec = DateTimeArbitrary::new();
        if let Some(DateLimit { at, inclusive }) = min {
            spec = spec.after(if inclusive { at } else { at + Duration::seconds(1) });
        }
        if let Some(DateLimit { at, inclusive }) = max {
            spec = spec.before(if inclusive { at } else { at - Duration::seconds(1) });
        }
        Ok(spec
            .build()
            .map_err(|error| attribute(error, property))?
            .map(Value::DateTime))
    }
}

fn charset(property: &Property) -> CharSet {
    property
        .metadata()
        .iter()
        .find_map(|entry| match entry {
            Metadata::Charset(charset) => Some(*charset),
            _ => None,
        })
        .unwrap_or_default()
}

fn conflict(property: &Property, message: String) -> TamarinError {
    TamarinError::ConstraintConflict {
        property: property.to_string(),
        message,
    }
}

/// Name the property in a conflict raised by a generic arbitrary spec.
fn attribute(error: TamarinError, property: &Property) -> TamarinError {
    match error {
        TamarinError::ConstraintConflict { message, .. } => conflict(property, message),
        other => other,
    }
}

fn float_bounds(range: Option<NumericRange>) -> (f64, bool, f64, bool) {
    let range = range.unwrap_or_default();
    let max = range.max.map(|limit| (limit.as_f64(), limit.is_inclusive()));
    let min = range.min.map(|limit| (limit.as_f64(), limit.is_inclusive()));
    let (min, min_inclusive) = min.unwrap_or_else(|| {
        let floor = max.map_or(-FLOAT_SPAN, |(max, _)| (max - FLOAT_SPAN).min(-FLOAT_SPAN));
        (floor, true)
    });
    let (max, max_inclusive) =
        max.unwrap_or_else(|| ((min + FLOAT_SPAN).max(FLOAT_SPAN), true));
    (min, min_inclusive, max, max_inclusive)
}

fn is_midnight(at: &NaiveDateTime) -> bool {
    at.time() == NaiveTime::default()
}

/// Earliest calendar date admitted by a lower date limit.
fn first_date(property: &Property, limit: DateLimit) -> Result<NaiveDate> {
    let day = limit.at.date();
    if limit.inclusive && is_midnight(&limit.at) {
        return Ok(day);
    }
    day.succ_opt()
        .ok_or_else(|| conflict(property, format!("no date after {}", limit.at)))
}

/// Latest calendar date admitted by an upper date limit.
fn last_date(property: &Property, limit: DateLimit) -> Result<NaiveDate> {
    let day = limit.at.date();
    if limit.inclusive || !is_midnight(&limit.at) {
        return Ok(day);
    }
    day.pred_opt()
        .ok_or_else(|| conflict(property, format!("no date before {}", limit.at)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::MetadataConstraintResolver;
    use crate::data::Source;
    use crate::reflect::{FieldDescriptor, Reflect, TypeDescriptor};
    use crate::property::{PropertyCache, PropertyResolver};
    use chrono::Local;

    struct Fixture;

    fn fixture_descriptor() -> TypeDescriptor {
        TypeDescriptor::record::<Fixture>(
            "Fixture",
            vec![
                FieldDescriptor::new("age", u8::descriptor)
                    .with_metadata(vec![Metadata::Min(18), Metadata::Max(65)]),
                FieldDescriptor::new("ratio", f64::descriptor)
                    .with_metadata(vec![Metadata::Positive, Metadata::DecimalMax { value: 1.0, inclusive: false }]),
                FieldDescriptor::new("code", String::descriptor).with_metadata(vec![
                    Metadata::Size { min: 4, max: 4 },
                    Metadata::Charset(CharSet::Numeric),
                ]),
                FieldDescriptor::new("born", NaiveDate::descriptor)
                    .with_metadata(vec![Metadata::Past]),
                FieldDescriptor::new("due", NaiveDateTime::descriptor)
                    .with_metadata(vec![Metadata::Future]),
                FieldDescriptor::new("tiny", u8::descriptor)
                    .with_metadata(vec![Metadata::Min(300)]),
                FieldDescriptor::new("name", String::descriptor)
                    .with_metadata(vec![Metadata::NotBlank]),
            ],
        )
    }

    fn field(name: &str) -> Property {
        let resolver = PropertyResolver::new(Arc::new(PropertyCache::new(4)));
        resolver
            .resolve(&fixture_descriptor())
            .iter()
            .find(|p| p.name() == Some(name))
            .cloned()
            .unwrap()
    }

    fn generator() -> LeafGenerator {
        LeafGenerator::new(GenerateOptions::default(), Arc::new(MetadataConstraintResolver))
    }

    fn samples(name: &str, count: usize) -> Vec<Value> {
        let arbitrary = generator().generate(&field(name)).unwrap();
        let mut source = Source::from_u64(31);
        (0..count).map(|_| arbitrary.sample(&mut source).unwrap()).collect()
    }

    #[test]
    fn test_integer_range_metadata() {
        for value in samples("age", 300) {
            let age = value.as_int().unwrap();
            assert!((18..=65).contains(&age), "{age}");
        }
    }

    #[test]
    fn test_exclusive_float_bounds() {
        for value in samples("ratio", 300) {
            let Value::Float(ratio) = value else {
                panic!("expected a float, got {value:?}");
            };
            assert!(ratio > 0.0 && ratio < 1.0, "{ratio}");
        }
    }

    #[test]
    fn test_string_size_and_charset() {
        for value in samples("code", 200) {
            let code = value.as_str().unwrap().to_string();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        for value in samples("name", 200) {
            assert!(!value.as_str().unwrap().trim().is_empty());
        }
    }

    #[test]
    fn test_past_and_future_dates() {
        let today = Local::now().date_naive();
        for value in samples("born", 200) {
            let Value::Date(born) = value else {
                panic!("expected a date, got {value:?}");
            };
            assert!(born < today);
        }
        let now = Local::now().naive_local();
        for value in samples("due", 200) {
            let Value::DateTime(due) = value else {
                panic!("expected a date-time, got {value:?}");
            };
            assert!(due > now);
        }
    }

    #[test]
    fn test_range_outside_type_bounds_is_a_conflict() {
        let result = generator().generate(&field("tiny"));
        assert!(matches!(result, Err(TamarinError::ConstraintConflict { .. })));
    }

    #[test]
    fn test_container_size_defaults() {
        let root = Property::root(Vec::<u8>::descriptor());
        assert_eq!(generator().size_range(&root), Ok((0, 3)));
    }

    #[test]
    fn test_opaque_leaf_fails_when_sampled() {
        struct Handle;
        let property = Property::root(TypeDescriptor::opaque::<Handle>("Handle"));
        let arbitrary = generator().generate(&property).unwrap();
        let mut source = Source::from_u64(1);
        assert!(matches!(
            arbitrary.sample(&mut source),
            Err(TamarinError::Resolution { .. })
        ));
    }
}
