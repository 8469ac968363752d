//! Dynamic values flowing through the property tree.
//!
//! Every node of a tree produces a [`Value`]; parents fold their children's
//! values into their own, and the root value is finally converted into the
//! requested Rust type through [`crate::Reflect::from_value`].

use crate::reflect::TypeKey;
use chrono::{NaiveDate, NaiveDateTime};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A generated or assigned value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Int(i128),
    Float(f64),
    Str(String),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Seq(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tuple(Vec<Value>),
    Record(Vec<(String, Value)>),
    Variant(String),
    Opaque(OpaqueValue),
}

impl Value {
    /// Short name of the variant, used in conversion errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Decimal(_) => "decimal",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Seq(_) => "sequence",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Tuple(_) => "tuple",
            Value::Record(_) => "record",
            Value::Variant(_) => "variant",
            Value::Opaque(_) => "opaque",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Field of a record value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Elements of a sequence, set or tuple value.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) | Value::Set(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Text used to match a map key against a `["key"]` path segment.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Char(c) => Some(c.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Variant(name) => Some(name.clone()),
            _ => None,
        }
    }

    /// Take the concrete Rust value out of an opaque value of type `T`.
    ///
    /// Any other value, including opaque values of another type, is handed
    /// back unchanged.
    pub fn take_opaque<T: 'static>(self) -> std::result::Result<T, Value> {
        match self {
            Value::Opaque(opaque) => opaque.downcast::<T>().map_err(Value::Opaque),
            other => Err(other),
        }
    }
}

/// Fixed-point decimal number: `unscaled * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    unscaled: i128,
    scale: u32,
}

impl Decimal {
    pub fn new(unscaled: i128, scale: u32) -> Self {
        Decimal { unscaled, scale }
    }

    /// Round a float to the given scale.
    pub fn from_f64(value: f64, scale: u32) -> Self {
        let factor = 10f64.powi(scale as i32);
        Decimal::new((value * factor).round() as i128, scale)
    }

    pub fn unscaled(&self) -> i128 {
        self.unscaled
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn to_f64(&self) -> f64 {
        self.unscaled as f64 / 10f64.powi(self.scale as i32)
    }

    /// Number of digits left of the decimal point.
    pub fn integer_digits(&self) -> u32 {
        let Some(factor) = 10u128.checked_pow(self.scale) else {
            return 0;
        };
        let mut integer = self.unscaled.unsigned_abs() / factor;
        let mut digits = 0;
        while integer > 0 {
            integer /= 10;
            digits += 1;
        }
        digits
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let magnitude = self.unscaled.unsigned_abs();
        if self.scale == 0 {
            return write!(f, "{sign}{magnitude}");
        }
        // Past 10^38 the integer part is zero and every digit is fractional.
        let (integer, fraction) = match 10u128.checked_pow(self.scale) {
            Some(factor) => (magnitude / factor, magnitude % factor),
            None => (0, magnitude),
        };
        write!(
            f,
            "{sign}{integer}.{fraction:0width$}",
            width = self.scale as usize
        )
    }
}

type CloneFn = fn(&(dyn Any + Send + Sync)) -> Option<Box<dyn Any + Send>>;

/// A concrete Rust value produced by a construction strategy.
///
/// Opaque values carry instances the engine cannot decompose (built by a
/// registered constructor, factory or builder). Equality compares the type
/// and the `Debug` rendering.
#[derive(Clone)]
pub struct OpaqueValue {
    type_key: TypeKey,
    debug: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
    cloner: CloneFn,
}

impl OpaqueValue {
    pub fn new<T>(value: T) -> Self
    where
        T: Clone + fmt::Debug + Send + Sync + 'static,
    {
        OpaqueValue {
            type_key: TypeKey::of::<T>(),
            debug: Arc::from(format!("{value:?}")),
            inner: Arc::new(value),
            cloner: clone_any::<T>,
        }
    }

    pub fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    pub fn is<T: 'static>(&self) -> bool {
        (*self.inner).is::<T>()
    }

    /// Recover the Rust value, or hand the opaque value back on type mismatch.
    pub fn downcast<T: 'static>(self) -> std::result::Result<T, OpaqueValue> {
        if !self.is::<T>() {
            return Err(self);
        }
        match (self.cloner)(&*self.inner).map(|boxed| boxed.downcast::<T>()) {
            Some(Ok(value)) => Ok(*value),
            _ => Err(self),
        }
    }
}

fn clone_any<T: Clone + Send + Sync + 'static>(
    value: &(dyn Any + Send + Sync),
) -> Option<Box<dyn Any + Send>> {
    value
        .downcast_ref::<T>()
        .map(|v| Box::new(v.clone()) as Box<dyn Any + Send>)
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.debug)
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_key == other.type_key && self.debug == other.debug
    }
}

/// Values that have a null inhabitant, for null injection.
pub trait Nullable {
    fn null() -> Self;
}

impl Nullable for Value {
    fn null() -> Self {
        Value::Null
    }
}

impl<T> Nullable for Option<T> {
    fn null() -> Self {
        None
    }
}

/// Conversion of Rust values into [`Value`] for SET manipulations.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for OpaqueValue {
    fn into_value(self) -> Value {
        Value::Opaque(self)
    }
}

macro_rules! int_into_value {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Int(self as i128)
                }
            }
        )*
    };
}

int_into_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for char {
    fn into_value(self) -> Value {
        Value::Char(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(self as f64)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_string())
    }
}

impl IntoValue for Decimal {
    fn into_value(self) -> Value {
        Value::Decimal(self)
    }
}

impl IntoValue for NaiveDate {
    fn into_value(self) -> Value {
        Value::Date(self)
    }
}

impl IntoValue for NaiveDateTime {
    fn into_value(self) -> Value {
        Value::DateTime(self)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(value) => value.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: IntoValue> IntoValue for Box<T> {
    fn into_value(self) -> Value {
        (*self).into_value()
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::Seq(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue, const N: usize> IntoValue for [T; N] {
    fn into_value(self) -> Value {
        Value::Seq(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue> IntoValue for HashSet<T> {
    fn into_value(self) -> Value {
        Value::Set(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue> IntoValue for BTreeSet<T> {
    fn into_value(self) -> Value {
        Value::Set(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<K: IntoValue, V: IntoValue> IntoValue for HashMap<K, V> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.into_value(), v.into_value()))
                .collect(),
        )
    }
}

impl<K: IntoValue, V: IntoValue> IntoValue for BTreeMap<K, V> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.into_value(), v.into_value()))
                .collect(),
        )
    }
}

macro_rules! tuple_into_value {
    ($($name:ident),+) => {
        impl<$($name: IntoValue),+> IntoValue for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_value(self) -> Value {
                let ($($name,)+) = self;
                Value::Tuple(vec![$($name.into_value()),+])
            }
        }
    };
}

tuple_into_value!(A, B);
tuple_into_value!(A, B, C);
tuple_into_value!(A, B, C, D);
