//! Statically registered type shapes.
//!
//! Instead of inspecting a live object model, every generatable type
//! implements [`Reflect`], describing its shape once as a
//! [`TypeDescriptor`] and converting a generated [`Value`] back into itself.
//! Structs and fieldless enums get the implementation from
//! `#[derive(Reflect)]`; the standard library types are covered here.

use crate::error::{Result, TamarinError};
use crate::property::Metadata;
use crate::value::{Decimal, Value};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Lazily evaluated reference to a type's descriptor.
///
/// Function pointers keep recursive types finite: a field only materialises
/// its type's descriptor when the resolver walks into it.
pub type TypeRef = fn() -> TypeDescriptor;

/// Identity of a fully parameterised type, used as the property cache key.
///
/// Map entries are synthesised key/value pairs with no Rust type of their
/// own; they are keyed by their map's type with the entry flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    name: &'static str,
    entry: bool,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey {
            name: std::any::type_name::<T>(),
            entry: false,
        }
    }

    /// Key of the entries of the map type identified by `self`.
    pub fn entry(self) -> Self {
        TypeKey {
            name: self.name,
            entry: true,
        }
    }

    pub fn is_entry(&self) -> bool {
        self.entry
    }

    pub fn as_str(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entry {
            write!(f, "{}::Entry", self.name)
        } else {
            f.write_str(self.name)
        }
    }
}

/// Primitive integer widths and their bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerKind {
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
}

impl IntegerKind {
    /// Inclusive bounds of the Rust type.
    pub fn bounds(self) -> (i128, i128) {
        match self {
            IntegerKind::I8 => (i8::MIN as i128, i8::MAX as i128),
            IntegerKind::I16 => (i16::MIN as i128, i16::MAX as i128),
            IntegerKind::I32 => (i32::MIN as i128, i32::MAX as i128),
            IntegerKind::I64 => (i64::MIN as i128, i64::MAX as i128),
            IntegerKind::Isize => (isize::MIN as i128, isize::MAX as i128),
            IntegerKind::U8 => (0, u8::MAX as i128),
            IntegerKind::U16 => (0, u16::MAX as i128),
            IntegerKind::U32 => (0, u32::MAX as i128),
            IntegerKind::U64 => (0, u64::MAX as i128),
            IntegerKind::Usize => (0, usize::MAX as i128),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

/// Structural kind of a type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Bool,
    Char,
    Integer(IntegerKind),
    Float(FloatKind),
    String,
    Decimal,
    Date,
    DateTime,
    /// `Option<T>`; flattened into a nullable property by the resolver.
    Optional(TypeRef),
    Sequence(TypeRef),
    Set(TypeRef),
    Map(TypeRef, TypeRef),
    Tuple(Vec<TypeRef>),
    Array(TypeRef, usize),
    Record(Vec<FieldDescriptor>),
    Enum(Vec<&'static str>),
    /// A type only a registered arbitrary or introspector can produce.
    Opaque,
}

/// One declared field of a record type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    ty: TypeRef,
    metadata: Vec<Metadata>,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, ty: TypeRef) -> Self {
        FieldDescriptor {
            name,
            ty,
            metadata: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Vec<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ty(&self) -> TypeDescriptor {
        (self.ty)()
    }

    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }
}

#[derive(Debug)]
struct TypeInfo {
    key: TypeKey,
    name: String,
    kind: TypeKind,
}

/// Shape of a type: identity, display name and structural kind.
///
/// Descriptors compare equal when their [`TypeKey`]s do.
#[derive(Debug, Clone)]
pub struct TypeDescriptor(Arc<TypeInfo>);

impl TypeDescriptor {
    pub fn new<T: ?Sized + 'static>(name: impl Into<String>, kind: TypeKind) -> Self {
        TypeDescriptor(Arc::new(TypeInfo {
            key: TypeKey::of::<T>(),
            name: name.into(),
            kind,
        }))
    }

    /// Descriptor of a struct with named or positional fields.
    pub fn record<T: ?Sized + 'static>(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        TypeDescriptor::new::<T>(name, TypeKind::Record(fields))
    }

    /// Descriptor of a fieldless enum.
    pub fn enumeration<T: ?Sized + 'static>(
        name: impl Into<String>,
        variants: Vec<&'static str>,
    ) -> Self {
        TypeDescriptor::new::<T>(name, TypeKind::Enum(variants))
    }

    /// Descriptor of one key/value entry of a map type.
    pub fn map_entry(map: &TypeDescriptor, key: TypeRef, value: TypeRef) -> Self {
        TypeDescriptor(Arc::new(TypeInfo {
            key: map.key().entry(),
            name: format!("{}::Entry", map.name()),
            kind: TypeKind::Tuple(vec![key, value]),
        }))
    }

    /// Descriptor of a type the engine cannot decompose.
    pub fn opaque<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        TypeDescriptor::new::<T>(name, TypeKind::Opaque)
    }

    pub fn key(&self) -> TypeKey {
        self.0.key
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    /// Whether nodes of this type carry a variable element count.
    pub fn is_resizable(&self) -> bool {
        matches!(
            self.kind(),
            TypeKind::Sequence(_) | TypeKind::Set(_) | TypeKind::Map(_, _)
        )
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// A type the engine can generate.
pub trait Reflect: Sized + 'static {
    /// Shape of the type.
    fn descriptor() -> TypeDescriptor;

    /// Convert a generated value back into the type.
    fn from_value(value: Value) -> Result<Self>;
}

/// Named fields of a record value, consumed by derived `from_value`.
pub struct RecordFields {
    type_name: &'static str,
    fields: Vec<(String, Value)>,
}

impl RecordFields {
    pub fn new<T: Reflect>(value: Value) -> Result<Self> {
        let type_name = std::any::type_name::<T>();
        match value {
            Value::Record(fields) => Ok(RecordFields { type_name, fields }),
            other => Err(TamarinError::conversion(type_name, other.kind_name())),
        }
    }

    /// Remove and convert the named field; an absent field converts from null.
    pub fn take<V: Reflect>(&mut self, name: &str) -> Result<V> {
        let value = match self.fields.iter().position(|(n, _)| n == name) {
            Some(index) => self.fields.remove(index).1,
            None => Value::Null,
        };
        V::from_value(value).map_err(|error| match error {
            TamarinError::Conversion { expected, found } => TamarinError::Conversion {
                expected: format!("{}.{} ({})", self.type_name, name, expected),
                found,
            },
            other => other,
        })
    }
}

macro_rules! reflect_integer {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::new::<$ty>(stringify!($ty), TypeKind::Integer(IntegerKind::$kind))
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Int(i) => <$ty>::try_from(i).map_err(|_| {
                            TamarinError::conversion(stringify!($ty), format!("out of range integer {i}"))
                        }),
                        other => other
                            .take_opaque::<$ty>()
                            .map_err(|v| TamarinError::conversion(stringify!($ty), v.kind_name())),
                    }
                }
            }
        )*
    };
}

reflect_integer!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
);

impl Reflect for f64 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<f64>("f64", TypeKind::Float(FloatKind::F64))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            Value::Decimal(d) => Ok(d.to_f64()),
            other => Err(TamarinError::conversion("f64", other.kind_name())),
        }
    }
}

impl Reflect for f32 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<f32>("f32", TypeKind::Float(FloatKind::F32))
    }

    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl Reflect for bool {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<bool>("bool", TypeKind::Bool)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(TamarinError::conversion("bool", other.kind_name())),
        }
    }
}

impl Reflect for char {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<char>("char", TypeKind::Char)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Char(c) => Ok(c),
            Value::Str(s) if s.chars().count() == 1 => s
                .chars()
                .next()
                .ok_or_else(|| TamarinError::conversion("char", "empty string")),
            other => Err(TamarinError::conversion("char", other.kind_name())),
        }
    }
}

impl Reflect for String {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<String>("String", TypeKind::String)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            Value::Char(c) => Ok(c.to_string()),
            other => Err(TamarinError::conversion("String", other.kind_name())),
        }
    }
}

impl Reflect for Decimal {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<Decimal>("Decimal", TypeKind::Decimal)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(d) => Ok(d),
            Value::Int(i) => Ok(Decimal::new(i, 0)),
            Value::Float(f) => Ok(Decimal::from_f64(f, 6)),
            other => Err(TamarinError::conversion("Decimal", other.kind_name())),
        }
    }
}

impl Reflect for NaiveDate {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<NaiveDate>("NaiveDate", TypeKind::Date)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(d),
            Value::DateTime(dt) => Ok(dt.date()),
            other => Err(TamarinError::conversion("NaiveDate", other.kind_name())),
        }
    }
}

impl Reflect for NaiveDateTime {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<NaiveDateTime>("NaiveDateTime", TypeKind::DateTime)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            other => Err(TamarinError::conversion("NaiveDateTime", other.kind_name())),
        }
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn descriptor() -> TypeDescriptor {
        let inner = T::descriptor();
        TypeDescriptor::new::<Option<T>>(
            format!("Option<{}>", inner.name()),
            TypeKind::Optional(T::descriptor),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Reflect> Reflect for Box<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn from_value(value: Value) -> Result<Self> {
        T::from_value(value).map(Box::new)
    }
}

fn into_items(value: Value, expected: &str) -> Result<Vec<Value>> {
    match value {
        Value::Seq(items) | Value::Set(items) | Value::Tuple(items) => Ok(items),
        other => Err(TamarinError::conversion(expected, other.kind_name())),
    }
}

fn into_entries(value: Value, expected: &str) -> Result<Vec<(Value, Value)>> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(TamarinError::conversion(expected, other.kind_name())),
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        let element = T::descriptor();
        TypeDescriptor::new::<Vec<T>>(
            format!("Vec<{}>", element.name()),
            TypeKind::Sequence(T::descriptor),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        into_items(value, "Vec")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn descriptor() -> TypeDescriptor {
        let element = T::descriptor();
        TypeDescriptor::new::<[T; N]>(
            format!("[{}; {}]", element.name(), N),
            TypeKind::Array(T::descriptor, N),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        let items: Vec<T> = into_items(value, "array")?
            .into_iter()
            .map(T::from_value)
            .collect::<Result<_>>()?;
        let len = items.len();
        items
            .try_into()
            .map_err(|_| TamarinError::conversion(format!("array of {N}"), format!("{len} elements")))
    }
}

impl<T: Reflect + Eq + Hash> Reflect for HashSet<T> {
    fn descriptor() -> TypeDescriptor {
        let element = T::descriptor();
        TypeDescriptor::new::<HashSet<T>>(
            format!("HashSet<{}>", element.name()),
            TypeKind::Set(T::descriptor),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        into_items(value, "HashSet")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: Reflect + Ord> Reflect for BTreeSet<T> {
    fn descriptor() -> TypeDescriptor {
        let element = T::descriptor();
        TypeDescriptor::new::<BTreeSet<T>>(
            format!("BTreeSet<{}>", element.name()),
            TypeKind::Set(T::descriptor),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        into_items(value, "BTreeSet")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<K: Reflect + Eq + Hash, V: Reflect> Reflect for HashMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<HashMap<K, V>>(
            format!("HashMap<{}, {}>", K::descriptor().name(), V::descriptor().name()),
            TypeKind::Map(K::descriptor, V::descriptor),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        into_entries(value, "HashMap")?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}

impl<K: Reflect + Ord, V: Reflect> Reflect for BTreeMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<BTreeMap<K, V>>(
            format!("BTreeMap<{}, {}>", K::descriptor().name(), V::descriptor().name()),
            TypeKind::Map(K::descriptor, V::descriptor),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        into_entries(value, "BTreeMap")?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}

macro_rules! reflect_tuple {
    ($arity:literal; $($name:ident),+) => {
        impl<$($name: Reflect),+> Reflect for ($($name,)+) {
            fn descriptor() -> TypeDescriptor {
                let names: Vec<String> = vec![$($name::descriptor().name().to_string()),+];
                TypeDescriptor::new::<($($name,)+)>(
                    format!("({})", names.join(", ")),
                    TypeKind::Tuple(vec![$($name::descriptor as TypeRef),+]),
                )
            }

            fn from_value(value: Value) -> Result<Self> {
                let items = into_items(value, "tuple")?;
                if items.len() != $arity {
                    return Err(TamarinError::conversion(
                        format!("tuple of {}", $arity),
                        format!("{} elements", items.len()),
                    ));
                }
                let mut items = items.into_iter();
                Ok(($(
                    $name::from_value(items.next().unwrap_or(Value::Null))?,
                )+))
            }
        }
    };
}

reflect_tuple!(2; A, B);
reflect_tuple!(3; A, B, C);
reflect_tuple!(4; A, B, C, D);
