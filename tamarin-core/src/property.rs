//! Property model: the addressable nodes of a type's structure.
//!
//! A [`Property`] is an immutable descriptor of one child of a type: a record
//! field, a container element, a map entry or one half of an entry. The
//! [`PropertyResolver`] decomposes a [`TypeDescriptor`] into its properties and
//! memoizes the result in a shared [`PropertyCache`].

use crate::error::{Result, TamarinError};
use crate::reflect::{FieldDescriptor, TypeDescriptor, TypeKey, TypeKind};
use crate::value::Value;
use lru::LruCache;
use parking_lot::Mutex;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::trace;

/// Character classes for generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CharSet {
    Alphabetic,
    Numeric,
    #[default]
    Alphanumeric,
    /// Printable ASCII, space included.
    Ascii,
}

/// Raw metadata attached to a field, read by the constraint resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    NotNull,
    Min(i128),
    Max(i128),
    DecimalMin { value: f64, inclusive: bool },
    DecimalMax { value: f64, inclusive: bool },
    Positive,
    PositiveOrZero,
    Negative,
    NegativeOrZero,
    Digits { integer: u32, fraction: u32 },
    /// Inclusive length or element-count bounds; `usize::MAX` means unbounded.
    Size { min: usize, max: usize },
    NotEmpty,
    NotBlank,
    Charset(CharSet),
    Past,
    PastOrPresent,
    Future,
    FutureOrPresent,
    /// Metadata of another vocabulary, interpreted by a custom resolver.
    Custom { kind: String, value: String },
}

/// Position of a property relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyRole {
    Root,
    Field,
    Element(usize),
    Entry(usize),
    MapKey,
    MapValue,
}

/// Immutable descriptor of one addressable node.
#[derive(Debug, Clone)]
pub struct Property {
    name: Option<String>,
    ty: TypeDescriptor,
    nullable: bool,
    owner: Option<TypeKey>,
    metadata: Vec<Metadata>,
    role: PropertyRole,
}

impl Property {
    fn new(
        name: Option<String>,
        ty: TypeDescriptor,
        owner: Option<TypeKey>,
        metadata: Vec<Metadata>,
        role: PropertyRole,
    ) -> Self {
        let (ty, nullable) = flatten_optional(ty);
        Property {
            name,
            ty,
            nullable,
            owner,
            metadata,
            role,
        }
    }

    /// Property of a whole sampled type.
    pub fn root(ty: TypeDescriptor) -> Self {
        Property::new(None, ty, None, Vec::new(), PropertyRole::Root)
    }

    fn field(owner: &TypeDescriptor, field: &FieldDescriptor) -> Self {
        Property::new(
            Some(field.name().to_string()),
            field.ty(),
            Some(owner.key()),
            field.metadata().to_vec(),
            PropertyRole::Field,
        )
    }

    fn element(owner: &TypeDescriptor, ty: TypeDescriptor, index: usize) -> Self {
        Property::new(
            None,
            ty,
            Some(owner.key()),
            Vec::new(),
            PropertyRole::Element(index),
        )
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable && !self.metadata.contains(&Metadata::NotNull)
    }

    pub fn owner(&self) -> Option<TypeKey> {
        self.owner
    }

    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    pub fn role(&self) -> PropertyRole {
        self.role
    }

    /// Extract this property's value from an already-built parent value.
    pub fn value_of(&self, parent: &Value) -> Option<Value> {
        match self.role {
            PropertyRole::Root => Some(parent.clone()),
            PropertyRole::Field => self
                .name
                .as_deref()
                .and_then(|name| parent.field(name))
                .cloned(),
            PropertyRole::Element(index) => parent
                .elements()
                .and_then(|items| items.get(index))
                .cloned(),
            PropertyRole::Entry(index) => match parent {
                Value::Map(entries) => entries
                    .get(index)
                    .map(|(key, value)| Value::Tuple(vec![key.clone(), value.clone()])),
                _ => None,
            },
            PropertyRole::MapKey => parent.elements().and_then(|pair| pair.first()).cloned(),
            PropertyRole::MapValue => parent.elements().and_then(|pair| pair.get(1)).cloned(),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.role) {
            (Some(name), _) => write!(f, "{}: {}", name, self.ty),
            (None, PropertyRole::Element(index)) | (None, PropertyRole::Entry(index)) => {
                write!(f, "[{}]: {}", index, self.ty)
            }
            (None, _) => write!(f, "{}", self.ty),
        }
    }
}

/// Strip any number of `Option` layers, recording nullability.
fn flatten_optional(mut ty: TypeDescriptor) -> (TypeDescriptor, bool) {
    let mut nullable = false;
    while let TypeKind::Optional(inner) = ty.kind() {
        let inner = inner();
        ty = inner;
        nullable = true;
    }
    (ty, nullable)
}

/// Bounded LRU cache of resolved child properties, keyed by type.
///
/// Shared by `Arc` between engines. Entries are handed out as `Arc`s, so an
/// eviction never invalidates a tree that is still being sampled.
pub struct PropertyCache {
    entries: Mutex<LruCache<TypeKey, Arc<Vec<Property>>>>,
}

impl PropertyCache {
    /// Cache holding at most `capacity` types (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PropertyCache {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached properties for `key`, resolving them under the lock
    /// if absent so concurrent callers never resolve the same type twice.
    pub fn get_or_insert_with<F>(&self, key: TypeKey, resolve: F) -> Arc<Vec<Property>>
    where
        F: FnOnce() -> Vec<Property>,
    {
        let mut entries = self.entries.lock();
        if let Some(found) = entries.get(&key) {
            return Arc::clone(found);
        }
        let resolved = Arc::new(resolve());
        trace!(type_key = %key, properties = resolved.len(), "property cache miss");
        entries.put(key, Arc::clone(&resolved));
        resolved
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

impl Default for PropertyCache {
    fn default() -> Self {
        PropertyCache::new(2_048)
    }
}

impl fmt::Debug for PropertyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Decomposes types into child properties.
#[derive(Debug, Clone)]
pub struct PropertyResolver {
    cache: Arc<PropertyCache>,
}

impl PropertyResolver {
    pub fn new(cache: Arc<PropertyCache>) -> Self {
        PropertyResolver { cache }
    }

    pub fn cache(&self) -> &Arc<PropertyCache> {
        &self.cache
    }

    /// Fixed children of a type: record fields, tuple and array slots, or the
    /// key and value of a map entry. Variable-size containers and leaves
    /// resolve to an empty list.
    pub fn resolve(&self, ty: &TypeDescriptor) -> Arc<Vec<Property>> {
        self.cache
            .get_or_insert_with(ty.key(), || resolve_uncached(ty))
    }

    /// Like [`PropertyResolver::resolve`], checking a fixed-arity type
    /// produced exactly as many children as its arity.
    pub fn resolve_checked(&self, ty: &TypeDescriptor) -> Result<Arc<Vec<Property>>> {
        let properties = self.resolve(ty);
        let expected = match ty.kind() {
            TypeKind::Tuple(elements) => Some(elements.len()),
            TypeKind::Array(_, len) => Some(*len),
            _ => None,
        };
        match expected {
            Some(arity) if arity != properties.len() => Err(TamarinError::Resolution {
                type_name: ty.name().to_string(),
                reason: format!(
                    "expected {} children for fixed arity, resolved {}",
                    arity,
                    properties.len()
                ),
            }),
            _ => Ok(properties),
        }
    }

    /// Element `index` of a sequence or set property.
    pub fn element(&self, container: &Property, index: usize) -> Result<Property> {
        match container.ty().kind() {
            TypeKind::Sequence(element) | TypeKind::Set(element) => {
                Ok(Property::element(container.ty(), element(), index))
            }
            _ => Err(TamarinError::Resolution {
                type_name: container.ty().name().to_string(),
                reason: "not a sequence or set".to_string(),
            }),
        }
    }

    /// Entry `index` of a map property.
    pub fn entry(&self, container: &Property, index: usize) -> Result<Property> {
        match container.ty().kind() {
            TypeKind::Map(key, value) => Ok(Property::new(
                None,
                TypeDescriptor::map_entry(container.ty(), *key, *value),
                Some(container.ty().key()),
                Vec::new(),
                PropertyRole::Entry(index),
            )),
            _ => Err(TamarinError::Resolution {
                type_name: container.ty().name().to_string(),
                reason: "not a map".to_string(),
            }),
        }
    }
}

fn resolve_uncached(ty: &TypeDescriptor) -> Vec<Property> {
    match ty.kind() {
        TypeKind::Record(fields) => fields.iter().map(|f| Property::field(ty, f)).collect(),
        TypeKind::Tuple(elements) if ty.key().is_entry() => {
            let mut halves = elements.iter();
            let (Some(key), Some(value)) = (halves.next(), halves.next()) else {
                return Vec::new();
            };
            vec![
                Property::new(
                    Some("key".to_string()),
                    key(),
                    Some(ty.key()),
                    Vec::new(),
                    PropertyRole::MapKey,
                ),
                Property::new(
                    Some("value".to_string()),
                    value(),
                    Some(ty.key()),
                    Vec::new(),
                    PropertyRole::MapValue,
                ),
            ]
        }
        TypeKind::Tuple(elements) => elements
            .iter()
            .enumerate()
            .map(|(i, element)| Property::element(ty, element(), i))
            .collect(),
        TypeKind::Array(element, len) => (0..*len)
            .map(|i| Property::element(ty, element(), i))
            .collect(),
        _ => Vec::new(),
    }
}
