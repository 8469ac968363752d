//! Chainable per-type arbitrary builders.

use crate::arbitrary::{CombinableArbitrary, ValueArbitrary};
use crate::data::Source;
use crate::engine::Shared;
use crate::error::Result;
use crate::manipulation::{Manipulation, Spec};
use crate::orchestrator::{Orchestrator, Validator};
use crate::path::IntoPath;
use crate::property::Property;
use crate::reflect::Reflect;
use crate::value::{IntoValue, Value};
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Generator of `T` values configured by manipulations.
///
/// Every configuration method consumes the builder and returns the
/// reconfigured one; manipulations apply in the order they were recorded.
///
/// ```ignore
/// let order: Order = tamarin
///     .give_me_builder::<Order>()
///     .size("items", 3)
///     .set("items[1].name", "pinned")
///     .sample()?;
/// ```
pub struct ArbitraryBuilder<T> {
    shared: Arc<Shared>,
    root: Property,
    spec: Spec,
    validators: Vec<Validator>,
    fixed: bool,
    source: Arc<Mutex<Source>>,
    cached: Arc<Mutex<Option<Value>>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ArbitraryBuilder<T> {
    fn clone(&self) -> Self {
        ArbitraryBuilder {
            shared: Arc::clone(&self.shared),
            root: self.root.clone(),
            spec: self.spec.clone(),
            validators: self.validators.clone(),
            fixed: self.fixed,
            source: Arc::clone(&self.source),
            cached: Arc::clone(&self.cached),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ArbitraryBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArbitraryBuilder")
            .field("type", &self.root.ty().name())
            .field("manipulations", &self.spec.manipulations().len())
            .field("validators", &self.validators.len())
            .field("fixed", &self.fixed)
            .finish()
    }
}

impl<T: Reflect> ArbitraryBuilder<T> {
    pub(crate) fn new(shared: Arc<Shared>, source: Source) -> Self {
        ArbitraryBuilder {
            shared,
            root: Property::root(T::descriptor()),
            spec: Spec::new(),
            validators: Vec::new(),
            fixed: false,
            source: Arc::new(Mutex::new(source)),
            cached: Arc::new(Mutex::new(None)),
            _marker: PhantomData,
        }
    }

    /// Reconfigure the spec; any value replayed by a fixed builder is dropped.
    fn configure(mut self, change: impl FnOnce(Spec) -> Spec) -> Self {
        let spec = std::mem::take(&mut self.spec);
        self.spec = change(spec);
        self.cached = Arc::new(Mutex::new(None));
        self
    }

    pub fn push(self, manipulation: Manipulation) -> Self {
        self.configure(|spec| spec.push(manipulation))
    }

    pub fn set(self, path: impl IntoPath, value: impl IntoValue) -> Self {
        self.configure(|spec| spec.set(path, value))
    }

    /// Set at most `limit` of the nodes `path` resolves to.
    pub fn set_with_limit(self, path: impl IntoPath, value: impl IntoValue, limit: usize) -> Self {
        self.configure(|spec| spec.set_with_limit(path, value, limit))
    }

    /// Set to the supplier's value, evaluated once per sample.
    pub fn set_lazy<V, F>(self, path: impl IntoPath, supplier: F) -> Self
    where
        V: IntoValue,
        F: Fn() -> V + Send + Sync + 'static,
    {
        self.configure(|spec| spec.set_lazy(path, supplier))
    }

    pub fn set_arbitrary<V>(self, path: impl IntoPath, arbitrary: CombinableArbitrary<V>) -> Self
    where
        V: IntoValue + 'static,
    {
        self.configure(|spec| spec.set_arbitrary(path, arbitrary))
    }

    pub fn set_null(self, path: impl IntoPath) -> Self {
        self.configure(|spec| spec.set_null(path))
    }

    pub fn set_not_null(self, path: impl IntoPath) -> Self {
        self.configure(|spec| spec.set_not_null(path))
    }

    pub fn size(self, path: impl IntoPath, size: usize) -> Self {
        self.configure(|spec| spec.size(path, size))
    }

    pub fn size_between(self, path: impl IntoPath, min: usize, max: usize) -> Self {
        self.configure(|spec| spec.size_between(path, min, max))
    }

    pub fn min_size(self, path: impl IntoPath, min: usize) -> Self {
        self.configure(|spec| spec.min_size(path, min))
    }

    pub fn max_size(self, path: impl IntoPath, max: usize) -> Self {
        self.configure(|spec| spec.max_size(path, max))
    }

    pub fn post_condition<V, F>(self, path: impl IntoPath, predicate: F) -> Self
    where
        V: Reflect,
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.configure(|spec| spec.post_condition(path, predicate))
    }

    pub fn post_condition_with_limit<V, F>(
        self,
        path: impl IntoPath,
        predicate: F,
        retry_limit: usize,
    ) -> Self
    where
        V: Reflect,
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.configure(|spec| spec.post_condition_with_limit(path, predicate, retry_limit))
    }

    pub fn customize<F>(self, path: impl IntoPath, transform: F) -> Self
    where
        F: Fn(ValueArbitrary) -> ValueArbitrary + Send + Sync + 'static,
    {
        self.configure(|spec| spec.customize(path, transform))
    }

    /// Apply `inner` with every path rebased under `path`.
    pub fn set_inner(self, path: impl IntoPath, inner: Spec) -> Self {
        self.configure(|spec| spec.set_inner(path, inner))
    }

    /// Append the manipulations of a prepared spec.
    pub fn apply_spec(self, other: Spec) -> Self {
        self.configure(|spec| spec.merge(other))
    }

    /// Reject whole samples failing `predicate`; they are regenerated up to
    /// the validation retry limit.
    pub fn validate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(move |value: &Value| {
            T::from_value(value.clone()).map(|typed| predicate(&typed))
        }));
        self.cached = Arc::new(Mutex::new(None));
        self
    }

    /// Run the pipeline once and replay that value on every later sample.
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    fn sample_value(&self, source: &mut Source) -> Result<Value> {
        if self.fixed {
            if let Some(value) = self.cached.lock().clone() {
                return Ok(value);
            }
        }
        let orchestrator = Orchestrator::new(&self.shared, &self.root, &self.spec, &self.validators);
        let value = orchestrator.sample(source)?;
        if self.fixed {
            *self.cached.lock() = Some(value.clone());
        }
        Ok(value)
    }

    /// Draw one value from this builder's own random stream.
    pub fn sample(&self) -> Result<T> {
        let mut source = self.source.lock();
        self.sample_with(&mut source)
    }

    /// Draw one value from `source`.
    pub fn sample_with(&self, source: &mut Source) -> Result<T> {
        T::from_value(self.sample_value(source)?)
    }

    /// Draw `count` independent values.
    pub fn sample_list(&self, count: usize) -> Result<Vec<T>> {
        let mut source = self.source.lock();
        (0..count).map(|_| self.sample_with(&mut source)).collect()
    }

    /// Freeze the configuration into a reusable arbitrary; it is fixed when
    /// this builder is.
    pub fn build(&self) -> CombinableArbitrary<T> {
        let builder = self.clone();
        CombinableArbitrary::with_fixedness(self.fixed, move |source| builder.sample_with(source))
    }
}
