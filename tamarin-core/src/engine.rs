//! The engine: shared configuration and the entry points for sampling.

use crate::arbitrary::{CombinableArbitrary, ValueArbitrary};
use crate::builder::ArbitraryBuilder;
use crate::constraint::{ConstraintResolver, MetadataConstraintResolver};
use crate::data::{GenerateOptions, Source};
use crate::error::Result;
use crate::generator::LeafGenerator;
use crate::introspector::{
    Arguments, BuilderIntrospector, CompositeIntrospector, ConstructorIntrospector,
    FactoryIntrospector, FieldIntrospector, Introspector,
};
use crate::manipulation::Spec;
use crate::property::{PropertyCache, PropertyResolver};
use crate::reflect::{Reflect, TypeKey};
use crate::value::IntoValue;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Configuration shared by every builder of one engine.
pub(crate) struct Shared {
    pub(crate) options: GenerateOptions,
    pub(crate) resolver: PropertyResolver,
    pub(crate) leaves: LeafGenerator,
    pub(crate) introspector: Arc<CompositeIntrospector>,
    pub(crate) arbitraries: HashMap<TypeKey, ValueArbitrary>,
    pub(crate) specs: HashMap<TypeKey, Spec>,
    pub(crate) strategy_targets: HashSet<TypeKey>,
}

/// Entry point for generating values.
///
/// Cloning is cheap and clones share the property cache and the random
/// stream. Builders handed out by [`Tamarin::give_me_builder`] each own an
/// independent stream split off the engine's.
#[derive(Clone)]
pub struct Tamarin {
    shared: Arc<Shared>,
    source: Arc<Mutex<Source>>,
}

impl Default for Tamarin {
    fn default() -> Self {
        Tamarin::new()
    }
}

impl fmt::Debug for Tamarin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tamarin")
            .field("options", &self.shared.options)
            .field("introspectors", &self.shared.introspector.len())
            .field("registered_arbitraries", &self.shared.arbitraries.len())
            .field("registered_specs", &self.shared.specs.len())
            .finish()
    }
}

impl Tamarin {
    /// Engine with default options.
    pub fn new() -> Self {
        TamarinBuilder::new().build()
    }

    pub fn builder() -> TamarinBuilder {
        TamarinBuilder::new()
    }

    /// Builder for `T` values.
    pub fn give_me_builder<T: Reflect>(&self) -> ArbitraryBuilder<T> {
        let source = self.source.lock().split();
        ArbitraryBuilder::new(Arc::clone(&self.shared), source)
    }

    /// One unconstrained `T`.
    pub fn give_me_one<T: Reflect>(&self) -> Result<T> {
        self.give_me_builder::<T>().sample()
    }

    /// `count` unconstrained `T`s.
    pub fn give_me<T: Reflect>(&self, count: usize) -> Result<Vec<T>> {
        self.give_me_builder::<T>().sample_list(count)
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.shared.options
    }

    pub fn property_cache(&self) -> &Arc<PropertyCache> {
        self.shared.resolver.cache()
    }

    pub fn resolver(&self) -> &PropertyResolver {
        &self.shared.resolver
    }
}

/// Assembles a [`Tamarin`] engine.
pub struct TamarinBuilder {
    options: GenerateOptions,
    cache: Option<Arc<PropertyCache>>,
    constraints: Arc<dyn ConstraintResolver>,
    introspectors: Vec<Arc<dyn Introspector>>,
    arbitraries: HashMap<TypeKey, ValueArbitrary>,
    specs: HashMap<TypeKey, Spec>,
}

impl Default for TamarinBuilder {
    fn default() -> Self {
        TamarinBuilder::new()
    }
}

impl fmt::Debug for TamarinBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TamarinBuilder")
            .field("options", &self.options)
            .field("introspectors", &self.introspectors.len())
            .field("arbitraries", &self.arbitraries.len())
            .field("specs", &self.specs.len())
            .finish()
    }
}

impl TamarinBuilder {
    pub fn new() -> Self {
        TamarinBuilder {
            options: GenerateOptions::default(),
            cache: None,
            constraints: Arc::new(MetadataConstraintResolver),
            introspectors: Vec::new(),
            arbitraries: HashMap::new(),
            specs: HashMap::new(),
        }
    }

    pub fn options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    /// Reproducible engine seeded with `seed`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = Some(seed);
        self
    }

    /// Share a property cache with other engines.
    pub fn property_cache(mut self, cache: Arc<PropertyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the built-in metadata vocabulary.
    pub fn constraint_resolver(mut self, resolver: impl ConstraintResolver + 'static) -> Self {
        self.constraints = Arc::new(resolver);
        self
    }

    /// Add a construction strategy, tried before the structural defaults and
    /// after strategies added earlier.
    pub fn introspector(mut self, introspector: impl Introspector + 'static) -> Self {
        self.introspectors.push(Arc::new(introspector));
        self
    }

    /// Construct `T` by calling `construct` with children bound to `parameters`.
    pub fn constructor<T, F>(self, parameters: &[&'static str], construct: F) -> Self
    where
        T: Reflect + Clone + fmt::Debug + Send + Sync,
        F: Fn(&mut Arguments) -> Result<T> + Send + Sync + 'static,
    {
        self.introspector(ConstructorIntrospector::new(parameters, construct))
    }

    /// Construct `T` through the associated function `factory`.
    pub fn factory<T, F>(self, factory: &'static str, parameters: &[&'static str], construct: F) -> Self
    where
        T: Reflect + Clone + fmt::Debug + Send + Sync,
        F: Fn(&mut Arguments) -> Result<T> + Send + Sync + 'static,
    {
        self.introspector(FactoryIntrospector::new(factory, parameters, construct))
    }

    /// Construct a type through a builder, see [`crate::BuilderStrategy`].
    pub fn builder_strategy(self, strategy: BuilderIntrospector) -> Self {
        self.introspector(strategy)
    }

    /// Construct `T` from its `Default` with children assigned to fields.
    pub fn field_strategy<T>(self, strategy: FieldIntrospector<T>) -> Self
    where
        T: Reflect + Default + Clone + fmt::Debug + Send + Sync,
    {
        self.introspector(strategy)
    }

    /// Generate every `T` node, at any depth, from `arbitrary`.
    pub fn register_arbitrary<T>(mut self, arbitrary: CombinableArbitrary<T>) -> Self
    where
        T: Reflect + IntoValue,
    {
        self.arbitraries.insert(
            T::descriptor().key(),
            arbitrary.map(IntoValue::into_value),
        );
        self
    }

    /// Default manipulations for every `T` node, relative to that node and
    /// applied before the caller's own. Registering twice appends.
    pub fn register<T: Reflect>(mut self, spec: Spec) -> Self {
        let key = T::descriptor().key();
        let merged = match self.specs.remove(&key) {
            Some(existing) => existing.merge(spec),
            None => spec,
        };
        self.specs.insert(key, merged);
        self
    }

    pub fn build(self) -> Tamarin {
        let TamarinBuilder {
            options,
            cache,
            constraints,
            introspectors,
            arbitraries,
            specs,
        } = self;
        let cache = cache.unwrap_or_else(|| Arc::new(PropertyCache::new(options.cache_capacity)));
        let source = options.seed.map_or_else(Source::random, Source::from_u64);
        let introspector = CompositeIntrospector::with_defaults(introspectors);
        let strategy_targets = introspector.targets();
        let shared = Shared {
            resolver: PropertyResolver::new(cache),
            leaves: LeafGenerator::new(options.clone(), constraints),
            introspector: Arc::new(introspector),
            arbitraries,
            specs,
            strategy_targets,
            options,
        };
        Tamarin {
            shared: Arc::new(shared),
            source: Arc::new(Mutex::new(source)),
        }
    }
}
