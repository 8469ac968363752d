//! Recorded overrides of tree nodes, applied in order before sampling.

use crate::arbitrary::{CombinableArbitrary, ValueArbitrary};
use crate::data::Source;
use crate::engine::Shared;
use crate::error::{Result, TamarinError};
use crate::node::{ArbitraryTree, Assignment, CutOff, NodeId};
use crate::path::{IntoPath, Path};
use crate::reflect::Reflect;
use crate::value::{IntoValue, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Element-count span used by `min_size` when no maximum is given.
pub const DEFAULT_SIZE_SPAN: usize = 3;

type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
type Supplier = Arc<dyn Fn() -> Value + Send + Sync>;
type Transform = Arc<dyn Fn(ValueArbitrary) -> ValueArbitrary + Send + Sync>;

/// Acceptance predicate attached to a node.
#[derive(Clone)]
pub struct PostCondition {
    predicate: Predicate,
    predicate_type: &'static str,
    retry_limit: Option<usize>,
}

impl PostCondition {
    /// Predicate over the node's value converted to `V`; values that do not
    /// convert are rejected.
    pub fn new<V, F>(predicate: F, retry_limit: Option<usize>) -> Self
    where
        V: Reflect,
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        PostCondition {
            predicate: Arc::new(move |value: &Value| {
                V::from_value(value.clone()).is_ok_and(|typed| predicate(&typed))
            }),
            predicate_type: std::any::type_name::<V>(),
            retry_limit,
        }
    }

    pub fn test(&self, value: &Value) -> bool {
        (self.predicate)(value)
    }

    pub fn predicate_type(&self) -> &'static str {
        self.predicate_type
    }

    pub fn retry_limit(&self) -> Option<usize> {
        self.retry_limit
    }
}

impl fmt::Debug for PostCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostCondition")
            .field("predicate_type", &self.predicate_type)
            .field("retry_limit", &self.retry_limit)
            .finish()
    }
}

/// Transformation of a node's final arbitrary.
#[derive(Clone)]
pub struct Customizer(Transform);

impl Customizer {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(ValueArbitrary) -> ValueArbitrary + Send + Sync + 'static,
    {
        Customizer(Arc::new(transform))
    }

    pub fn apply(&self, arbitrary: ValueArbitrary) -> ValueArbitrary {
        (self.0)(arbitrary)
    }
}

impl fmt::Debug for Customizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Customizer")
    }
}

/// What a manipulation does to each node it resolves to.
#[derive(Clone)]
pub enum Operation {
    Set(Value),
    /// Evaluated once per application, i.e. once per sample.
    SetLazy(Supplier),
    SetArbitrary(ValueArbitrary),
    SetNull,
    SetNotNull,
    /// Inclusive element-count range; the size is drawn when applied.
    Size { min: usize, max: usize },
    PostCondition(PostCondition),
    Customize(Customizer),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Set(_) => "set",
            Operation::SetLazy(_) => "set_lazy",
            Operation::SetArbitrary(_) => "set_arbitrary",
            Operation::SetNull => "set_null",
            Operation::SetNotNull => "set_not_null",
            Operation::Size { .. } => "size",
            Operation::PostCondition(_) => "post_condition",
            Operation::Customize(_) => "customize",
        }
    }

    /// Operations that need the target's structure, so a node frozen to null
    /// at the depth limit is grown first.
    fn reaches_inside(&self) -> bool {
        matches!(
            self,
            Operation::Set(_) | Operation::SetLazy(_) | Operation::SetNotNull | Operation::Size { .. }
        )
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Set(value) => f.debug_tuple("Set").field(value).finish(),
            Operation::Size { min, max } => f
                .debug_struct("Size")
                .field("min", min)
                .field("max", max)
                .finish(),
            Operation::PostCondition(condition) => {
                f.debug_tuple("PostCondition").field(condition).finish()
            }
            other => f.write_str(other.name()),
        }
    }
}

/// An operation addressed at a path.
#[derive(Debug, Clone)]
pub struct Manipulation {
    path: Path,
    operation: Operation,
    limit: Option<usize>,
}

impl Manipulation {
    pub fn new(path: Path, operation: Operation) -> Self {
        Manipulation {
            path,
            operation,
            limit: None,
        }
    }

    /// Touch at most `limit` of the resolved nodes.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// Ordered list of manipulations.
///
/// A `Spec` is a plain value: build one, then hand it to an arbitrary builder,
/// nest it under a path with [`Spec::set_inner`], or register it as the
/// default for a type. Malformed paths are remembered and reported when the
/// spec is sampled.
#[derive(Debug, Clone, Default)]
pub struct Spec {
    manipulations: Vec<Manipulation>,
    errors: Vec<TamarinError>,
}

impl Spec {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(mut self, path: impl IntoPath, operation: Operation, limit: Option<usize>) -> Self {
        match path.into_path() {
            Ok(path) => self.manipulations.push(Manipulation {
                path,
                operation,
                limit,
            }),
            Err(error) => self.errors.push(error),
        }
        self
    }

    pub fn push(mut self, manipulation: Manipulation) -> Self {
        self.manipulations.push(manipulation);
        self
    }

    pub fn set(self, path: impl IntoPath, value: impl IntoValue) -> Self {
        self.record(path, Operation::Set(value.into_value()), None)
    }

    pub fn set_with_limit(self, path: impl IntoPath, value: impl IntoValue, limit: usize) -> Self {
        self.record(path, Operation::Set(value.into_value()), Some(limit))
    }

    pub fn set_lazy<V, F>(self, path: impl IntoPath, supplier: F) -> Self
    where
        V: IntoValue,
        F: Fn() -> V + Send + Sync + 'static,
    {
        let supplier: Supplier = Arc::new(move || supplier().into_value());
        self.record(path, Operation::SetLazy(supplier), None)
    }

    pub fn set_arbitrary<V>(self, path: impl IntoPath, arbitrary: CombinableArbitrary<V>) -> Self
    where
        V: IntoValue + 'static,
    {
        self.record(
            path,
            Operation::SetArbitrary(arbitrary.map(IntoValue::into_value)),
            None,
        )
    }

    pub fn set_null(self, path: impl IntoPath) -> Self {
        self.record(path, Operation::SetNull, None)
    }

    pub fn set_not_null(self, path: impl IntoPath) -> Self {
        self.record(path, Operation::SetNotNull, None)
    }

    /// Exactly `size` elements.
    pub fn size(self, path: impl IntoPath, size: usize) -> Self {
        self.size_between(path, size, size)
    }

    pub fn size_between(self, path: impl IntoPath, min: usize, max: usize) -> Self {
        self.record(
            path,
            Operation::Size {
                min,
                max: max.max(min),
            },
            None,
        )
    }

    pub fn min_size(self, path: impl IntoPath, min: usize) -> Self {
        self.size_between(path, min, min.saturating_add(DEFAULT_SIZE_SPAN))
    }

    pub fn max_size(self, path: impl IntoPath, max: usize) -> Self {
        self.size_between(path, 0, max)
    }

    pub fn post_condition<V, F>(self, path: impl IntoPath, predicate: F) -> Self
    where
        V: Reflect,
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        let condition = PostCondition::new(predicate, None);
        self.record(path, Operation::PostCondition(condition), None)
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
        let condition = PostCondition::new(predicate, Some(retry_limit));
        self.record(path, Operation::PostCondition(condition), None)
    }

    pub fn customize<F>(self, path: impl IntoPath, transform: F) -> Self
    where
        F: Fn(ValueArbitrary) -> ValueArbitrary + Send + Sync + 'static,
    {
        self.record(path, Operation::Customize(Customizer::new(transform)), None)
    }

    /// Merge `inner`, rebasing each of its paths under `path`.
    pub fn set_inner(mut self, path: impl IntoPath, inner: Spec) -> Self {
        let prefix = match path.into_path() {
            Ok(prefix) => prefix,
            Err(error) => {
                self.errors.push(error);
                return self;
            }
        };
        self.errors.extend(inner.errors);
        self.manipulations
            .extend(inner.manipulations.into_iter().map(|m| Manipulation {
                path: prefix.join(&m.path),
                ..m
            }));
        self
    }

    /// Append every manipulation of `other` after this spec's.
    pub fn merge(mut self, other: Spec) -> Self {
        self.errors.extend(other.errors);
        self.manipulations.extend(other.manipulations);
        self
    }

    pub fn manipulations(&self) -> &[Manipulation] {
        &self.manipulations
    }

    /// Errors recorded while building the spec.
    pub fn errors(&self) -> &[TamarinError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.manipulations.is_empty() && self.errors.is_empty()
    }
}

/// Apply `manipulations` in order, resolving paths relative to `base`.
///
/// Every manipulation resolves its path against the tree as left by the
/// previous ones, so a wildcard sees the sizes set before it. Nodes frozen
/// at the depth limit are grown or skipped per `cut_off`.
pub(crate) fn apply(
    tree: &mut ArbitraryTree,
    shared: &Shared,
    base: NodeId,
    manipulations: &[Manipulation],
    source: &mut Source,
    cut_off: CutOff,
) -> Result<()> {
    for manipulation in manipulations {
        let mut targets =
            tree.resolve_growing(shared, base, &manipulation.path, cut_off, source)?;
        if let Some(limit) = manipulation.limit {
            targets.truncate(limit);
        }
        debug!(
            path = %manipulation.path,
            operation = manipulation.operation.name(),
            targets = targets.len(),
            "applying manipulation"
        );
        let lazy_value = match &manipulation.operation {
            Operation::SetLazy(supplier) => Some(supplier()),
            _ => None,
        };
        for id in targets {
            if manipulation.operation.reaches_inside() {
                tree.expand(shared, id, source)?;
            }
            match &manipulation.operation {
                Operation::Set(value) => tree.assign(shared, id, value.clone(), source)?,
                Operation::SetLazy(_) => {
                    let value = lazy_value.clone().unwrap_or(Value::Null);
                    tree.assign(shared, id, value, source)?
                }
                Operation::SetArbitrary(arbitrary) => {
                    let node = tree.node_mut(id);
                    node.set_assignment(Assignment::Arbitrary(arbitrary.clone()));
                    node.set_null_probability(0.0);
                }
                Operation::SetNull => tree.node_mut(id).set_null_probability(1.0),
                Operation::SetNotNull => tree.node_mut(id).set_null_probability(0.0),
                Operation::Size { min, max } => {
                    let node = tree.node(id);
                    if !node.kind().is_resizable() {
                        return Err(TamarinError::InvalidManipulation {
                            path: manipulation.path.to_string(),
                            reason: format!("`{}` has no variable size", node.property().ty()),
                        });
                    }
                    let size = source.int_in(*min as i128, *max as i128) as usize;
                    tree.node_mut(id).set_size_range(*min, *max);
                    tree.resize(shared, id, size, source)?;
                }
                Operation::PostCondition(condition) => {
                    tree.node_mut(id).push_post_condition(condition.clone())
                }
                Operation::Customize(customizer) => {
                    tree.node_mut(id).push_customizer(customizer.clone())
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_records_in_order() {
        let spec = Spec::new()
            .set("name", "a")
            .size("items", 2)
            .set_null("nickname");
        let names: Vec<_> = spec
            .manipulations()
            .iter()
            .map(|m| m.operation().name())
            .collect();
        assert_eq!(names, vec!["set", "size", "set_null"]);
        assert_eq!(spec.manipulations()[1].path(), &Path::root().field("items"));
    }

    #[test]
    fn test_bad_paths_are_deferred() {
        let spec = Spec::new().set("items[", 1).set("ok", 2);
        assert_eq!(spec.manipulations().len(), 1);
        assert!(matches!(spec.errors()[0], TamarinError::PathSyntax { .. }));
    }

    #[test]
    fn test_set_inner_prefixes_paths() {
        let inner = Spec::new().set("street", "Main").size("lines", 1);
        let spec = Spec::new().set_inner("address", inner);
        let paths: Vec<String> = spec
            .manipulations()
            .iter()
            .map(|m| m.path().to_string())
            .collect();
        assert_eq!(paths, vec!["address.street", "address.lines"]);
    }

    #[test]
    fn test_size_helpers() {
        let spec = Spec::new()
            .min_size("a", 2)
            .max_size("b", 4)
            .size_between("c", 5, 1);
        let sizes: Vec<_> = spec
            .manipulations()
            .iter()
            .map(|m| match m.operation() {
                Operation::Size { min, max } => (*min, *max),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(sizes, vec![(2, 2 + DEFAULT_SIZE_SPAN), (0, 4), (5, 5)]);
    }

    #[test]
    fn test_min_size_saturates() {
        let spec = Spec::new().min_size("a", usize::MAX - 1);
        match spec.manipulations()[0].operation() {
            Operation::Size { min, max } => assert_eq!((*min, *max), (usize::MAX - 1, usize::MAX)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_post_condition_converts_value() {
        let condition = PostCondition::new(|s: &String| s.len() < 5, None);
        assert!(condition.test(&Value::Str("abc".into())));
        assert!(!condition.test(&Value::Str("abcdef".into())));
        assert!(!condition.test(&Value::Int(1)));
        assert_eq!(condition.predicate_type(), "alloc::string::String");
    }

    #[test]
    fn test_limit_is_recorded() {
        let spec = Spec::new().set_with_limit("items[*]", 0, 2);
        assert_eq!(spec.manipulations()[0].limit(), Some(2));
    }
}
