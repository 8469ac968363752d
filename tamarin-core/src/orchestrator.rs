//! The sampling pipeline.
//!
//! Each sample resolves a fresh tree, applies the caller's manipulations,
//! folds node arbitraries bottom-up through the introspectors and finally
//! validates the result, regenerating the whole sample when a validator
//! rejects it.

use crate::arbitrary::{CombinableArbitrary, ValueArbitrary};
use crate::data::{FailureMode, Source};
use crate::engine::Shared;
use crate::error::{Result, TamarinError};
use crate::introspector::{Introspected, Introspector, IntrospectorContext};
use crate::manipulation::{self, Spec};
use crate::node::{ArbitraryTree, Assignment, CutOff, NodeId, NodeKind};
use crate::property::Property;
use crate::value::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Whole-sample acceptance check.
pub type Validator = Arc<dyn Fn(&Value) -> Result<bool> + Send + Sync>;

type Fold = Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;

pub(crate) struct Orchestrator<'a> {
    shared: &'a Shared,
    root: &'a Property,
    spec: &'a Spec,
    validators: &'a [Validator],
}

impl<'a> Orchestrator<'a> {
    pub(crate) fn new(
        shared: &'a Shared,
        root: &'a Property,
        spec: &'a Spec,
        validators: &'a [Validator],
    ) -> Self {
        Orchestrator {
            shared,
            root,
            spec,
            validators,
        }
    }

    /// Run the pipeline until a sample passes every validator.
    pub(crate) fn sample(&self, source: &mut Source) -> Result<Value> {
        if let Some(error) = self.spec.errors().first() {
            return Err(error.clone());
        }
        let attempts = if self.validators.is_empty() {
            1
        } else {
            self.shared.options.validation_retry_limit.max(1)
        };
        for attempt in 1..=attempts {
            let value = self.compile(source)?.sample(source)?;
            if self.accepts(&value)? {
                return Ok(value);
            }
            debug!(
                type_name = self.root.ty().name(),
                attempt,
                "sample rejected by validator, regenerating"
            );
        }
        Err(TamarinError::RetryBudgetExceeded {
            attempts,
            context: format!("no `{}` passed validation", self.root.ty()),
        })
    }

    fn accepts(&self, value: &Value) -> Result<bool> {
        for validator in self.validators {
            if !validator(value)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Resolve, manipulate and combine one tree into the root arbitrary.
    pub(crate) fn compile(&self, source: &mut Source) -> Result<ValueArbitrary> {
        trace!(type_name = self.root.ty().name(), "resolving tree");
        let mut tree = ArbitraryTree::build(self.shared, self.root.clone(), source)?;
        let root = tree.root();
        manipulation::apply(
            &mut tree,
            self.shared,
            root,
            self.spec.manipulations(),
            source,
            CutOff::Expand,
        )?;
        trace!(type_name = self.root.ty().name(), ?tree, "combining tree");
        node_arbitrary(self.shared, &tree, root)
    }
}

/// Final arbitrary of one node: its base value source, then customizers,
/// post-conditions and null injection, in that order.
fn node_arbitrary(shared: &Shared, tree: &ArbitraryTree, id: NodeId) -> Result<ValueArbitrary> {
    let node = tree.node(id);
    let mut arbitrary = match node.assignment() {
        Assignment::Fixed(value) => CombinableArbitrary::from_value(value.clone()),
        Assignment::Arbitrary(arbitrary) => arbitrary.clone(),
        Assignment::Generated => generated(shared, tree, id)?,
    };
    for customizer in node.customizers() {
        arbitrary = customizer.apply(arbitrary);
    }
    if !node.post_conditions().is_empty() {
        let conditions = node.post_conditions().to_vec();
        let budget = conditions
            .iter()
            .filter_map(|condition| condition.retry_limit())
            .max()
            .unwrap_or(shared.options.default_retry_limit);
        arbitrary = arbitrary.filter(
            move |value| conditions.iter().all(|condition| condition.test(value)),
            budget,
        );
    }
    arbitrary = arbitrary.inject_null(node.null_probability());

    if shared.options.failure_mode == FailureMode::BestEffort && id != tree.root() {
        let property = node.property().to_string();
        let fixed = arbitrary.fixed();
        let inner = arbitrary;
        arbitrary = CombinableArbitrary::with_fixedness(fixed, move |source| {
            inner.sample(source).or_else(|error| {
                warn!(%property, %error, "substituting null for failed node");
                Ok(Value::Null)
            })
        });
    }
    Ok(arbitrary)
}

fn generated(shared: &Shared, tree: &ArbitraryTree, id: NodeId) -> Result<ValueArbitrary> {
    let node = tree.node(id);
    if node.kind() == NodeKind::Leaf {
        return node.leaf().cloned().ok_or_else(|| TamarinError::Resolution {
            type_name: node.property().ty().name().to_string(),
            reason: "leaf node without an arbitrary".to_string(),
        });
    }
    let children = node
        .children()
        .iter()
        .map(|child| node_arbitrary(shared, tree, *child))
        .collect::<Result<Vec<_>>>()?;
    let fold = folder(shared, tree, id);
    let limit = shared.options.unique_retry_limit;
    match node.kind() {
        NodeKind::Set => Ok(unique_elements(children, limit, fold)),
        NodeKind::Map => {
            let keys_fixed = node
                .children()
                .iter()
                .zip(&children)
                .map(|(entry, arbitrary)| arbitrary.fixed() || has_fixed_key(tree, *entry))
                .collect();
            Ok(unique_entries(children, keys_fixed, limit, fold))
        }
        _ => Ok(CombinableArbitrary::combine(children, move |values| fold(values))),
    }
}

fn has_fixed_key(tree: &ArbitraryTree, entry: NodeId) -> bool {
    tree.node(entry)
        .children()
        .first()
        .is_some_and(|key| matches!(tree.node(*key).assignment(), Assignment::Fixed(_)))
}

/// Folds the sampled child values of `id` through the introspectors.
fn folder(shared: &Shared, tree: &ArbitraryTree, id: NodeId) -> Fold {
    let node = tree.node(id);
    let introspector = Arc::clone(&shared.introspector);
    let property = node.property().clone();
    let kind = node.kind();
    let child_properties: Vec<Property> = node
        .children()
        .iter()
        .map(|child| tree.node(*child).property().clone())
        .collect();
    Arc::new(move |values| {
        let context =
            IntrospectorContext::new(&property, kind, child_properties.iter().zip(values).collect());
        match introspector.introspect(&context)? {
            Introspected::Value(value) => Ok(value),
            Introspected::NotIntrospected => Err(TamarinError::introspection(
                property.ty().name(),
                "no introspector could construct the value",
            )),
        }
    })
}

fn duplicates_exhausted(attempts: usize, what: &str) -> TamarinError {
    TamarinError::RetryBudgetExceeded {
        attempts,
        context: format!("could not draw a distinct {what}"),
    }
}

/// Set elements: a duplicate is resampled, or dropped when its node is fixed.
fn unique_elements(children: Vec<ValueArbitrary>, limit: usize, fold: Fold) -> ValueArbitrary {
    let fixed = children.iter().all(CombinableArbitrary::fixed);
    CombinableArbitrary::with_fixedness(fixed, move |source| {
        let mut values: Vec<Value> = Vec::with_capacity(children.len());
        'children: for child in &children {
            let mut value = child.sample(source)?;
            let mut attempts = 1;
            while values.contains(&value) {
                if child.fixed() {
                    continue 'children;
                }
                if attempts >= limit {
                    return Err(duplicates_exhausted(attempts, "set element"));
                }
                value = child.sample(source)?;
                attempts += 1;
            }
            values.push(value);
        }
        fold(values)
    })
}

fn entry_key(entry: &Value) -> Option<&Value> {
    entry.elements().and_then(|pair| pair.first())
}

/// Map entries: a later fixed key replaces the earlier entry, a generated
/// duplicate key is resampled.
fn unique_entries(
    children: Vec<ValueArbitrary>,
    keys_fixed: Vec<bool>,
    limit: usize,
    fold: Fold,
) -> ValueArbitrary {
    let fixed = children.iter().all(CombinableArbitrary::fixed);
    CombinableArbitrary::with_fixedness(fixed, move |source| {
        let mut entries: Vec<Value> = Vec::with_capacity(children.len());
        for (child, key_fixed) in children.iter().zip(&keys_fixed) {
            let mut entry = child.sample(source)?;
            let mut attempts = 1;
            loop {
                let existing = entries
                    .iter()
                    .position(|earlier| entry_key(earlier) == entry_key(&entry));
                match existing {
                    None => {
                        entries.push(entry);
                        break;
                    }
                    Some(index) if *key_fixed => {
                        entries[index] = entry;
                        break;
                    }
                    Some(_) if attempts >= limit => {
                        return Err(duplicates_exhausted(attempts, "map key"));
                    }
                    Some(_) => {
                        entry = child.sample(source)?;
                        attempts += 1;
                    }
                }
            }
        }
        fold(entries)
    })
}
