use super::{Introspected, Introspector, IntrospectorContext};
use crate::error::{Result, TamarinError};
use crate::node::NodeKind;
use crate::reflect::TypeKey;
use crate::value::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Folds record children into a `Value::Record` by field name.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordIntrospector;

impl Introspector for RecordIntrospector {
    fn introspect(&self, context: &IntrospectorContext<'_>) -> Result<Introspected> {
        if context.kind() != NodeKind::Record {
            return Ok(Introspected::NotIntrospected);
        }
        let fields = context
            .children()
            .iter()
            .filter_map(|(property, value)| {
                property
                    .name()
                    .map(|name| (name.to_string(), value.clone()))
            })
            .collect();
        Ok(Introspected::Value(Value::Record(fields)))
    }
}

/// Folds container children into sequence, set, map and tuple literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerIntrospector;

impl Introspector for ContainerIntrospector {
    fn introspect(&self, context: &IntrospectorContext<'_>) -> Result<Introspected> {
        let values = || context.values().cloned().collect::<Vec<_>>();
        let value = match context.kind() {
            NodeKind::Sequence | NodeKind::Array => Value::Seq(values()),
            NodeKind::Set => Value::Set(values()),
            NodeKind::Tuple | NodeKind::Entry => Value::Tuple(values()),
            NodeKind::Map => {
                let entries = context
                    .values()
                    .map(|entry| match entry.elements() {
                        Some([key, value]) => Ok((key.clone(), value.clone())),
                        _ => Err(TamarinError::introspection(
                            context.ty().name(),
                            format!("map entry is a {}, not a pair", entry.kind_name()),
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Value::Map(entries)
            }
            _ => return Ok(Introspected::NotIntrospected),
        };
        Ok(Introspected::Value(value))
    }
}

/// Tries strategies in priority order.
///
/// A strategy answering `NotIntrospected` or failing hands over to the next
/// one; when none succeeds the last error is returned, or `NotIntrospected`
/// if no strategy failed.
#[derive(Clone, Default)]
pub struct CompositeIntrospector {
    strategies: Vec<Arc<dyn Introspector>>,
}

impl CompositeIntrospector {
    pub fn new(strategies: Vec<Arc<dyn Introspector>>) -> Self {
        CompositeIntrospector { strategies }
    }

    /// `custom` strategies first, then the structural defaults.
    pub fn with_defaults(custom: Vec<Arc<dyn Introspector>>) -> Self {
        let mut strategies = custom;
        strategies.push(Arc::new(RecordIntrospector));
        strategies.push(Arc::new(ContainerIntrospector));
        CompositeIntrospector { strategies }
    }

    pub fn push(&mut self, strategy: Arc<dyn Introspector>) {
        self.strategies.push(strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Types some strategy is dedicated to.
    pub fn targets(&self) -> HashSet<TypeKey> {
        self.strategies.iter().filter_map(|s| s.target()).collect()
    }
}

impl fmt::Debug for CompositeIntrospector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeIntrospector")
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

impl Introspector for CompositeIntrospector {
    fn introspect(&self, context: &IntrospectorContext<'_>) -> Result<Introspected> {
        let key = context.ty().key();
        let mut last_error = None;
        for strategy in &self.strategies {
            if strategy.target().is_some_and(|target| target != key) {
                continue;
            }
            match strategy.introspect(context) {
                Ok(Introspected::NotIntrospected) => continue,
                Ok(found) => return Ok(found),
                Err(error) => {
                    debug!(type_name = context.ty().name(), %error, "introspector failed, falling back");
                    last_error = Some(error);
                }
            }
        }
        match last_error {
            Some(error) => Err(error),
            None => Ok(Introspected::NotIntrospected),
        }
    }
}
