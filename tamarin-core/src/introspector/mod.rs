//! Construction strategies folding sampled children into a parent value.
//!
//! An [`Introspector`] never samples: it receives the already generated value
//! of every child property and either constructs the parent or reports
//! [`Introspected::NotIntrospected`], which is distinct from constructing a
//! null value.

mod construction;
mod structural;

pub use construction::*;
pub use structural::*;

use crate::error::Result;
use crate::node::NodeKind;
use crate::property::Property;
use crate::reflect::{TypeDescriptor, TypeKey};
use crate::value::Value;

/// Outcome of one construction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Introspected {
    Value(Value),
    NotIntrospected,
}

/// A parent node and the values generated for its children.
#[derive(Debug)]
pub struct IntrospectorContext<'a> {
    property: &'a Property,
    kind: NodeKind,
    children: Vec<(&'a Property, Value)>,
}

impl<'a> IntrospectorContext<'a> {
    pub fn new(property: &'a Property, kind: NodeKind, children: Vec<(&'a Property, Value)>) -> Self {
        IntrospectorContext {
            property,
            kind,
            children,
        }
    }

    pub fn property(&self) -> &Property {
        self.property
    }

    pub fn ty(&self) -> &TypeDescriptor {
        self.property.ty()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn children(&self) -> &[(&'a Property, Value)] {
        &self.children
    }

    /// Value of the child property called `name`.
    pub fn child(&self, name: &str) -> Option<&Value> {
        self.children
            .iter()
            .find(|(property, _)| property.name() == Some(name))
            .map(|(_, value)| value)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.children.iter().map(|(_, value)| value)
    }
}

/// One way of turning child values into a parent value.
pub trait Introspector: Send + Sync {
    fn introspect(&self, context: &IntrospectorContext<'_>) -> Result<Introspected>;

    /// The one type this strategy constructs, if it is type-specific.
    fn target(&self) -> Option<TypeKey> {
        None
    }
}
