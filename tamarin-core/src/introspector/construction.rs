//! Type-specific strategies constructing a concrete Rust value.
//!
//! Each strategy targets one type and produces a [`Value::Opaque`] holding
//! the constructed instance, which the type's `Reflect::from_value` takes
//! back out.

use super::{Introspected, Introspector, IntrospectorContext};
use crate::error::{Result, TamarinError};
use crate::reflect::{Reflect, TypeKey};
use crate::value::{OpaqueValue, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Child values bound to a constructor's parameters, consumed in order.
#[derive(Debug)]
pub struct Arguments {
    type_name: String,
    values: VecDeque<(String, Value)>,
}

impl Arguments {
    fn new(type_name: &str, values: Vec<(String, Value)>) -> Self {
        Arguments {
            type_name: type_name.to_string(),
            values: values.into(),
        }
    }

    /// Convert the next parameter.
    pub fn next<V: Reflect>(&mut self) -> Result<V> {
        let (name, value) = self.values.pop_front().ok_or_else(|| {
            TamarinError::introspection(&self.type_name, "not enough arguments")
        })?;
        V::from_value(value).map_err(|error| {
            TamarinError::introspection(&self.type_name, format!("parameter `{name}`: {error}"))
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

type Construct = Arc<dyn Fn(&mut Arguments) -> Result<Value> + Send + Sync>;

fn construct_opaque<T, F>(construct: F) -> Construct
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    F: Fn(&mut Arguments) -> Result<T> + Send + Sync + 'static,
{
    Arc::new(move |args| construct(args).map(|value| Value::Opaque(OpaqueValue::new(value))))
}

/// Calls a constructor function with children matched to its parameters.
///
/// Parameters are matched by name; a name with no matching child falls back
/// to the child at the same position. With no declared parameters every
/// child is passed positionally.
#[derive(Clone)]
pub struct ConstructorIntrospector {
    target: TypeKey,
    type_name: &'static str,
    parameters: Vec<&'static str>,
    construct: Construct,
}

impl ConstructorIntrospector {
    pub fn new<T, F>(parameters: &[&'static str], construct: F) -> Self
    where
        T: Reflect + Clone + fmt::Debug + Send + Sync,
        F: Fn(&mut Arguments) -> Result<T> + Send + Sync + 'static,
    {
        ConstructorIntrospector {
            target: TypeKey::of::<T>(),
            type_name: std::any::type_name::<T>(),
            parameters: parameters.to_vec(),
            construct: construct_opaque(construct),
        }
    }
}

impl fmt::Debug for ConstructorIntrospector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorIntrospector")
            .field("type", &self.type_name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl Introspector for ConstructorIntrospector {
    fn introspect(&self, context: &IntrospectorContext<'_>) -> Result<Introspected> {
        let children = context.children();
        let values = if self.parameters.is_empty() {
            children
                .iter()
                .enumerate()
                .map(|(i, (property, value))| {
                    let name = property.name().map_or_else(|| i.to_string(), str::to_string);
                    (name, value.clone())
                })
                .collect()
        } else {
            self.parameters
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let value = context
                        .child(name)
                        .or_else(|| children.get(i).map(|(_, value)| value))
                        .cloned()
                        .ok_or_else(|| {
                            TamarinError::introspection(
                                self.type_name,
                                format!("no child for parameter `{name}`"),
                            )
                        })?;
                    Ok((name.to_string(), value))
                })
                .collect::<Result<Vec<_>>>()?
        };
        let mut args = Arguments::new(self.type_name, values);
        (self.construct)(&mut args).map(Introspected::Value)
    }

    fn target(&self) -> Option<TypeKey> {
        Some(self.target)
    }
}

/// Calls a named associated function, binding children strictly by name.
#[derive(Clone)]
pub struct FactoryIntrospector {
    target: TypeKey,
    type_name: &'static str,
    factory: &'static str,
    parameters: Vec<&'static str>,
    construct: Construct,
}

impl FactoryIntrospector {
    pub fn new<T, F>(factory: &'static str, parameters: &[&'static str], construct: F) -> Self
    where
        T: Reflect + Clone + fmt::Debug + Send + Sync,
        F: Fn(&mut Arguments) -> Result<T> + Send + Sync + 'static,
    {
        FactoryIntrospector {
            target: TypeKey::of::<T>(),
            type_name: std::any::type_name::<T>(),
            factory,
            parameters: parameters.to_vec(),
            construct: construct_opaque(construct),
        }
    }

    pub fn factory(&self) -> &'static str {
        self.factory
    }
}

impl fmt::Debug for FactoryIntrospector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryIntrospector")
            .field("type", &self.type_name)
            .field("factory", &self.factory)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl Introspector for FactoryIntrospector {
    fn introspect(&self, context: &IntrospectorContext<'_>) -> Result<Introspected> {
        let values = self
            .parameters
            .iter()
            .map(|name| {
                context
                    .child(name)
                    .cloned()
                    .map(|value| (name.to_string(), value))
                    .ok_or_else(|| {
                        TamarinError::introspection(
                            self.type_name,
                            format!("`{}` has no argument for `{}`", self.factory, name),
                        )
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let mut args = Arguments::new(self.type_name, values);
        (self.construct)(&mut args).map(Introspected::Value)
    }

    fn target(&self) -> Option<TypeKey> {
        Some(self.target)
    }
}

type Setter<B> = Arc<dyn Fn(B, Value) -> Result<B> + Send + Sync>;

/// Setter chain of a builder type `B`, finished by [`BuilderStrategy::build`].
pub struct BuilderStrategy<B> {
    make: Arc<dyn Fn() -> B + Send + Sync>,
    setters: Vec<(&'static str, Setter<B>)>,
}

impl<B: 'static> BuilderStrategy<B> {
    pub fn new<F>(make: F) -> Self
    where
        F: Fn() -> B + Send + Sync + 'static,
    {
        BuilderStrategy {
            make: Arc::new(make),
            setters: Vec::new(),
        }
    }

    /// Feed child `name` to `set`; skipped when the child is absent.
    pub fn setter<V, F>(mut self, name: &'static str, set: F) -> Self
    where
        V: Reflect,
        F: Fn(B, V) -> B + Send + Sync + 'static,
    {
        let setter: Setter<B> = Arc::new(move |builder, value| {
            let typed = V::from_value(value)?;
            Ok(set(builder, typed))
        });
        self.setters.push((name, setter));
        self
    }

    /// Terminal call producing the constructed `T`.
    pub fn build<T, F>(self, finish: F) -> BuilderIntrospector
    where
        T: Reflect + Clone + fmt::Debug + Send + Sync,
        F: Fn(B) -> Result<T> + Send + Sync + 'static,
    {
        let BuilderStrategy { make, setters } = self;
        let type_name = std::any::type_name::<T>();
        let names = setters.iter().map(|(name, _)| *name).collect();
        let run = move |context: &IntrospectorContext<'_>| -> Result<Value> {
            let mut builder = make();
            for (name, setter) in &setters {
                if let Some(value) = context.child(name) {
                    builder = setter(builder, value.clone()).map_err(|error| {
                        TamarinError::introspection(type_name, format!("setter `{name}`: {error}"))
                    })?;
                }
            }
            finish(builder).map(|value| Value::Opaque(OpaqueValue::new(value)))
        };
        BuilderIntrospector {
            target: TypeKey::of::<T>(),
            type_name,
            setters: names,
            run: Arc::new(run),
        }
    }
}

type Run = Arc<dyn Fn(&IntrospectorContext<'_>) -> Result<Value> + Send + Sync>;

/// Builder pattern construction: fresh builder, setter chain, terminal build.
#[derive(Clone)]
pub struct BuilderIntrospector {
    target: TypeKey,
    type_name: &'static str,
    setters: Vec<&'static str>,
    run: Run,
}

impl fmt::Debug for BuilderIntrospector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderIntrospector")
            .field("type", &self.type_name)
            .field("setters", &self.setters)
            .finish()
    }
}

impl Introspector for BuilderIntrospector {
    fn introspect(&self, context: &IntrospectorContext<'_>) -> Result<Introspected> {
        (self.run)(context).map(Introspected::Value)
    }

    fn target(&self) -> Option<TypeKey> {
        Some(self.target)
    }
}

type Assign<T> = Arc<dyn Fn(&mut T, Value) -> Result<()> + Send + Sync>;

/// `Default` construction followed by direct field assignment.
pub struct FieldIntrospector<T> {
    fields: Vec<(&'static str, Assign<T>)>,
}

impl<T> Clone for FieldIntrospector<T> {
    fn clone(&self) -> Self {
        FieldIntrospector {
            fields: self.fields.clone(),
        }
    }
}

impl<T> Default for FieldIntrospector<T>
where
    T: Reflect + Default + Clone + fmt::Debug + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FieldIntrospector<T>
where
    T: Reflect + Default + Clone + fmt::Debug + Send + Sync,
{
    pub fn new() -> Self {
        FieldIntrospector { fields: Vec::new() }
    }

    /// Assign child `name` through `assign`; absent children keep the default.
    pub fn field<V, F>(mut self, name: &'static str, assign: F) -> Self
    where
        V: Reflect,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let assign: Assign<T> = Arc::new(move |target, value| {
            assign(target, V::from_value(value)?);
            Ok(())
        });
        self.fields.push((name, assign));
        self
    }
}

impl<T> fmt::Debug for FieldIntrospector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.fields.iter().map(|(name, _)| *name).collect();
        f.debug_struct("FieldIntrospector")
            .field("type", &std::any::type_name::<T>())
            .field("fields", &names)
            .finish()
    }
}

impl<T> Introspector for FieldIntrospector<T>
where
    T: Reflect + Default + Clone + fmt::Debug + Send + Sync,
{
    fn introspect(&self, context: &IntrospectorContext<'_>) -> Result<Introspected> {
        let mut target = T::default();
        for (name, assign) in &self.fields {
            if let Some(value) = context.child(name) {
                assign(&mut target, value.clone()).map_err(|error| {
                    TamarinError::introspection(
                        std::any::type_name::<T>(),
                        format!("field `{name}`: {error}"),
                    )
                })?;
            }
        }
        Ok(Introspected::Value(Value::Opaque(OpaqueValue::new(target))))
    }

    fn target(&self) -> Option<TypeKey> {
        Some(TypeKey::of::<T>())
    }
}
