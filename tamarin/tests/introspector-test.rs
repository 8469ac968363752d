#![cfg(feature = "derive")]

use tamarin::*;

#[derive(Reflect, Debug, Clone, PartialEq)]
struct Temperature {
    celsius: i16,
    label: String,
}

impl Temperature {
    fn new(celsius: i16, label: String) -> Self {
        Temperature {
            celsius: celsius.clamp(-50, 50),
            label: label.to_uppercase(),
        }
    }

    fn freezing(label: String) -> Self {
        Temperature {
            celsius: 0,
            label,
        }
    }
}

#[derive(Reflect, Debug, Clone, PartialEq, Default)]
struct Settings {
    retries: u8,
    verbose: bool,
    name: String,
}

#[derive(Debug, Default)]
struct SettingsBuilder {
    retries: u8,
    name: String,
}

impl SettingsBuilder {
    fn retries(self, retries: u8) -> Self {
        SettingsBuilder {
            retries: retries.min(3),
            ..self
        }
    }

    fn name(self, name: String) -> Self {
        SettingsBuilder {
            name: format!("built-{name}"),
            ..self
        }
    }

    fn build(self) -> Result<Settings> {
        Ok(Settings {
            retries: self.retries,
            verbose: true,
            name: self.name,
        })
    }
}

/// Handle without visible structure; only a strategy can make one.
#[derive(Debug, Clone, PartialEq)]
struct Connection {
    id: u32,
}

impl Reflect for Connection {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::opaque::<Connection>("Connection")
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .take_opaque::<Connection>()
            .map_err(|other| TamarinError::Conversion {
                expected: "Connection".to_string(),
                found: other.kind_name().to_string(),
            })
    }
}

impl IntoValue for Connection {
    fn into_value(self) -> Value {
        Value::Opaque(OpaqueValue::new(self))
    }
}

#[derive(Debug)]
struct DoubledBytes;

impl Introspector for DoubledBytes {
    fn introspect(&self, context: &IntrospectorContext<'_>) -> Result<Introspected> {
        if context.kind() != NodeKind::Sequence {
            return Ok(Introspected::NotIntrospected);
        }
        let doubled = context
            .values()
            .map(|value| match value {
                Value::Int(n) => Value::Int((n * 2) % 256),
                other => other.clone(),
            })
            .collect();
        Ok(Introspected::Value(Value::Seq(doubled)))
    }
}

fn seeded(seed: u64) -> TamarinBuilder {
    Tamarin::builder().seed(seed)
}

#[test]
fn test_constructor_strategy_normalizes() {
    let tamarin = seeded(1)
        .constructor::<Temperature, _>(&["celsius", "label"], |args| {
            Ok(Temperature::new(args.next()?, args.next()?))
        })
        .build();
    for temperature in tamarin.give_me::<Temperature>(100).unwrap() {
        assert!((-50..=50).contains(&temperature.celsius));
        assert_eq!(temperature.label, temperature.label.to_uppercase());
    }
}

#[test]
fn test_constructor_sees_manipulated_children() {
    let tamarin = seeded(2)
        .constructor::<Temperature, _>(&["celsius", "label"], |args| {
            Ok(Temperature::new(args.next()?, args.next()?))
        })
        .build();
    let temperature: Temperature = tamarin
        .give_me_builder::<Temperature>()
        .set("celsius", 400i16)
        .set("label", "hot")
        .sample()
        .unwrap();
    assert_eq!(
        temperature,
        Temperature {
            celsius: 50,
            label: "HOT".to_string()
        }
    );
}

#[test]
fn test_factory_strategy_binds_by_name() {
    let tamarin = seeded(3)
        .factory::<Temperature, _>("freezing", &["label"], |args| {
            Ok(Temperature::freezing(args.next()?))
        })
        .build();
    let temperatures: Vec<Temperature> = tamarin.give_me(20).unwrap();
    assert!(temperatures.iter().all(|t| t.celsius == 0));
}

#[test]
fn test_builder_strategy_runs_setters() {
    let strategy = BuilderStrategy::new(SettingsBuilder::default)
        .setter("retries", SettingsBuilder::retries)
        .setter("name", SettingsBuilder::name)
        .build(SettingsBuilder::build);
    let tamarin = seeded(4).builder_strategy(strategy).build();
    for settings in tamarin.give_me::<Settings>(50).unwrap() {
        assert!(settings.retries <= 3);
        assert!(settings.verbose);
        assert!(settings.name.starts_with("built-"));
    }
}

#[test]
fn test_field_strategy_assigns_listed_fields() {
    let strategy = FieldIntrospector::<Settings>::new()
        .field("retries", |settings: &mut Settings, retries: u8| settings.retries = retries);
    let tamarin = seeded(5).field_strategy(strategy).build();
    let settings: Settings = tamarin
        .give_me_builder::<Settings>()
        .set("retries", 9u8)
        .set("name", "ignored")
        .sample()
        .unwrap();
    assert_eq!(
        settings,
        Settings {
            retries: 9,
            ..Settings::default()
        }
    );
}

#[test]
fn test_failing_strategy_falls_back_to_fields() {
    let tamarin = seeded(6)
        .constructor::<Temperature, _>(&["celsius", "label"], |_| {
            Err(TamarinError::Introspection {
                type_name: "Temperature".to_string(),
                reason: "always refuses".to_string(),
            })
        })
        .build();
    let temperature: Temperature = tamarin
        .give_me_builder::<Temperature>()
        .set("celsius", 400i16)
        .set("label", "hot")
        .sample()
        .unwrap();
    assert_eq!(temperature.celsius, 400);
    assert_eq!(temperature.label, "hot");
}

#[test]
fn test_opaque_type_needs_a_strategy() {
    let bare = seeded(7).build();
    assert!(matches!(
        bare.give_me_one::<Connection>(),
        Err(TamarinError::Resolution { .. })
    ));

    let tamarin = seeded(7)
        .constructor::<Connection, _>(&[], |_| Ok(Connection { id: 7 }))
        .build();
    let connections: Vec<Connection> = tamarin.give_me(3).unwrap();
    assert!(connections.iter().all(|c| c.id == 7));
}

#[test]
fn test_registered_arbitrary_replaces_opaque_leaf() {
    let ids = CombinableArbitrary::from_fn(|source| Ok(source.int_in(1, 9) as u32));
    let tamarin = seeded(8)
        .register_arbitrary(ids.map(|id| Connection { id }))
        .build();
    let pool: Vec<Connection> = tamarin
        .give_me_builder::<Vec<Connection>>()
        .size("$", 5)
        .sample()
        .unwrap();
    assert_eq!(pool.len(), 5);
    assert!(pool.iter().all(|c| (1..=9).contains(&c.id)));
}

#[test]
fn test_custom_introspector_is_tried_before_defaults() {
    let tamarin = seeded(9).introspector(DoubledBytes).build();
    let values: Vec<u8> = tamarin
        .give_me_builder::<Vec<u8>>()
        .size("$", 3)
        .set("[*]", 3u8)
        .sample()
        .unwrap();
    assert_eq!(values, vec![6, 6, 6]);
}
