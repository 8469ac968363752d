#![cfg(feature = "derive")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tamarin::*;

#[derive(Reflect, Debug, Clone, PartialEq)]
struct Address {
    street: String,
    city: String,
    lines: Vec<String>,
}

#[derive(Reflect, Debug, Clone, PartialEq)]
struct Customer {
    name: String,
    nickname: Option<String>,
    address: Address,
    scores: Vec<u8>,
}

#[derive(Reflect, Debug, Clone, PartialEq)]
struct Narrowed {
    #[reflect(min = 0, max = 50, min = 10, max = 80)]
    value: i64,
    #[reflect(size(min = 1, max = 8), size(min = 4, max = 20))]
    text: String,
}

#[derive(Reflect, Debug, Clone, PartialEq)]
struct Conflicting {
    #[reflect(min = 10, max = 5)]
    value: i32,
}

fn seeded(seed: u64) -> Tamarin {
    Tamarin::builder().seed(seed).build()
}

#[test]
fn test_later_set_wins() {
    let customer: Customer = seeded(1)
        .give_me_builder::<Customer>()
        .set("name", "first")
        .set("address.city", "Lisbon")
        .set("name", "second")
        .sample()
        .unwrap();
    assert_eq!(customer.name, "second");
    assert_eq!(customer.address.city, "Lisbon");
}

#[test]
fn test_wildcard_then_index_keeps_index() {
    let scores: Vec<u8> = seeded(2)
        .give_me_builder::<Vec<u8>>()
        .size("$", 4)
        .set("[*]", 1u8)
        .set("[2]", 9u8)
        .sample()
        .unwrap();
    assert_eq!(scores, vec![1, 1, 9, 1]);
}

#[test]
fn test_index_then_wildcard_overrides_index() {
    let scores: Vec<u8> = seeded(2)
        .give_me_builder::<Vec<u8>>()
        .size("$", 4)
        .set("[2]", 9u8)
        .set("[*]", 1u8)
        .sample()
        .unwrap();
    assert_eq!(scores, vec![1, 1, 1, 1]);
}

#[test]
fn test_wildcard_sees_sizes_set_before_it() {
    let before: Customer = seeded(3)
        .give_me_builder::<Customer>()
        .size("scores", 5)
        .set("scores[*]", 2u8)
        .sample()
        .unwrap();
    assert_eq!(before.scores, vec![2; 5]);

    let after: Customer = seeded(3)
        .give_me_builder::<Customer>()
        .size("scores", 1)
        .set("scores[*]", 2u8)
        .size("scores", 5)
        .sample()
        .unwrap();
    assert_eq!(after.scores.len(), 5);
    assert_eq!(after.scores[0], 2);
}

#[test]
fn test_shrinking_after_index_set_is_not_an_error() {
    let builder = seeded(4)
        .give_me_builder::<Vec<String>>()
        .size("$", 3)
        .set("[2]", "dropped")
        .size("$", 2);
    for _ in 0..20 {
        let values = builder.sample().unwrap();
        assert_eq!(values.len(), 2);
        assert!(!values.contains(&"dropped".to_string()));
    }
}

#[test]
fn test_unknown_field_is_a_path_error() {
    let error = seeded(5)
        .give_me_builder::<Customer>()
        .set("address.zip", "1000")
        .sample()
        .unwrap_err();
    match error {
        TamarinError::PathResolution { path, type_name, .. } => {
            assert_eq!(path, "address.zip");
            assert_eq!(type_name, "Address");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_bad_path_syntax_surfaces_on_sample() {
    let result = seeded(5)
        .give_me_builder::<Customer>()
        .set("scores[", 1u8)
        .sample();
    assert!(matches!(result, Err(TamarinError::PathSyntax { .. })));
}

#[test]
fn test_null_and_not_null() {
    let builder = seeded(6).give_me_builder::<Customer>();
    let nulled = builder.clone().set_null("nickname").sample_list(20).unwrap();
    assert!(nulled.iter().all(|c| c.nickname.is_none()));

    let present = builder.set_not_null("nickname").sample_list(20).unwrap();
    assert!(present.iter().all(|c| c.nickname.is_some()));
}

#[test]
fn test_set_after_set_null_restores_value() {
    let customer: Customer = seeded(6)
        .give_me_builder::<Customer>()
        .set_null("nickname")
        .set("nickname", "back")
        .sample()
        .unwrap();
    assert_eq!(customer.nickname.as_deref(), Some("back"));
}

#[test]
fn test_set_with_limit_touches_first_targets() {
    let scores: Vec<u8> = seeded(7)
        .give_me_builder::<Vec<u8>>()
        .size("$", 5)
        .set("[*]", 0u8)
        .set_with_limit("[*]", 3u8, 2)
        .sample()
        .unwrap();
    assert_eq!(scores, vec![3, 3, 0, 0, 0]);
}

#[test]
fn test_set_lazy_runs_once_per_sample() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let builder = seeded(8)
        .give_me_builder::<Vec<usize>>()
        .size("$", 3)
        .set_lazy("[*]", move || counter.fetch_add(1, Ordering::SeqCst));
    let first = builder.sample().unwrap();
    let second = builder.sample().unwrap();
    assert_eq!(first, vec![0, 0, 0]);
    assert_eq!(second, vec![1, 1, 1]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_set_arbitrary_on_field() {
    let names = CombinableArbitrary::element_of(vec!["ana".to_string(), "bo".to_string()]);
    let customers: Vec<Customer> = seeded(9)
        .give_me_builder::<Customer>()
        .set_arbitrary("name", names)
        .sample_list(30)
        .unwrap();
    assert!(customers.iter().all(|c| c.name == "ana" || c.name == "bo"));
}

#[test]
fn test_customize_wraps_node_arbitrary() {
    let customer: Customer = seeded(10)
        .give_me_builder::<Customer>()
        .size("scores", 4)
        .customize("scores[*]", |arbitrary| {
            arbitrary.map(|value| match value {
                Value::Int(n) => Value::Int(n % 10),
                other => other,
            })
        })
        .sample()
        .unwrap();
    assert_eq!(customer.scores.len(), 4);
    assert!(customer.scores.iter().all(|s| *s < 10));
}

#[test]
fn test_set_inner_rebases_nested_spec() {
    let address = Spec::new()
        .set("street", "Main")
        .size("lines", 2)
        .set("lines[*]", "line");
    let customer: Customer = seeded(11)
        .give_me_builder::<Customer>()
        .set_inner("address", address)
        .sample()
        .unwrap();
    assert_eq!(customer.address.street, "Main");
    assert_eq!(customer.address.lines, vec!["line", "line"]);
}

#[test]
fn test_post_conditions_compose() {
    let values: Vec<u8> = seeded(12)
        .give_me_builder::<Vec<u8>>()
        .size("$", 30)
        .post_condition("[*]", |v: &u8| v % 2 == 0)
        .post_condition("[*]", |v: &u8| *v > 100)
        .sample()
        .unwrap();
    assert!(values.iter().all(|v| v % 2 == 0 && *v > 100));
}

#[test]
fn test_fixed_builder_is_stable() {
    let builder = seeded(13)
        .give_me_builder::<Customer>()
        .set("name", "fixed")
        .fixed();
    let first = builder.sample().unwrap();
    for _ in 0..10 {
        assert_eq!(builder.sample().unwrap(), first);
    }

    let rebuilt = builder.set("name", "changed");
    assert_eq!(rebuilt.sample().unwrap().name, "changed");
}

#[test]
fn test_built_arbitrary_composes() {
    let pairs = seeded(14)
        .give_me_builder::<Vec<u8>>()
        .size("$", 2)
        .build()
        .map(|values| values.len());
    let mut source = Source::from_u64(14);
    for _ in 0..10 {
        assert_eq!(pairs.sample(&mut source).unwrap(), 2);
    }
}

#[test]
fn test_metadata_bounds_intersect() {
    for narrowed in seeded(15).give_me::<Narrowed>(300).unwrap() {
        assert!((10..=50).contains(&narrowed.value));
        assert!((4..=8).contains(&narrowed.text.chars().count()));
    }
}

#[test]
fn test_conflicting_metadata_is_an_error() {
    let result = seeded(16).give_me_one::<Conflicting>();
    assert!(matches!(result, Err(TamarinError::ConstraintConflict { .. })));
}

#[test]
fn test_registered_spec_then_caller_override() {
    let tamarin = Tamarin::builder()
        .seed(17)
        .register::<Address>(Spec::new().set("city", "Porto").size("lines", 1))
        .build();
    let customers: Vec<Customer> = tamarin.give_me(10).unwrap();
    for customer in &customers {
        assert_eq!(customer.address.city, "Porto");
        assert_eq!(customer.address.lines.len(), 1);
    }

    let moved: Customer = tamarin
        .give_me_builder::<Customer>()
        .set("address.city", "Faro")
        .sample()
        .unwrap();
    assert_eq!(moved.address.city, "Faro");
}

#[test]
fn test_best_effort_nulls_unbuildable_nodes() {
    let options = GenerateOptions::default()
        .with_null_probability(0.0)
        .with_seed(18);
    let strict = Tamarin::builder().options(options.clone()).build();
    let error = strict
        .give_me_builder::<(Customer, Option<String>)>()
        .post_condition("[1]", |s: &String| s.len() > 64)
        .sample()
        .unwrap_err();
    assert!(matches!(error, TamarinError::RetryBudgetExceeded { .. }));

    let lenient = Tamarin::builder()
        .options(options.with_failure_mode(FailureMode::BestEffort))
        .build();
    let (_, missing) = lenient
        .give_me_builder::<(Customer, Option<String>)>()
        .post_condition("[1]", |s: &String| s.len() > 64)
        .sample()
        .unwrap();
    assert!(missing.is_none());
}
