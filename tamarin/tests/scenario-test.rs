#![cfg(feature = "derive")]

//! End-to-end sampling scenarios.

use std::collections::HashMap;
use tamarin::*;

#[derive(Reflect, Debug, Clone, PartialEq)]
struct Account {
    #[reflect(size(min = 3, max = 5))]
    handle: String,
    #[reflect(min = 10, max = 20)]
    level: i32,
}

#[derive(Reflect, Debug, Clone, PartialEq)]
struct Registry {
    owner: String,
    groups: HashMap<String, HashMap<String, u8>>,
}

#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Flag {
    Up,
    Down,
}

fn seeded(seed: u64) -> Tamarin {
    Tamarin::builder().seed(seed).build()
}

#[test]
fn test_constrained_record_fields() {
    let accounts: Vec<Account> = seeded(11).give_me(1_000).unwrap();
    assert_eq!(accounts.len(), 1_000);
    for account in accounts {
        let length = account.handle.chars().count();
        assert!((3..=5).contains(&length), "handle {:?}", account.handle);
        assert!((10..=20).contains(&account.level), "level {}", account.level);
    }
}

#[test]
fn test_sized_list_with_every_index_set() {
    let values: Vec<String> = seeded(12)
        .give_me_builder::<Vec<String>>()
        .size("$", 3)
        .set("[0]", "x")
        .set("[1]", "x")
        .set("[2]", "x")
        .sample()
        .unwrap();
    assert_eq!(values, vec!["x", "x", "x"]);
}

#[test]
fn test_nested_map_keys_set_two_levels_deep() {
    let builder = seeded(13)
        .give_me_builder::<HashMap<String, HashMap<String, u8>>>()
        .size("$", 3)
        .set("[*].value[*].key", "pinned");
    for outer in builder.sample_list(50).unwrap() {
        for inner in outer.values() {
            assert!(inner.keys().all(|key| key == "pinned"), "{inner:?}");
        }
    }
}

#[test]
fn test_nested_map_keys_inside_record() {
    let registries: Vec<Registry> = seeded(14)
        .give_me_builder::<Registry>()
        .set("groups[*].value[*].key", "fixed")
        .sample_list(50)
        .unwrap();
    for registry in registries {
        for inner in registry.groups.values() {
            assert!(inner.len() <= 1);
            assert!(inner.keys().all(|key| key == "fixed"));
        }
    }
}

#[test]
fn test_post_condition_with_default_budget() {
    let builder = seeded(15)
        .give_me_builder::<String>()
        .post_condition("$", |s: &String| s.chars().count() < 5);
    for _ in 0..200 {
        match builder.sample() {
            Ok(value) => assert!(value.chars().count() < 5),
            Err(error) => {
                assert_eq!(error.attempts(), Some(GenerateOptions::default().default_retry_limit))
            }
        }
    }
}

#[test]
fn test_unsatisfiable_post_condition_reports_attempts() {
    let tamarin = Tamarin::builder()
        .options(
            GenerateOptions::default()
                .with_default_retry_limit(25)
                .with_seed(16),
        )
        .build();
    let error = tamarin
        .give_me_builder::<String>()
        .post_condition("$", |s: &String| s.len() > 100)
        .sample()
        .unwrap_err();
    assert!(matches!(error, TamarinError::RetryBudgetExceeded { attempts: 25, .. }));

    let explicit = tamarin
        .give_me_builder::<String>()
        .post_condition_with_limit("$", |s: &String| s.len() > 100, 7)
        .sample()
        .unwrap_err();
    assert_eq!(explicit.attempts(), Some(7));
}

#[test]
fn test_cross_field_validation_regenerates() {
    let accounts: Vec<Account> = seeded(17)
        .give_me_builder::<Account>()
        .validate(|account| account.level as usize > account.handle.len() + 12)
        .sample_list(50)
        .unwrap();
    for account in accounts {
        assert!(account.level as usize > account.handle.len() + 12);
    }
}

#[test]
fn test_maps_with_small_key_domains() {
    let tamarin = seeded(17);
    let toggles: Vec<HashMap<bool, u8>> = tamarin.give_me(50).unwrap();
    assert!(toggles.iter().all(|map| map.len() <= 2));
    let flags: Vec<HashMap<Flag, u8>> = tamarin.give_me(50).unwrap();
    assert!(flags.iter().all(|map| map.len() <= 2));
    assert!(flags.iter().any(|map| map.len() == 2));
}
