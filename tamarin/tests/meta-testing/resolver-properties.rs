use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use tamarin::*;

type Nested = (u8, Option<String>, Vec<(bool, i64)>, BTreeMap<String, [u16; 3]>);

fn shape(properties: &[Property]) -> Vec<(String, bool, PropertyRole)> {
    properties
        .iter()
        .map(|p| (p.to_string(), p.is_nullable(), p.role()))
        .collect()
}

proptest! {
    #[test]
    fn prop_resolution_is_deterministic(capacity in 1usize..8) {
        let first = PropertyResolver::new(Arc::new(PropertyCache::new(capacity)));
        let second = PropertyResolver::new(Arc::new(PropertyCache::new(capacity)));
        let descriptor = Nested::descriptor();
        prop_assert_eq!(
            shape(&first.resolve(&descriptor)),
            shape(&second.resolve(&descriptor))
        );
        prop_assert!(first.cache().len() <= capacity);
    }

    #[test]
    fn prop_seeded_engines_agree(seed in any::<u64>()) {
        let a: Vec<Nested> = Tamarin::builder().seed(seed).build().give_me(5).unwrap();
        let b: Vec<Nested> = Tamarin::builder().seed(seed).build().give_me(5).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_tuple_arity_is_exact(seed in any::<u64>()) {
        let tamarin = Tamarin::builder().seed(seed).build();
        let properties = tamarin.resolver().resolve(&<(u8, u8, u8)>::descriptor());
        prop_assert_eq!(properties.len(), 3);
        let triple: (u8, u8, u8) = tamarin
            .give_me_builder()
            .set("$", (1u8, 2u8, 3u8))
            .sample()
            .unwrap();
        prop_assert_eq!(triple, (1, 2, 3));
    }
}

#[test]
fn test_concurrent_resolution_shares_one_entry() {
    let cache = Arc::new(PropertyCache::new(16));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || PropertyResolver::new(cache).resolve(&Nested::descriptor()))
        })
        .collect();
    let resolved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(resolved.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_engines_share_an_explicit_cache() {
    let cache = Arc::new(PropertyCache::new(32));
    let first = Tamarin::builder().seed(1).property_cache(Arc::clone(&cache)).build();
    let second = Tamarin::builder().seed(2).property_cache(Arc::clone(&cache)).build();
    let _: (u8, (bool, String)) = first.give_me_one().unwrap();
    let cached = cache.len();
    assert!(cached > 0);
    let _: (u8, (bool, String)) = second.give_me_one().unwrap();
    assert_eq!(cache.len(), cached);
    assert!(Arc::ptr_eq(first.property_cache(), second.property_cache()));

    cache.clear();
    assert!(cache.is_empty());
    let _: (u8, (bool, String)) = first.give_me_one().unwrap();
}

#[test]
fn test_samples_in_parallel_threads() {
    let tamarin = Tamarin::builder().seed(5).build();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let tamarin = tamarin.clone();
            thread::spawn(move || {
                tamarin
                    .give_me_builder::<Vec<String>>()
                    .size("$", 2)
                    .sample_list(25)
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        let samples = handle.join().unwrap();
        assert!(samples.iter().all(|values| values.len() == 2));
    }
}
