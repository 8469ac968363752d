use proptest::prelude::*;
use tamarin::*;

proptest! {
    #[test]
    fn prop_filter_result_satisfies_predicate(seed in any::<u64>(), modulus in 1i128..8) {
        let even = CombinableArbitrary::from_fn(|source| Ok(source.int_in(0, 1_000)))
            .filter(move |n| n % modulus == 0, 500);
        let mut source = Source::from_u64(seed);
        for _ in 0..20 {
            let value = even.sample(&mut source).unwrap();
            prop_assert_eq!(value % modulus, 0);
        }
    }

    #[test]
    fn prop_unsatisfiable_filter_fails_after_budget(seed in any::<u64>(), budget in 1usize..50) {
        let never = CombinableArbitrary::from_fn(|source| Ok(source.int_in(0, 9)))
            .filter(|n| *n > 9, budget);
        let error = never.sample(&mut Source::from_u64(seed)).unwrap_err();
        prop_assert_eq!(error.attempts(), Some(budget));
    }

    #[test]
    fn prop_same_seed_same_samples(seed in any::<u64>()) {
        let pairs = CombinableArbitrary::combine(
            vec![
                CombinableArbitrary::from_fn(|source| Ok(source.int_in(-5, 5))),
                CombinableArbitrary::from_fn(|source| Ok(source.int_in(100, 200))),
            ],
            Ok,
        );
        let a: Vec<_> = (0..10).scan(Source::from_u64(seed), |s, _| Some(pairs.sample(s).unwrap())).collect();
        let b: Vec<_> = (0..10).scan(Source::from_u64(seed), |s, _| Some(pairs.sample(s).unwrap())).collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_fixed_values_replay(value in any::<i64>(), seed in any::<u64>()) {
        let fixed = CombinableArbitrary::from_value(value).map(|v| v.wrapping_mul(3));
        prop_assert!(fixed.fixed());
        let mut source = Source::from_u64(seed);
        let first = fixed.sample(&mut source).unwrap();
        prop_assert_eq!(fixed.sample(&mut source).unwrap(), first);
    }

    #[test]
    fn prop_combine_is_fixed_only_when_all_parts_are(value in any::<u8>()) {
        let all_fixed = CombinableArbitrary::combine(
            vec![CombinableArbitrary::from_value(value), CombinableArbitrary::from_value(value)],
            |parts| Ok(parts.len()),
        );
        prop_assert!(all_fixed.fixed());

        let mixed = CombinableArbitrary::combine(
            vec![
                CombinableArbitrary::from_value(value),
                CombinableArbitrary::from_fn(|source| Ok(source.next_u64() as u8)),
            ],
            |parts| Ok(parts.len()),
        );
        prop_assert!(!mixed.fixed());
        prop_assert!(!CombinableArbitrary::from_value(value).filter(|_| true, 1).fixed());
    }

    #[test]
    fn prop_null_injection_extremes(value in any::<i32>(), seed in any::<u64>()) {
        let mut source = Source::from_u64(seed);
        let never = CombinableArbitrary::from_value(Some(value)).inject_null(0.0);
        let always = CombinableArbitrary::from_value(Some(value)).inject_null(1.0);
        prop_assert_eq!(never.sample(&mut source).unwrap(), Some(value));
        prop_assert_eq!(always.sample(&mut source).unwrap(), None);
        prop_assert!(never.fixed() && always.fixed());
    }
}

#[test]
fn test_null_injection_rate_is_close_to_probability() {
    let sometimes = CombinableArbitrary::from_value(Value::Bool(true)).inject_null(0.25);
    let mut source = Source::from_u64(99);
    let nulls = (0..4_000)
        .filter(|_| sometimes.sample(&mut source).unwrap().is_null())
        .count();
    assert!((800..1_200).contains(&nulls), "{nulls} nulls");
}

#[test]
fn test_flatten_samples_selected_arbitrary() {
    let choices = CombinableArbitrary::element_of(vec![
        CombinableArbitrary::from_value(1u8),
        CombinableArbitrary::from_value(2u8),
    ]);
    let flat = choices.flatten();
    let mut source = Source::from_u64(3);
    let seen: std::collections::BTreeSet<u8> =
        (0..100).map(|_| flat.sample(&mut source).unwrap()).collect();
    assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![1, 2]);
}
