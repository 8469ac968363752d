use proptest::prelude::*;
use tamarin::*;

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,8}"
}

fn arb_tail_segment() -> impl Strategy<Value = Segment> {
    prop_oneof![
        arb_name().prop_map(Segment::Field),
        (0usize..10_000).prop_map(Segment::Index),
        any::<String>().prop_map(Segment::Key),
        Just(Segment::Wildcard),
    ]
}

fn arb_path() -> impl Strategy<Value = Path> {
    prop::collection::vec(arb_tail_segment(), 0..8).prop_map(Path::from_segments)
}

proptest! {
    #[test]
    fn prop_display_then_parse_is_identity(path in arb_path()) {
        let text = path.to_string();
        let parsed = Path::parse(&text);
        prop_assert!(parsed.is_ok(), "`{}` failed to parse: {:?}", text, parsed);
        prop_assert_eq!(parsed.unwrap(), path);
    }

    #[test]
    fn prop_join_concatenates_segments(a in arb_path(), b in arb_path()) {
        let joined = a.join(&b);
        prop_assert_eq!(joined.segments().len(), a.segments().len() + b.segments().len());
        prop_assert_eq!(&joined.segments()[..a.segments().len()], a.segments());
    }

    #[test]
    fn prop_root_prints_reserved_token(path in arb_path()) {
        prop_assert_eq!(path.is_root(), path.to_string() == "$");
    }

    #[test]
    fn prop_garbage_never_panics(text in "\\PC{0,24}") {
        let _ = Path::parse(&text);
    }
}
