//! Property tests for the type engines, checked against plain std models

use cellstore::store::Keyspace;
use cellstore::types::{list, set, string};
use proptest::prelude::*;
use std::collections::{HashSet, VecDeque};

fn bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..16)
}

#[derive(Debug, Clone)]
enum Push {
    Left(Vec<u8>),
    Right(Vec<u8>),
}

fn push() -> impl Strategy<Value = Push> {
    prop_oneof![bytes().prop_map(Push::Left), bytes().prop_map(Push::Right)]
}

/// Reference LRANGE over a slice
fn model_range(items: &[Vec<u8>], start: i64, stop: i64) -> Vec<Vec<u8>> {
    let len = items.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return Vec::new();
    }
    items[start as usize..=stop as usize].to_vec()
}

proptest! {
    #[test]
    fn append_to_absent_key_stores_the_value(s in bytes()) {
        let mut ks = Keyspace::new();
        prop_assert_eq!(string::append(&mut ks, b"k", &s).unwrap(), s.len());
        prop_assert_eq!(string::get(&mut ks, b"k"), Some(s.clone()));
        prop_assert_eq!(string::strlen(&mut ks, b"k").unwrap(), s.len());
    }

    #[test]
    fn setnx_keeps_the_first_value(first in bytes(), second in bytes()) {
        let mut ks = Keyspace::new();
        prop_assert!(string::setnx(&mut ks, b"k", first.clone()));
        prop_assert!(!string::setnx(&mut ks, b"k", second));
        prop_assert_eq!(string::get(&mut ks, b"k"), Some(first));
    }

    #[test]
    fn increments_add_up(deltas in prop::collection::vec(-1_000_000i64..1_000_000, 1..20)) {
        let mut ks = Keyspace::new();
        let mut last = 0;
        for delta in &deltas {
            last = string::incr_by(&mut ks, b"n", *delta).unwrap();
        }
        prop_assert_eq!(last, deltas.iter().sum::<i64>());
        prop_assert_eq!(string::get(&mut ks, b"n"), Some(last.to_string().into_bytes()));
    }

    #[test]
    fn pushes_match_a_deque(ops in prop::collection::vec(push(), 1..30)) {
        let mut ks = Keyspace::new();
        let mut model = VecDeque::new();
        for op in ops {
            match op {
                Push::Left(v) => {
                    model.push_front(v.clone());
                    list::lpush(&mut ks, b"l", vec![v]).unwrap();
                }
                Push::Right(v) => {
                    model.push_back(v.clone());
                    list::rpush(&mut ks, b"l", vec![v]).unwrap();
                }
            }
        }
        let expected: Vec<_> = model.into_iter().collect();
        prop_assert_eq!(list::lrange(&mut ks, b"l", 0, -1).unwrap(), expected);
    }

    #[test]
    fn lrange_matches_reference(
        items in prop::collection::vec(bytes(), 1..12),
        start in -15i64..15,
        stop in -15i64..15,
    ) {
        let mut ks = Keyspace::new();
        list::rpush(&mut ks, b"l", items.clone()).unwrap();
        prop_assert_eq!(
            list::lrange(&mut ks, b"l", start, stop).unwrap(),
            model_range(&items, start, stop)
        );
    }

    #[test]
    fn popping_everything_removes_the_key(items in prop::collection::vec(bytes(), 1..10)) {
        let mut ks = Keyspace::new();
        list::rpush(&mut ks, b"l", items.clone()).unwrap();
        for item in &items {
            let popped = list::lpop(&mut ks, b"l").unwrap();
            prop_assert_eq!(popped.as_ref(), Some(item));
        }
        prop_assert!(!ks.exists(b"l"));
    }

    #[test]
    fn union_and_intersection_match_hashset(
        a in prop::collection::hash_set(0u8..20, 0..10),
        b in prop::collection::hash_set(0u8..20, 0..10),
    ) {
        let mut ks = Keyspace::new();
        let to_members = |s: &HashSet<u8>| s.iter().map(|m| vec![*m]).collect::<Vec<_>>();
        set::sadd(&mut ks, b"a", to_members(&a)).unwrap();
        set::sadd(&mut ks, b"b", to_members(&b)).unwrap();
        prop_assert_eq!(ks.exists(b"a"), !a.is_empty());
        let keys = [b"a".to_vec(), b"b".to_vec()];

        let union: HashSet<Vec<u8>> = set::sunion(&mut ks, &keys).unwrap().into_iter().collect();
        let expected: HashSet<Vec<u8>> = a.union(&b).map(|m| vec![*m]).collect();
        prop_assert_eq!(union, expected);

        let inter: HashSet<Vec<u8>> = set::sinter(&mut ks, &keys).unwrap().into_iter().collect();
        let expected: HashSet<Vec<u8>> = a.intersection(&b).map(|m| vec![*m]).collect();
        prop_assert_eq!(inter, expected);
    }
}
