#![no_main]

use std::{fmt::Debug, ops::Bound};

use arbitrary::{Arbitrary, Result, Unstructured};
use cow_btree::{BTree, Entry};
use libfuzzer_sys::fuzz_target;

#[derive(Debug)]
struct Degree(usize);

impl<'a> Arbitrary<'a> for Degree {
    fn arbitrary(u: &mut Unstructured<'a>) -> Result<Self> {
        Ok(Degree(u.int_in_range(2..=8)?))
    }
}

#[derive(Arbitrary, Debug)]
enum Action<Key, Value> {
    Clear,
    Insert(Key, Value),
    Get(Key),
    Remove(Key),
    RemoveMin,
    RemoveMax,
    Range(Bound<Key>, Bound<Key>),
    AscendRange(Key, Key, u8),
    Snapshot,
}

#[derive(Arbitrary, Debug)]
enum KeyType<Value> {
    U8(Vec<Action<u8, Value>>),
    U16(Vec<Action<u16, Value>>),
    I32(Vec<Action<i32, Value>>),
    U64(Vec<Action<u64, Value>>),
}

#[derive(Arbitrary, Debug)]
enum ValueType {
    Empty(KeyType<()>),
    U8(KeyType<u8>),
    U32(KeyType<u32>),
}

/// Returns `false` for ranges that `BTree::range` rejects.
fn valid_range<Key: Ord>(start: &Bound<Key>, end: &Bound<Key>) -> bool {
    match (start, end) {
        (Bound::Excluded(s), Bound::Excluded(e)) => s < e,
        (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e)) => {
            s <= e
        }
        _ => true,
    }
}

fn run<Key: Ord + Copy + Debug, Value: Eq + Copy + Debug>(
    degree: usize,
    actions: Vec<Action<Key, Value>>,
) {
    let mut btree = BTree::new(degree).unwrap();
    let mut vec: Vec<(Key, Value)> = vec![];
    let mut snapshots = vec![];
    for action in actions {
        match action {
            Action::Clear => {
                btree.clear();
                vec.clear();
            }
            Action::Insert(key, value) => {
                let old = btree.replace_or_insert(Entry::new(key, value));
                let index = vec.partition_point(|&(k, _v)| k < key);
                if index != vec.len() && vec[index].0 == key {
                    assert_eq!(old.map(|e| e.value), Some(vec[index].1));
                    vec[index].1 = value;
                } else {
                    vec.insert(index, (key, value));
                    assert_eq!(old, None);
                }
            }
            Action::Get(key) => {
                let value = btree.get(&key).map(|e| e.value);
                let index = vec.partition_point(|&(k, _v)| k < key);
                if index != vec.len() && vec[index].0 == key {
                    assert_eq!(value, Some(vec[index].1));
                } else {
                    assert_eq!(value, None);
                }
            }
            Action::Remove(key) => {
                let value = btree.remove(&key).map(|e| e.value);
                let index = vec.partition_point(|&(k, _v)| k < key);
                if index != vec.len() && vec[index].0 == key {
                    assert_eq!(value, Some(vec[index].1));
                    vec.remove(index);
                } else {
                    assert_eq!(value, None);
                }
            }
            Action::RemoveMin => {
                let entry = btree.remove_min().map(|e| (e.key, e.value));
                let expected = (!vec.is_empty()).then(|| vec.remove(0));
                assert_eq!(entry, expected);
            }
            Action::RemoveMax => {
                let entry = btree.remove_max().map(|e| (e.key, e.value));
                assert_eq!(entry, vec.pop());
            }
            Action::Range(start, end) => {
                if !valid_range(&start, &end) {
                    continue;
                }
                let entries: Vec<_> = btree
                    .range((start, end))
                    .map(|e| (e.key, e.value))
                    .collect();
                let start = match start {
                    Bound::Unbounded => 0,
                    Bound::Included(key) => vec.partition_point(|&(k, _v)| k < key),
                    Bound::Excluded(key) => vec.partition_point(|&(k, _v)| k <= key),
                };
                let end = match end {
                    Bound::Unbounded => vec.len(),
                    Bound::Included(key) => vec.partition_point(|&(k, _v)| k <= key),
                    Bound::Excluded(key) => vec.partition_point(|&(k, _v)| k < key),
                };
                assert_eq!(vec[start.min(end)..end], entries);
            }
            Action::AscendRange(start, end, limit) => {
                let mut entries = vec![];
                btree.ascend_range(start..end, |e| {
                    entries.push((e.key, e.value));
                    entries.len() < usize::from(limit).max(1)
                });
                let expected: Vec<_> = vec
                    .iter()
                    .copied()
                    .filter(|&(k, _v)| start <= k && k < end)
                    .take(usize::from(limit).max(1))
                    .collect();
                assert_eq!(entries, expected);
            }
            Action::Snapshot => snapshots.push((btree.clone(), vec.clone())),
        }

        assert_eq!(vec.len(), btree.len());
        assert_eq!(vec.is_empty(), btree.is_empty());
    }

    let btree_entries: Vec<_> = btree.iter().map(|e| (e.key, e.value)).collect();
    assert_eq!(vec, btree_entries);
    for (snapshot, expected) in snapshots {
        let entries: Vec<_> = snapshot.iter().map(|e| (e.key, e.value)).collect();
        assert_eq!(entries, expected);
    }
}

fn dispatch_by_key<Value: Eq + Copy + Debug>(degree: usize, actions: KeyType<Value>) {
    match actions {
        KeyType::U8(actions) => run(degree, actions),
        KeyType::U16(actions) => run(degree, actions),
        KeyType::I32(actions) => run(degree, actions),
        KeyType::U64(actions) => run(degree, actions),
    }
}

fuzz_target!(|input: (Degree, ValueType)| {
    let (Degree(degree), actions) = input;
    match actions {
        ValueType::Empty(actions) => dispatch_by_key(degree, actions),
        ValueType::U8(actions) => dispatch_by_key(degree, actions),
        ValueType::U32(actions) => dispatch_by_key(degree, actions),
    }
});
