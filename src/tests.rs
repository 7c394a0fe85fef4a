use alloc::{string::String, sync::Arc, vec::Vec};

use rand::{Rng, seq::SliceRandom};

use crate::{
    BTree, Config, Entry, Error, NodePool, TreeItem,
    context::{FreeState, NodeContext},
    node::Node,
};

impl<T: TreeItem> BTree<T> {
    fn check_invariants(&self) {
        let Some(root) = &self.root else {
            assert_eq!(self.len, 0);
            return;
        };
        let mut leaf_depth = None;
        let count = self.check_node(root, 0, None, None, &mut leaf_depth);
        assert_eq!(count, self.len);
    }

    fn check_node(
        &self,
        node: &Node<T>,
        depth: usize,
        min: Option<&T::Key>,
        max: Option<&T::Key>,
        leaf_depth: &mut Option<usize>,
    ) -> usize {
        assert!(node.owner.is_some());

        // Keys must be strictly increasing and within the bounds set by the
        // parent.
        assert!(node.items.is_sorted_by(|a, b| a.key() < b.key()));
        if let Some(min) = min {
            assert!(node.items.iter().all(|item| item.key() > min));
        }
        if let Some(max) = max {
            assert!(node.items.iter().all(|item| item.key() < max));
        }

        // Non-root nodes must be at least half full.
        assert!(node.items.len() <= self.config.max_items());
        if depth > 0 {
            assert!(node.items.len() >= self.config.min_items());
        }

        if node.is_leaf() {
            // All leaves are on the same level.
            assert_eq!(*leaf_depth.get_or_insert(depth), depth);
            return node.items.len();
        }

        assert_eq!(node.children.len(), node.items.len() + 1);
        let mut count = node.items.len();
        for (i, child) in node.children.iter().enumerate() {
            let lower = if i == 0 { min } else { Some(node.items[i - 1].key()) };
            let upper = node.items.get(i).map(|item| item.key()).or(max);
            count += self.check_node(child, depth + 1, lower, upper, leaf_depth);
        }
        count
    }

    fn keys(&self) -> Vec<T::Key>
    where
        T::Key: Clone,
    {
        self.iter().map(|item| item.key().clone()).collect()
    }
}

fn collect_ascending<T: TreeItem>(tree: &BTree<T>) -> Vec<T::Key>
where
    T::Key: Clone,
{
    let mut keys = Vec::new();
    tree.ascend(|item| {
        keys.push(item.key().clone());
        true
    });
    keys
}

#[test]
fn rejects_small_degree() {
    assert_eq!(BTree::<u32>::new(0).err(), Some(Error::InvalidDegree { degree: 0 }));
    assert_eq!(BTree::<u32>::new(1).err(), Some(Error::InvalidDegree { degree: 1 }));
    assert!(BTree::<u32>::new(2).is_ok());
    assert!(Config::new(1).validate().is_err());
}

#[test]
fn degree_two_walkthrough() {
    let mut tree = BTree::new(2).unwrap();
    assert_eq!(tree.degree(), 2);
    for key in [10, 20, 5, 6, 12, 30, 7, 17] {
        assert_eq!(tree.replace_or_insert(key), None);
        tree.check_invariants();
    }
    assert_eq!(collect_ascending(&tree), [5, 6, 7, 10, 12, 17, 20, 30]);

    assert_eq!(tree.remove(&10), Some(10));
    tree.check_invariants();
    assert_eq!(tree.get(&10), None);
    assert_eq!(tree.len(), 7);

    assert_eq!(tree.remove_min(), Some(5));
    tree.check_invariants();
    assert_eq!(tree.remove_max(), Some(30));
    tree.check_invariants();
    assert_eq!(tree.keys(), [6, 7, 12, 17, 20]);
}

#[test]
fn replace_returns_previous_item() {
    let mut tree = BTree::new(3).unwrap();
    assert_eq!(tree.replace_or_insert(Entry::new(7, "first")), None);
    assert_eq!(tree.len(), 1);
    assert_eq!(
        tree.replace_or_insert(Entry::new(7, "second")),
        Some(Entry::new(7, "first"))
    );
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.get(&7).map(|e| e.value), Some("second"));

    // Replacing keys that sit in internal nodes.
    for i in 0..100 {
        tree.replace_or_insert(Entry::new(i, "old"));
    }
    for i in 0..100 {
        assert_eq!(tree.replace_or_insert(Entry::new(i, "new")).map(|e| e.key), Some(i));
        tree.check_invariants();
    }
    assert_eq!(tree.len(), 100);
    assert!(tree.iter().all(|e| e.value == "new"));
}

#[test]
fn insert_sorted() {
    for degree in 2..=5 {
        let mut tree = BTree::new(degree).unwrap();
        tree.check_invariants();
        let input: Vec<u32> = (0..1000).collect();
        for &i in &input {
            tree.replace_or_insert(i);
            tree.check_invariants();
        }
        assert_eq!(tree.len(), input.len());
        assert_eq!(tree.keys(), input);
        assert_eq!(collect_ascending(&tree), input);
    }
}

#[test]
fn insert_random() {
    for degree in 2..=5 {
        let mut tree = BTree::new(degree).unwrap();
        let input: Vec<u32> = (0..1000).collect();
        let mut shuffled = input.clone();
        shuffled.shuffle(&mut rand::rng());
        for &i in &shuffled {
            assert!(!tree.contains(&i));
            tree.replace_or_insert(i);
            assert_eq!(tree.get(&i), Some(&i));
        }
        tree.check_invariants();
        assert_eq!(tree.keys(), input);
    }
}

#[test]
fn remove() {
    for degree in 2..=4 {
        let mut tree = BTree::new(degree).unwrap();
        let mut input: Vec<u32> = (0..1000).collect();
        for &i in &input {
            if i % 2 == 0 {
                tree.replace_or_insert(i);
            }
        }
        tree.check_invariants();

        while !input.is_empty() {
            let idx = rand::rng().random_range(..input.len());
            let key = input.remove(idx);
            let len = tree.len();
            let removed = tree.remove(&key);
            if key % 2 == 0 {
                assert_eq!(removed, Some(key));
                assert_eq!(tree.len(), len - 1);
            } else {
                assert_eq!(removed, None);
                assert_eq!(tree.len(), len);
            }
            tree.check_invariants();

            let filtered_input: Vec<_> = {
                let mut v: Vec<_> = input.iter().copied().filter(|i| i % 2 == 0).collect();
                v.sort_unstable();
                v
            };
            assert_eq!(tree.keys(), filtered_input);
        }
        assert!(tree.is_empty());
        assert_eq!(tree.remove_min(), None);
        assert_eq!(tree.remove_max(), None);
    }
}

#[test]
fn remove_min_and_max_drain_in_order() {
    let mut tree = BTree::new(2).unwrap();
    let mut shuffled: Vec<i64> = (-200..200).collect();
    shuffled.shuffle(&mut rand::rng());
    tree.extend(shuffled);

    for expected in -200..0 {
        assert_eq!(tree.min(), Some(&expected));
        assert_eq!(tree.remove_min(), Some(expected));
        tree.check_invariants();
    }
    for expected in (0..200).rev() {
        assert_eq!(tree.max(), Some(&expected));
        assert_eq!(tree.remove_max(), Some(expected));
        tree.check_invariants();
    }
    assert!(tree.is_empty());
    assert_eq!(tree.min(), None);
    assert_eq!(tree.max(), None);
}

#[test]
fn ascend_range_visits_half_open_interval() {
    let mut tree = BTree::new(3).unwrap();
    tree.extend((0..500u32).map(|i| i * 2));

    for (start, end) in [(0, 1000), (1, 999), (100, 101), (101, 102), (250, 250), (900, 2000)] {
        let mut seen = Vec::new();
        tree.ascend_range(start..end, |&key| {
            seen.push(key);
            true
        });
        let expected: Vec<u32> = (0..500).map(|i| i * 2).filter(|k| (start..end).contains(k)).collect();
        assert_eq!(seen, expected, "range {start}..{end}");
    }

    // Excluded lower bound.
    let mut seen = Vec::new();
    tree.ascend_range((core::ops::Bound::Excluded(10), core::ops::Bound::Excluded(20)), |&key| {
        seen.push(key);
        true
    });
    assert_eq!(seen, [12, 14, 16, 18]);
}

#[test]
fn ascend_stops_when_callback_returns_false() {
    let mut tree = BTree::new(2).unwrap();
    tree.extend(0..300u32);

    let mut seen = Vec::new();
    tree.ascend_range(50..250, |&key| {
        seen.push(key);
        seen.len() < 10
    });
    assert_eq!(seen, (50..60).collect::<Vec<_>>());

    let mut calls = 0;
    tree.ascend(|_| {
        calls += 1;
        false
    });
    assert_eq!(calls, 1);
}

#[test]
fn ascend_less_than_and_greater_or_equal() {
    let mut tree = BTree::new(2).unwrap();
    let mut seen = Vec::new();
    tree.ascend_less_than(&10, |&key: &u32| {
        seen.push(key);
        true
    });
    assert!(seen.is_empty());

    tree.extend(0..100u32);
    tree.ascend_less_than(&10, |&key| {
        seen.push(key);
        true
    });
    assert_eq!(seen, (0..10).collect::<Vec<_>>());

    seen.clear();
    tree.ascend_greater_or_equal(&90, |&key| {
        seen.push(key);
        true
    });
    assert_eq!(seen, (90..100).collect::<Vec<_>>());
}

#[test]
fn range_iterator() {
    let mut tree = BTree::new(2).unwrap();
    tree.extend((0..400u32).map(|i| i * 3));
    let all: Vec<u32> = (0..400).map(|i| i * 3).collect();

    let mut rng = rand::rng();
    for _ in 0..200 {
        let a = rng.random_range(0..1250);
        let b = rng.random_range(a..1250);
        let got: Vec<u32> = tree.range(a..b).copied().collect();
        let expected: Vec<u32> = all.iter().copied().filter(|k| (a..b).contains(k)).collect();
        assert_eq!(got, expected);

        let got: Vec<u32> = tree.range(a..=b).copied().collect();
        let expected: Vec<u32> = all.iter().copied().filter(|k| (a..=b).contains(k)).collect();
        assert_eq!(got, expected);

        let got: Vec<u32> = tree.range(a..).copied().collect();
        let expected: Vec<u32> = all.iter().copied().filter(|&k| k >= a).collect();
        assert_eq!(got, expected);
    }
    assert_eq!(tree.range::<u32, _>(..).count(), all.len());
    assert_eq!((&tree).into_iter().count(), all.len());
}

#[test]
fn borrowed_key_lookup() {
    let mut tree: BTree<Entry<String, usize>> = BTree::new(2).unwrap();
    for (i, word) in ["pear", "apple", "fig", "kiwi", "plum"].iter().enumerate() {
        tree.replace_or_insert(Entry::new(String::from(*word), i));
    }
    assert_eq!(tree.get("fig").map(|e| e.value), Some(2));
    assert!(tree.contains("kiwi"));
    assert_eq!(tree.remove("apple").map(|e| e.value), Some(1));
    assert!(!tree.contains("apple"));
    let words: Vec<&str> = tree.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(words, ["fig", "kiwi", "pear", "plum"]);
}

#[test]
fn clone_is_isolated_snapshot() {
    let mut tree = BTree::new(2).unwrap();
    tree.extend(0..500u32);
    let snapshot = tree.clone();

    for i in (0..500).step_by(3) {
        tree.remove(&i);
    }
    tree.extend(1000..1200u32);
    tree.replace_or_insert(1);
    tree.check_invariants();

    snapshot.check_invariants();
    assert_eq!(snapshot.len(), 500);
    assert_eq!(snapshot.keys(), (0..500).collect::<Vec<_>>());

    // The snapshot is itself writable without affecting the original.
    let mut fork = snapshot.clone();
    fork.clear();
    assert!(fork.is_empty());
    assert_eq!(snapshot.len(), 500);
    assert!(tree.contains(&1100));
    assert!(!snapshot.contains(&1100));
}

#[test]
fn writes_reuse_owned_nodes() {
    let mut tree = BTree::new(4).unwrap();
    tree.extend(0..10u32);
    let before = Arc::as_ptr(tree.root.as_ref().unwrap());
    tree.replace_or_insert(10);
    assert_eq!(Arc::as_ptr(tree.root.as_ref().unwrap()), before);

    // With a snapshot alive the root has to be copied.
    let snapshot = tree.clone();
    tree.replace_or_insert(11);
    assert_ne!(Arc::as_ptr(tree.root.as_ref().unwrap()), before);
    assert_eq!(Arc::as_ptr(snapshot.root.as_ref().unwrap()), before);
}

#[test]
fn clear_recycles_unshared_nodes() {
    let pool = Arc::new(NodePool::new(8));
    let mut tree = BTree::with_pool(2, Arc::clone(&pool)).unwrap();
    assert_eq!(tree.config().pool_size, 8);
    tree.extend(0..200u32);

    let snapshot = tree.clone();
    tree.clear();
    assert!(tree.is_empty());
    assert!(pool.is_empty(), "nodes shared with a snapshot must not be pooled");
    assert_eq!(snapshot.len(), 200);
    drop(snapshot);

    tree.extend(0..200u32);
    tree.clear();
    assert_eq!(pool.len(), 8);

    // Pooled shells are handed out again.
    tree.extend(0..200u32);
    tree.check_invariants();
    assert!(pool.len() < 8);
}

#[test]
fn merges_recycle_nodes() {
    let pool = Arc::new(NodePool::new(64));
    let mut tree = BTree::with_pool(2, Arc::clone(&pool)).unwrap();
    tree.extend(0..100u32);
    for i in 0..100 {
        tree.remove(&i);
    }
    tree.check_invariants();
    assert!(!pool.is_empty());
}

#[test]
fn zero_capacity_pool() {
    let mut tree = BTree::with_config(Config::new(2).with_pool_size(0)).unwrap();
    assert_eq!(tree.pool().capacity(), 0);
    tree.extend(0..100u32);
    for i in 0..50 {
        tree.remove(&i);
    }
    tree.clear();
    tree.extend(0..10u32);
    tree.check_invariants();
    assert!(tree.pool().is_empty());
}

#[test]
fn free_node_states() {
    let pool = Arc::new(NodePool::new(1));
    let a = NodeContext::<u32>::new(Arc::clone(&pool));
    let b = NodeContext::<u32>::new(Arc::clone(&pool));
    assert_ne!(a.id(), b.id());

    let node = Arc::new(a.new_node());
    assert_eq!(b.free_node(Arc::clone(&node)), FreeState::NotOwned);
    let extra = Arc::clone(&node);
    assert_eq!(a.free_node(node), FreeState::Shared);
    assert_eq!(a.free_node(extra), FreeState::Stored);
    assert_eq!(pool.len(), 1);
    assert_eq!(a.free_node(Arc::new(a.new_node())), FreeState::Stored);
    let first = Arc::new(a.new_node());
    let second = Arc::new(a.new_node());
    assert_eq!(a.free_node(first), FreeState::Stored);
    assert_eq!(a.free_node(second), FreeState::PoolFull);
}

#[test]
fn pooled_nodes_are_restamped() {
    let pool = Arc::new(NodePool::new(4));
    let a = NodeContext::<u32>::new(Arc::clone(&pool));
    let b = NodeContext::<u32>::new(Arc::clone(&pool));
    let mut node = a.new_node();
    node.items.push(1);
    assert_eq!(a.free_node(Arc::new(node)), FreeState::Stored);

    let reused = b.new_node();
    assert_eq!(reused.owner, Some(b.id()));
    assert!(reused.items.is_empty());
}

#[test]
fn item_list_find() {
    let mut node = Node::<u32>::new();
    node.items.extend([2, 4, 6]);
    assert_eq!(node.items.find(&4), Ok(1));
    assert_eq!(node.items.find(&1), Err(0));
    assert_eq!(node.items.find(&5), Err(2));
    assert_eq!(node.items.find(&7), Err(3));
}

#[test]
fn dump_structure() {
    let mut tree = BTree::new(2).unwrap();
    let mut out = String::new();
    tree.dump(&mut out).unwrap();
    assert!(out.is_empty());

    tree.extend([1u32, 2, 3, 4]);
    tree.dump(&mut out).unwrap();
    assert_eq!(out, "   | +-(o) 2\n    | +-(o) 1\n    | +-(o) 3, 4\n");
}

#[test]
fn debug_lists_items() {
    let mut tree = BTree::new(2).unwrap();
    tree.extend([3u8, 1, 2]);
    assert_eq!(alloc::format!("{tree:?}"), "[1, 2, 3]");
}

#[allow(dead_code)]
fn require_send<T: Send>() {}
#[allow(dead_code)]
fn require_sync<T: Sync>() {}
#[allow(dead_code)]
fn check_send<T: Send + Sync + TreeItem>() {
    require_send::<BTree<T>>();
    require_send::<NodePool<T>>();
}
#[allow(dead_code)]
fn check_sync<T: Send + Sync + TreeItem>() {
    require_sync::<BTree<T>>();
    require_sync::<NodePool<T>>();
}
