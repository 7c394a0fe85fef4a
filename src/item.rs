//! Items stored in the tree and the sorted list that holds them in a node.

use core::{
    borrow::Borrow,
    ops::{Deref, DerefMut},
};

use alloc::{string::String, vec::Vec};

/// Trait which must be implemented for all items inserted into a
/// [`BTree`](crate::BTree).
///
/// An item is identified by its key: the tree never holds two items with
/// equal keys, and inserting an item whose key is already present replaces
/// the stored item.
///
/// Items are cloned whenever a node shared with a snapshot is modified, so
/// large payloads are best kept behind an `Arc`.
pub trait TreeItem: Clone {
    /// Key type that orders the items.
    type Key: Ord;

    /// Returns the key of this item.
    fn key(&self) -> &Self::Key;
}

/// A key paired with an arbitrary payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Entry<K, V> {
    /// Key identifying the entry.
    pub key: K,
    /// Payload carried alongside the key.
    pub value: V,
}

impl<K, V> Entry<K, V> {
    /// Creates a new entry.
    #[inline]
    pub const fn new(key: K, value: V) -> Self {
        Self { key, value }
    }
}

impl<K: Ord + Clone, V: Clone> TreeItem for Entry<K, V> {
    type Key = K;

    #[inline]
    fn key(&self) -> &K {
        &self.key
    }
}

impl<K, V> From<(K, V)> for Entry<K, V> {
    #[inline]
    fn from((key, value): (K, V)) -> Self {
        Self { key, value }
    }
}

macro_rules! impl_item {
    ($($ty:ty,)*) => {
        $(
            impl TreeItem for $ty {
                type Key = Self;

                #[inline]
                fn key(&self) -> &Self {
                    self
                }
            }
        )*
    };
}

impl_item! {
    u8, u16, u32, u64, u128, usize,
    i8, i16, i32, i64, i128, isize,
    char, String, &'static str,
}

/// Sorted, duplicate-free sequence of items held by one node.
///
/// Dereferences to the underlying `Vec` for positional edits. Callers are
/// responsible for inserting at the position returned by [`ItemList::find`].
#[derive(Clone)]
pub(crate) struct ItemList<T>(Vec<T>);

impl<T: TreeItem> ItemList<T> {
    /// Binary-searches the list for `key`.
    ///
    /// Returns `Ok(index)` if an item with this key is present, otherwise
    /// `Err(index)` with the position at which such an item would be
    /// inserted to keep the list sorted.
    #[inline]
    pub(crate) fn find<Q>(&self, key: &Q) -> Result<usize, usize>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.0.binary_search_by(|item| item.key().borrow().cmp(key))
    }
}

impl<T> ItemList<T> {
    #[inline]
    pub(crate) const fn new() -> Self {
        Self(Vec::new())
    }
}

impl<T> Deref for ItemList<T> {
    type Target = Vec<T>;

    #[inline]
    fn deref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<T> DerefMut for ItemList<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.0
    }
}

#[cfg(feature = "internal_benches")]
mod benches {
    use divan::Bencher;

    use super::{Entry, ItemList};

    #[divan::bench(args = [1, 3, 7, 15, 31, 63])]
    fn find(bencher: Bencher, len: u32) {
        let mut list = ItemList::new();
        list.extend((0..len).map(|i| Entry::new(i * 2, ())));
        bencher.bench_local(|| {
            for key in 0..len * 2 {
                let _ = divan::black_box(list.find(divan::black_box(&key)));
            }
        });
    }
}
