//! This crate provides [`BTree`], a copy-on-write B+ Tree whose clones are
//! O(1) snapshots.

#![warn(missing_docs)]

extern crate alloc;

use core::{
    borrow::Borrow,
    fmt,
    ops::{Bound, RangeBounds},
};

use alloc::sync::Arc;
use context::NodeContext;
use node::{Node, Target};

#[macro_use]
mod log;

mod config;
mod context;
mod error;
mod item;
mod iter;
mod node;
mod pool;
#[cfg(test)]
mod tests;

pub use config::{Config, DEFAULT_DEGREE, DEFAULT_POOL_SIZE};
pub use error::{Error, Result};
pub use item::{Entry, TreeItem};
pub use iter::*;
pub use pool::NodePool;

/// An ordered set of items based on a copy-on-write [B+ Tree].
///
/// Items are identified by their [`TreeItem::key`]. Inserting an item whose
/// key is already present replaces the stored item and hands back the old
/// one.
///
/// Cloning a `BTree` is O(1): the clone shares every node with the original
/// and each side copies a node only when it first modifies it. A clone is
/// therefore a stable snapshot that can be read (or sent to another thread)
/// while the original keeps changing.
///
/// Nodes removed by a write are recycled through a bounded [`NodePool`],
/// which may be shared by several trees. A node that a snapshot still refers
/// to is never recycled.
///
/// ```
/// use cow_btree::{BTree, Entry};
///
/// let mut tree = BTree::new(2)?;
/// assert_eq!(tree.replace_or_insert(Entry::new(1, "a")), None);
/// let snapshot = tree.clone();
/// assert_eq!(tree.replace_or_insert(Entry::new(1, "b")), Some(Entry::new(1, "a")));
/// assert_eq!(snapshot.get(&1).map(|e| e.value), Some("a"));
/// assert_eq!(tree.get(&1).map(|e| e.value), Some("b"));
/// # Ok::<(), cow_btree::Error>(())
/// ```
///
/// [B+ Tree]: https://en.wikipedia.org/wiki/B%2B_tree
pub struct BTree<T> {
    config: Config,
    root: Option<Arc<Node<T>>>,
    len: usize,
    context: NodeContext<T>,
}

impl<T: TreeItem> BTree<T> {
    /// Creates a new, empty [`BTree`] with the given degree and a private
    /// node pool of [`DEFAULT_POOL_SIZE`] nodes.
    ///
    /// Fails if `degree` is less than 2.
    #[inline]
    pub fn new(degree: usize) -> Result<Self> {
        Self::with_config(Config::new(degree))
    }

    /// Creates a new, empty [`BTree`] from a [`Config`].
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(NodePool::new(config.pool_size));
        Ok(Self::from_parts(config, pool))
    }

    /// Creates a new, empty [`BTree`] that recycles nodes through `pool`.
    ///
    /// The pool may be shared with other trees, including trees on other
    /// threads.
    pub fn with_pool(degree: usize, pool: Arc<NodePool<T>>) -> Result<Self> {
        let config = Config::new(degree).with_pool_size(pool.capacity());
        config.validate()?;
        Ok(Self::from_parts(config, pool))
    }

    fn from_parts(config: Config, pool: Arc<NodePool<T>>) -> Self {
        debug_log!(
            degree = config.degree,
            pool_size = config.pool_size,
            "created tree"
        );
        Self {
            config,
            root: None,
            len: 0,
            context: NodeContext::new(pool),
        }
    }

    /// Returns the degree of the tree.
    #[inline]
    pub fn degree(&self) -> usize {
        self.config.degree
    }

    /// Returns the number of items in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree contains no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the configuration the tree was built with.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the pool this tree recycles nodes through.
    #[inline]
    pub fn pool(&self) -> &Arc<NodePool<T>> {
        self.context.pool()
    }

    /// Inserts `item` into the tree.
    ///
    /// If the tree did not have an item with this key, `None` is returned.
    ///
    /// If the tree did have an item with this key, it is replaced and the old
    /// item is returned. The length of the tree is unchanged in that case.
    pub fn replace_or_insert(&mut self, item: T) -> Option<T> {
        let max_items = self.config.max_items();
        let Some(mut root) = self.root.take() else {
            let mut node = self.context.new_node();
            node.items.push(item);
            self.root = Some(Arc::new(node));
            self.len += 1;
            return None;
        };

        // A full root is split before descending. Its middle item becomes
        // the only item of the new root.
        let node = Node::clone_for(&mut root, &self.context);
        if node.items.len() >= max_items {
            let (middle, sibling) = node.split(max_items / 2, &self.context);
            let mut grown = self.context.new_node();
            grown.items.push(middle);
            grown.children.push(root);
            grown.children.push(sibling);
            root = Arc::new(grown);
            trace_log!(len = self.len, "grew tree by one level");
        }

        let replaced =
            Node::clone_for(&mut root, &self.context).insert(item, max_items, &self.context);
        self.root = Some(root);
        if replaced.is_none() {
            self.len += 1;
        }
        replaced
    }

    /// Returns a reference to the item with the given key.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.root.as_ref()?.get(key)
    }

    /// Returns `true` if the tree contains an item with the given key.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Returns the item with the smallest key.
    #[inline]
    pub fn min(&self) -> Option<&T> {
        self.root.as_ref()?.first()
    }

    /// Returns the item with the largest key.
    #[inline]
    pub fn max(&self) -> Option<&T> {
        self.root.as_ref()?.last()
    }

    /// Removes the item with the given key from the tree, returning it if it
    /// was present.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.remove_target(Target::Key(key))
    }

    /// Removes and returns the item with the smallest key.
    #[inline]
    pub fn remove_min(&mut self) -> Option<T> {
        self.remove_target(Target::<T::Key>::Min)
    }

    /// Removes and returns the item with the largest key.
    #[inline]
    pub fn remove_max(&mut self) -> Option<T> {
        self.remove_target(Target::<T::Key>::Max)
    }

    fn remove_target<Q>(&mut self, target: Target<'_, Q>) -> Option<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let root = self.root.as_mut()?;
        if root.items.is_empty() {
            return None;
        }

        let node = Node::clone_for(root, &self.context);
        let removed = node.remove(target, self.config.min_items(), &self.context);

        // A merge below the root may have pulled its last item down, leaving
        // it with a single child that becomes the new root.
        if node.items.is_empty()
            && let Some(child) = node.children.pop()
        {
            let old_root = core::mem::replace(root, child);
            self.context.free_node(old_root);
            trace_log!(len = self.len, "shrank tree by one level");
        }

        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Removes every item from the tree.
    ///
    /// Nodes are returned to the pool until it is full. Nodes still shared
    /// with a clone of this tree are left to that clone.
    pub fn clear(&mut self) {
        if let Some(root) = self.root.take()
            && !Node::reset(root, &self.context)
        {
            debug_log!(
                pool_size = self.config.pool_size,
                "node pool full, dropping remaining nodes"
            );
        }
        self.len = 0;
    }

    /// Calls `f` on every item in ascending key order until `f` returns
    /// `false`.
    #[inline]
    pub fn ascend<F>(&self, f: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.ascend_bounds::<T::Key, F>(Bound::Unbounded, Bound::Unbounded, f);
    }

    /// Calls `f` on every item within `range` in ascending key order until `f`
    /// returns `false`.
    ///
    /// An empty or inverted range visits nothing.
    #[inline]
    pub fn ascend_range<Q, R, F>(&self, range: R, f: F)
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
        F: FnMut(&T) -> bool,
    {
        self.ascend_bounds(range.start_bound(), range.end_bound(), f);
    }

    /// Calls `f` on every item with a key less than `pivot` in ascending key
    /// order until `f` returns `false`.
    #[inline]
    pub fn ascend_less_than<Q, F>(&self, pivot: &Q, f: F)
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
        F: FnMut(&T) -> bool,
    {
        self.ascend_bounds(Bound::Unbounded, Bound::Excluded(pivot), f);
    }

    /// Calls `f` on every item with a key greater than or equal to `pivot` in
    /// ascending key order until `f` returns `false`.
    #[inline]
    pub fn ascend_greater_or_equal<Q, F>(&self, pivot: &Q, f: F)
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
        F: FnMut(&T) -> bool,
    {
        self.ascend_bounds(Bound::Included(pivot), Bound::Unbounded, f);
    }

    fn ascend_bounds<Q, F>(&self, start: Bound<&Q>, end: Bound<&Q>, mut f: F)
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = &self.root {
            iter::ascend(root, start, end, &mut f);
        }
    }

    /// Writes the node structure of the tree, one node per line, indented by
    /// depth. Intended for debugging only; the format is not stable.
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result
    where
        T::Key: fmt::Debug,
    {
        match &self.root {
            Some(root) => root.dump(out, 0),
            None => Ok(()),
        }
    }
}

impl<T: TreeItem> Clone for BTree<T> {
    /// Returns a snapshot of the tree in O(1).
    ///
    /// Both trees share all nodes until they are modified. The clone writes
    /// through a fresh context on the same pool.
    #[inline]
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            root: self.root.clone(),
            len: self.len,
            context: NodeContext::new(Arc::clone(self.context.pool())),
        }
    }
}

impl<T: TreeItem> Default for BTree<T> {
    #[inline]
    fn default() -> Self {
        let config = Config::default();
        Self::from_parts(config, Arc::new(NodePool::new(config.pool_size)))
    }
}

impl<T: TreeItem> Extend<T> for BTree<T> {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        iter.into_iter().for_each(|item| {
            self.replace_or_insert(item);
        });
    }
}

impl<T: TreeItem + fmt::Debug> fmt::Debug for BTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
