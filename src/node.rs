//! Tree nodes and the copy-on-write B-Tree algorithms.
//!
//! Every mutating algorithm here runs on a node that is already owned by the
//! writing [`NodeContext`], and takes ownership of each child it touches via
//! [`Node::clone_child`] before modifying it. Nodes that are only read are
//! never copied, so a write copies exactly the path it walks.

use core::{borrow::Borrow, cmp::Ordering, fmt, mem};

use alloc::{sync::Arc, vec::Vec};

use crate::{
    context::{ContextId, FreeState, NodeContext},
    item::{ItemList, TreeItem},
};

/// A node of the tree.
///
/// Invariants:
/// - `items` is sorted by key with no duplicates.
/// - `children` is either empty (leaf) or holds exactly `items.len() + 1`
///   nodes, where every key in `children[i]` is less than `items[i]` and every
///   key in `children[i + 1]` is greater.
/// - Nodes reachable from a tree always have an owner. Only pooled shells have
///   none.
#[derive(Clone)]
pub(crate) struct Node<T> {
    pub(crate) items: ItemList<T>,
    pub(crate) children: Vec<Arc<Node<T>>>,
    pub(crate) owner: Option<ContextId>,
}

/// What a removal is looking for.
pub(crate) enum Target<'a, Q: ?Sized> {
    Min,
    Max,
    Key(&'a Q),
}

impl<Q: ?Sized> Clone for Target<'_, Q> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<Q: ?Sized> Copy for Target<'_, Q> {}

impl<T> Node<T> {
    /// Creates an empty node with no owner.
    #[inline]
    pub(crate) const fn new() -> Self {
        Self {
            items: ItemList::new(),
            children: Vec::new(),
            owner: None,
        }
    }

    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Clears the node so it can be pooled, keeping its allocations.
    #[inline]
    pub(crate) fn free(&mut self) {
        self.items.clear();
        self.children.clear();
        self.owner = None;
    }
}

impl<T: TreeItem> Node<T> {
    /// Makes the node in `slot` writable by `ctx` and returns it.
    ///
    /// The node is modified in place if `ctx` owns it and nothing else holds
    /// a reference to it. Otherwise it is replaced by a shallow copy owned by
    /// `ctx`: items are cloned, children are shared.
    pub(crate) fn clone_for<'a>(slot: &'a mut Arc<Self>, ctx: &NodeContext<T>) -> &'a mut Self {
        assert!(slot.owner.is_some(), "cloning a node with no owning context");
        if slot.owner != Some(ctx.id()) || Arc::get_mut(slot).is_none() {
            let mut copy = ctx.new_node();
            copy.items.extend(slot.items.iter().cloned());
            copy.children.extend(slot.children.iter().cloned());
            *slot = Arc::new(copy);
        }

        // The node is now unique, so this never clones.
        Arc::make_mut(slot)
    }

    /// Makes the child at `index` writable by `ctx` and returns it.
    #[inline]
    fn clone_child(&mut self, index: usize, ctx: &NodeContext<T>) -> &mut Self {
        Self::clone_for(&mut self.children[index], ctx)
    }

    /// Looks up the item with the given key in this sub-tree.
    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut node = self;
        loop {
            match node.items.find(key) {
                Ok(index) => return Some(&node.items[index]),
                Err(index) => node = node.children.get(index)?,
            }
        }
    }

    /// Returns the smallest item in this sub-tree.
    pub(crate) fn first(&self) -> Option<&T> {
        let mut node = self;
        while let Some(child) = node.children.first() {
            node = child;
        }
        node.items.first()
    }

    /// Returns the largest item in this sub-tree.
    pub(crate) fn last(&self) -> Option<&T> {
        let mut node = self;
        while let Some(child) = node.children.last() {
            node = child;
        }
        node.items.last()
    }

    /// Splits the node at `index`.
    ///
    /// Returns the item at `index`, which moves up into the parent, and a new
    /// sibling holding every item (and child) after it.
    pub(crate) fn split(&mut self, index: usize, ctx: &NodeContext<T>) -> (T, Arc<Self>) {
        let mut sibling = ctx.new_node();
        sibling.items.extend(self.items.drain(index + 1..));
        if !self.is_leaf() {
            sibling.children.extend(self.children.drain(index + 1..));
        }
        let item = self.items.remove(index);
        (item, Arc::new(sibling))
    }

    /// Splits the child at `index` if it is full, moving its middle item into
    /// this node.
    ///
    /// Returns `true` if a split happened.
    fn maybe_split_child(&mut self, index: usize, max_items: usize, ctx: &NodeContext<T>) -> bool {
        if self.children[index].items.len() < max_items {
            return false;
        }
        let (item, sibling) = self.clone_child(index, ctx).split(max_items / 2, ctx);
        self.items.insert(index, item);
        self.children.insert(index + 1, sibling);
        true
    }

    /// Inserts `item` into this sub-tree, which must have room for one more
    /// item.
    ///
    /// Full children are split before descending into them, so no node on
    /// the path ever needs a second pass. Returns the item previously stored
    /// under the same key, if any.
    pub(crate) fn insert(&mut self, item: T, max_items: usize, ctx: &NodeContext<T>) -> Option<T> {
        let mut index = match self.items.find(item.key()) {
            Ok(index) => return Some(mem::replace(&mut self.items[index], item)),
            Err(index) => index,
        };
        if self.is_leaf() {
            self.items.insert(index, item);
            return None;
        }
        if self.maybe_split_child(index, max_items, ctx) {
            match item.key().cmp(self.items[index].key()) {
                Ordering::Less => {}
                Ordering::Greater => index += 1,
                Ordering::Equal => return Some(mem::replace(&mut self.items[index], item)),
            }
        }
        self.clone_child(index, ctx).insert(item, max_items, ctx)
    }

    /// Removes the item described by `target` from this sub-tree.
    ///
    /// Before descending into a child that holds only `min_items` items, the
    /// child is grown by stealing from or merging with a sibling so that the
    /// removal cannot leave it underfull.
    pub(crate) fn remove<Q>(
        &mut self,
        target: Target<'_, Q>,
        min_items: usize,
        ctx: &NodeContext<T>,
    ) -> Option<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (index, found) = match target {
            Target::Min => {
                if self.is_leaf() {
                    return (!self.items.is_empty()).then(|| self.items.remove(0));
                }
                (0, false)
            }
            Target::Max => {
                if self.is_leaf() {
                    return self.items.pop();
                }
                (self.items.len(), false)
            }
            Target::Key(key) => {
                let search = self.items.find(key);
                if self.is_leaf() {
                    return search.ok().map(|index| self.items.remove(index));
                }
                match search {
                    Ok(index) => (index, true),
                    Err(index) => (index, false),
                }
            }
        };

        if self.children[index].items.len() <= min_items {
            return self.grow_child_and_remove(index, target, min_items, ctx);
        }

        let child = self.clone_child(index, ctx);
        if found {
            // The item lives in this internal node: replace it with its
            // in-order predecessor, the maximum of the left sub-tree.
            let Some(predecessor) = child.remove(Target::<Q>::Max, min_items, ctx) else {
                unreachable!("internal node has an empty left sub-tree");
            };
            return Some(mem::replace(&mut self.items[index], predecessor));
        }
        child.remove(target, min_items, ctx)
    }

    /// Gives the child at `index` at least one more item than `min_items`,
    /// then retries the removal from this node.
    fn grow_child_and_remove<Q>(
        &mut self,
        mut index: usize,
        target: Target<'_, Q>,
        min_items: usize,
        ctx: &NodeContext<T>,
    ) -> Option<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if index > 0 && self.children[index - 1].items.len() > min_items {
            // Steal from the left sibling.
            let left = self.clone_child(index - 1, ctx);
            let Some(stolen) = left.items.pop() else {
                unreachable!("left sibling has no item to steal");
            };
            let stolen_child = left.children.pop();
            let separator = mem::replace(&mut self.items[index - 1], stolen);

            let child = self.clone_child(index, ctx);
            child.items.insert(0, separator);
            if let Some(stolen_child) = stolen_child {
                child.children.insert(0, stolen_child);
            }
        } else if index < self.items.len() && self.children[index + 1].items.len() > min_items {
            // Steal from the right sibling.
            let right = self.clone_child(index + 1, ctx);
            let stolen = right.items.remove(0);
            let stolen_child = (!right.is_leaf()).then(|| right.children.remove(0));
            let separator = mem::replace(&mut self.items[index], stolen);

            let child = self.clone_child(index, ctx);
            child.items.push(separator);
            if let Some(stolen_child) = stolen_child {
                child.children.push(stolen_child);
            }
        } else {
            // Merge with the right sibling, or with the left one if this is
            // the last child.
            if index >= self.items.len() {
                index -= 1;
            }
            let separator = self.items.remove(index);
            let mut merged = self.children.remove(index + 1);

            let child = self.clone_child(index, ctx);
            child.items.push(separator);
            match Arc::get_mut(&mut merged) {
                Some(sibling) => {
                    child.items.append(&mut sibling.items);
                    child.children.append(&mut sibling.children);
                }
                None => {
                    child.items.extend(merged.items.iter().cloned());
                    child.children.extend(merged.children.iter().cloned());
                }
            }
            ctx.free_node(merged);
        }
        self.remove(target, min_items, ctx)
    }

    /// Returns every node of the sub-tree rooted at `node` to the pool,
    /// children first.
    ///
    /// Nodes still referenced by a snapshot are skipped together with their
    /// descendants. Returns `false` as soon as the pool is full; the nodes not
    /// visited yet are simply dropped.
    pub(crate) fn reset(mut node: Arc<Self>, ctx: &NodeContext<T>) -> bool {
        let Some(inner) = Arc::get_mut(&mut node) else {
            return true;
        };
        if !inner.children.drain(..).all(|child| Self::reset(child, ctx)) {
            return false;
        }
        ctx.free_node(node) != FreeState::PoolFull
    }

    /// Writes the structure of this sub-tree, one node per line, indented by
    /// depth.
    pub(crate) fn dump<W: fmt::Write>(&self, out: &mut W, level: usize) -> fmt::Result
    where
        T::Key: fmt::Debug,
    {
        write!(out, "{:indent$} | +-(o) ", "", indent = level + 2)?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            write!(out, "{:?}", item.key())?;
        }
        out.write_char('\n')?;
        for child in &self.children {
            child.dump(out, level + 1)?;
        }
        Ok(())
    }
}
