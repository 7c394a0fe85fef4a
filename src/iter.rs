use core::{
    borrow::Borrow,
    iter::FusedIterator,
    ops::{Bound, RangeBounds},
    ptr,
};

use alloc::vec::Vec;

use crate::{BTree, item::TreeItem, node::Node};

/// Returns `true` if `key` lies below the lower bound `start`.
#[inline]
fn before_start<Q: Ord + ?Sized>(key: &Q, start: Bound<&Q>) -> bool {
    match start {
        Bound::Included(start) => key < start,
        Bound::Excluded(start) => key <= start,
        Bound::Unbounded => false,
    }
}

/// Returns `true` if `key` lies at or past the upper bound `end`.
#[inline]
fn past_end<Q: Ord + ?Sized>(key: &Q, end: Bound<&Q>) -> bool {
    match end {
        Bound::Included(end) => key > end,
        Bound::Excluded(end) => key >= end,
        Bound::Unbounded => false,
    }
}

/// Walks the sub-tree rooted at `node` in ascending key order, calling `f`
/// on every item between `start` and `end`.
///
/// Returns `false` if the walk was cut short, either because `f` returned
/// `false` or because an item past `end` was reached. Callers stop their own
/// walk in that case.
pub(crate) fn ascend<T, Q, F>(node: &Node<T>, start: Bound<&Q>, end: Bound<&Q>, f: &mut F) -> bool
where
    T: TreeItem,
    T::Key: Borrow<Q>,
    Q: Ord + ?Sized,
    F: FnMut(&T) -> bool,
{
    // Skip the items (and the sub-trees left of them) that are entirely
    // below the start bound. When the start key is present in this node the
    // child on its left only holds smaller keys and is skipped too.
    let (first, skip_child) = match start {
        Bound::Included(key) | Bound::Excluded(key) => match node.items.find(key) {
            Ok(index) => (index, true),
            Err(index) => (index, false),
        },
        Bound::Unbounded => (0, false),
    };

    for (i, item) in node.items.iter().enumerate().skip(first) {
        if !node.is_leaf()
            && !(i == first && skip_child)
            && !ascend(&node.children[i], start, end, f)
        {
            return false;
        }
        let key = item.key().borrow();
        if before_start(key, start) {
            continue;
        }
        if past_end(key, end) {
            return false;
        }
        if !f(item) {
            return false;
        }
    }

    match node.children.last() {
        Some(child) => ascend(child, start, end, f),
        None => true,
    }
}

/// An iterator over the items of a [`BTree`], in ascending key order.
pub struct Iter<'a, T> {
    /// Path from the root to the current node. Each entry holds a node and
    /// the index of the next item to yield from it; every child left of that
    /// item has already been visited or is further up the stack.
    stack: Vec<(&'a Node<T>, usize)>,
}

impl<'a, T> Iter<'a, T> {
    #[inline]
    fn empty() -> Self {
        Self { stack: Vec::new() }
    }

    /// Pushes the path to the left-most leaf of `node`.
    #[inline]
    fn descend_first(&mut self, mut node: &'a Node<T>) {
        loop {
            self.stack.push((node, 0));
            match node.children.first() {
                Some(child) => node = child,
                None => return,
            }
        }
    }
}

impl<'a, T: TreeItem> Iter<'a, T> {
    /// Returns an iterator positioned at the first item of `root`.
    pub(crate) fn new(root: Option<&'a Node<T>>) -> Self {
        let mut iter = Self::empty();
        if let Some(root) = root {
            iter.descend_first(root);
        }
        iter
    }

    /// Returns an iterator positioned at the first item of `root` that is not
    /// below `start`.
    pub(crate) fn seek<Q>(root: Option<&'a Node<T>>, start: Bound<&Q>) -> Self
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (key, inclusive) = match start {
            Bound::Included(key) => (key, true),
            Bound::Excluded(key) => (key, false),
            Bound::Unbounded => return Self::new(root),
        };

        let mut iter = Self::empty();
        let Some(mut node) = root else {
            return iter;
        };
        loop {
            match node.items.find(key) {
                Ok(index) if inclusive => {
                    iter.stack.push((node, index));
                    return iter;
                }
                Ok(index) => {
                    iter.stack.push((node, index + 1));
                    if let Some(child) = node.children.get(index + 1) {
                        iter.descend_first(child);
                    }
                    return iter;
                }
                Err(index) => {
                    iter.stack.push((node, index));
                    match node.children.get(index) {
                        Some(child) => node = child,
                        None => return iter,
                    }
                }
            }
        }
    }

    /// Returns the next item without advancing.
    #[inline]
    fn peek(&self) -> Option<&'a T> {
        // Exhausted entries are only popped lazily, so look past them.
        self.stack
            .iter()
            .rev()
            .find_map(|&(node, index)| node.items.get(index))
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        loop {
            let (node, index) = self.stack.last_mut()?;
            let node: &'a Node<T> = *node;
            if let Some(item) = node.items.get(*index) {
                *index += 1;
                let next = *index;
                if let Some(child) = node.children.get(next) {
                    self.descend_first(child);
                }
                return Some(item);
            }
            self.stack.pop();
        }
    }
}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
        }
    }
}

/// An iterator over a sub-range of the items of a [`BTree`].
///
/// Unlike `BTreeMap`, this is not a [`DoubleEndedIterator`]: it only allows
/// forward iteration.
pub struct Range<'a, T> {
    iter: Iter<'a, T>,

    /// First item past the range, or `None` if the range runs to the end of
    /// the tree.
    end: Option<&'a T>,
}

impl<'a, T> Iterator for Range<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        let item = self.iter.next()?;
        if self.end.is_some_and(|end| ptr::eq(end, item)) {
            self.iter.stack.clear();
            return None;
        }
        Some(item)
    }
}

impl<T> FusedIterator for Range<'_, T> {}

impl<T> Clone for Range<'_, T> {
    fn clone(&self) -> Self {
        Self {
            iter: self.iter.clone(),
            end: self.end,
        }
    }
}

impl<T: TreeItem> BTree<T> {
    /// Gets an iterator over the items of the tree, sorted by key.
    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.root.as_deref())
    }

    /// Constructs an iterator over a sub-range of items in the tree.
    ///
    /// # Panics
    ///
    /// Panics if the start of the range is greater than its end, like
    /// `BTreeMap::range`.
    pub fn range<Q, R>(&self, range: R) -> Range<'_, T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
    {
        check_range(range.start_bound(), range.end_bound());
        let root = self.root.as_deref();
        let iter = Iter::seek(root, range.start_bound());
        let end = match range.end_bound() {
            Bound::Included(key) => Iter::seek(root, Bound::Excluded(key)).peek(),
            Bound::Excluded(key) => Iter::seek(root, Bound::Included(key)).peek(),
            Bound::Unbounded => None,
        };
        Range { iter, end }
    }
}

/// Panics on ranges whose start lies past their end.
fn check_range<Q: Ord + ?Sized>(start: Bound<&Q>, end: Bound<&Q>) {
    match (start, end) {
        (Bound::Excluded(s), Bound::Excluded(e)) if s == e => {
            panic!("range start and end are equal and excluded in BTree")
        }
        (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e))
            if s > e =>
        {
            panic!("range start is greater than range end in BTree")
        }
        _ => {}
    }
}

impl<'a, T: TreeItem> IntoIterator for &'a BTree<T> {
    type Item = &'a T;

    type IntoIter = Iter<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
