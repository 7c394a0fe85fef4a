//! Bounded free-list of node shells shared by one or more trees.

use core::fmt;

use crossbeam::queue::ArrayQueue;

use crate::node::Node;

/// A bounded pool of cleared nodes available for reuse.
///
/// Nodes freed by a tree keep the capacity of their item and child vectors,
/// so handing them out again avoids most of the allocation work of a write.
/// The pool can be shared between trees (and threads) by wrapping it in an
/// `Arc` and passing it to [`BTree::with_pool`](crate::BTree::with_pool).
///
/// A pool with a capacity of zero never stores anything.
pub struct NodePool<T> {
    queue: Option<ArrayQueue<Node<T>>>,
}

impl<T> NodePool<T> {
    /// Creates an empty pool which holds at most `capacity` nodes.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: (capacity > 0).then(|| ArrayQueue::new(capacity)),
        }
    }

    /// Maximum number of nodes the pool holds.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.as_ref().map_or(0, ArrayQueue::capacity)
    }

    /// Number of nodes currently waiting for reuse.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.as_ref().map_or(0, ArrayQueue::len)
    }

    /// Returns `true` if there are no nodes waiting for reuse.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a pooled shell if one is available, otherwise a new empty
    /// node.
    ///
    /// The returned node has no owner.
    #[inline]
    pub(crate) fn new_node(&self) -> Node<T> {
        self.queue
            .as_ref()
            .and_then(ArrayQueue::pop)
            .unwrap_or_else(Node::new)
    }

    /// Returns a cleared node to the pool.
    ///
    /// Returns `false` if the pool is full, in which case the node is dropped.
    #[inline]
    pub(crate) fn enqueue(&self, node: Node<T>) -> bool {
        debug_assert!(node.items.is_empty() && node.children.is_empty());
        let Some(queue) = &self.queue else {
            return false;
        };
        if queue.push(node).is_err() {
            trace_log!(capacity = queue.capacity(), "node pool full, discarding node");
            return false;
        }
        true
    }
}

impl<T> fmt::Debug for NodePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePool")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
