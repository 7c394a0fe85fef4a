//! Write contexts: the owner tags that decide between in-place mutation and
//! copy-on-write.

use core::sync::atomic::{AtomicU64, Ordering};

use alloc::sync::Arc;
use nonmax::NonMaxU64;

use crate::{item::TreeItem, node::Node, pool::NodePool};

/// Identity of a [`NodeContext`].
///
/// Ids are allocated from a process-wide counter so two live contexts never
/// compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ContextId(NonMaxU64);

impl ContextId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        loop {
            // Skips the reserved maximum if the counter ever wraps.
            if let Some(id) = NonMaxU64::new(NEXT.fetch_add(1, Ordering::Relaxed)) {
                return Self(id);
            }
        }
    }
}

/// Outcome of [`NodeContext::free_node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FreeState {
    /// The node was cleared and stored in the pool.
    Stored,
    /// The node belongs to another context and was left alone.
    NotOwned,
    /// The node is still referenced elsewhere, typically by a snapshot.
    Shared,
    /// The pool had no room left and the node was dropped.
    PoolFull,
}

/// The writer identity of one tree version.
///
/// Nodes stamped with this context's id may be modified in place as long as
/// nothing else references them. All other nodes are copied first.
pub(crate) struct NodeContext<T> {
    id: ContextId,
    pool: Arc<NodePool<T>>,
}

impl<T: TreeItem> NodeContext<T> {
    #[inline]
    pub(crate) fn new(pool: Arc<NodePool<T>>) -> Self {
        Self {
            id: ContextId::next(),
            pool,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> ContextId {
        self.id
    }

    #[inline]
    pub(crate) fn pool(&self) -> &Arc<NodePool<T>> {
        &self.pool
    }

    /// Obtains an empty node owned by this context.
    #[inline]
    pub(crate) fn new_node(&self) -> Node<T> {
        let mut node = self.pool.new_node();
        node.owner = Some(self.id);
        node
    }

    /// Returns `node` to the pool if this context owns it and nothing else
    /// references it.
    ///
    /// A node reachable from a snapshot is never recycled: the snapshot keeps
    /// it alive and it is dropped together with the last reference.
    pub(crate) fn free_node(&self, node: Arc<Node<T>>) -> FreeState {
        if node.owner != Some(self.id) {
            debug_log!(owner = ?node.owner, context = ?self.id, "refusing to free node from another context");
            return FreeState::NotOwned;
        }
        let Ok(mut node) = Arc::try_unwrap(node) else {
            return FreeState::Shared;
        };
        node.free();
        if self.pool.enqueue(node) {
            FreeState::Stored
        } else {
            FreeState::PoolFull
        }
    }
}
