//! Construction parameters for a [`BTree`](crate::BTree).

use crate::error::{Error, Result};

/// Degree used by [`Config::default`].
pub const DEFAULT_DEGREE: usize = 32;

/// Number of recycled nodes a pool holds by default.
pub const DEFAULT_POOL_SIZE: usize = 32;

/// Shape of a tree and the size of its node pool.
///
/// A node holds at most `2 * degree - 1` items and, unless it is the root, at
/// least `degree - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Branching parameter, at least 2.
    pub degree: usize,

    /// Capacity of the node pool. Zero disables recycling.
    pub pool_size: usize,
}

impl Config {
    /// Creates a configuration with the given degree and the default pool
    /// size.
    #[inline]
    pub const fn new(degree: usize) -> Self {
        Self {
            degree,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    /// Sets the capacity of the node pool.
    #[inline]
    pub const fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Checks that the configuration describes a valid tree.
    pub fn validate(&self) -> Result<()> {
        if self.degree <= 1 {
            return Err(Error::InvalidDegree {
                degree: self.degree,
            });
        }
        Ok(())
    }

    /// Minimum number of items in a non-root node.
    #[inline]
    pub(crate) const fn min_items(&self) -> usize {
        self.degree - 1
    }

    /// Maximum number of items in any node.
    #[inline]
    pub(crate) const fn max_items(&self) -> usize {
        self.degree * 2 - 1
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_DEGREE)
    }
}
