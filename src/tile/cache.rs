//! Bounded cache for encoded tiles.
//!
//! Entries are evicted in insertion order (FIFO). Reads never change an
//! entry's position, so the oldest-inserted tile is always the next to go
//! regardless of how often it is requested.
//!
//! # Concurrency
//!
//! Lookups share a read lock; inserts take the write lock. Two requests
//! missing on the same key may both render it; the second insert simply
//! replaces the first with identical bytes.

use std::fmt;
use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

/// Default maximum number of cached tiles.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 1000;

// =============================================================================
// Tile Key
// =============================================================================

/// Slippy tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Zoom level
    pub z: u32,

    /// Column, `0..2^z` from the antimeridian eastwards
    pub x: u32,

    /// Row, `0..2^z` from the north
    pub y: u32,
}

impl TileKey {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// FIFO cache of encoded tile images.
///
/// Stored buffers are owned by the cache; callers get cheap [`Bytes`]
/// clones that share the allocation.
///
/// # Example
///
/// ```
/// use raster_tiler::tile::{TileCache, TileKey};
/// use bytes::Bytes;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = TileCache::with_capacity(2);
///
///     cache.put(TileKey::new(1, 0, 0), Bytes::from_static(b"a")).await;
///     cache.put(TileKey::new(1, 1, 0), Bytes::from_static(b"b")).await;
///     cache.put(TileKey::new(1, 0, 1), Bytes::from_static(b"c")).await;
///
///     // The first insert was evicted
///     assert!(cache.get(&TileKey::new(1, 0, 0)).await.is_none());
///     assert_eq!(cache.len().await, 2);
/// }
/// ```
pub struct TileCache {
    /// Used strictly in insertion order: reads go through `peek`
    cache: RwLock<LruCache<TileKey, Bytes>>,

    capacity: usize,
}

impl TileCache {
    /// Create a cache holding up to [`DEFAULT_TILE_CACHE_CAPACITY`] tiles.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a cache holding up to `capacity` tiles (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
            capacity: capacity.get(),
        }
    }

    /// Look up a tile without affecting eviction order.
    pub async fn get(&self, key: &TileKey) -> Option<Bytes> {
        let cache = self.cache.read().await;
        cache.peek(key).cloned()
    }

    pub async fn contains(&self, key: &TileKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a tile.
    ///
    /// Replacing an existing key keeps its original insertion position.
    /// Inserting a new key into a full cache evicts the oldest entry.
    pub async fn put(&self, key: TileKey, data: Bytes) {
        let mut cache = self.cache.write().await;

        if let Some(existing) = cache.peek_mut(&key) {
            *existing = data;
            return;
        }

        cache.put(key, data);
    }

    /// Remove a tile, returning it if present.
    pub async fn remove(&self, key: &TileKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        cache.pop(key)
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// Number of cached tiles.
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }

    /// Total size of cached tiles in bytes.
    pub async fn size(&self) -> usize {
        let cache = self.cache.read().await;
        cache.iter().map(|(_, data)| data.len()).sum()
    }

    /// Maximum number of tiles held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
