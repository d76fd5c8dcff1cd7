//! A block cache in front of a slow `ByteSource`.
use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::Mutex;

use crate::source::ByteSource;
use crate::{ErrorKind, Result};

/// Options of `CachedSource`.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Size of a cache block in bytes.
    pub block_size: u64,

    /// Upper bound of the total bytes held by the cache.
    pub max_bytes: u64,
}
impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            block_size: 1024 * 1024,
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

type Slot = Arc<Mutex<Option<Arc<Vec<u8>>>>>;

#[derive(Debug)]
struct Entry {
    slot: Slot,
    bytes: u64,
    last_used: u64,
}

#[derive(Debug, Default)]
struct LruState {
    entries: HashMap<u64, Entry>,
    total_bytes: u64,
    clock: u64,
}

/// A `ByteSource` that reads its inner source in fixed-size blocks and keeps recently used blocks in memory.
///
/// Concurrent requests for the same block wait for a single fetch.
/// Every `ByteRange` derived from one `CachedSource` shares its capacity.
#[derive(Debug)]
pub struct CachedSource<S> {
    inner: S,
    options: CacheOptions,
    state: Mutex<LruState>,
}
impl<S: ByteSource> CachedSource<S> {
    /// Makes a new `CachedSource` with the default options.
    pub fn new(inner: S) -> Self {
        CachedSource {
            inner,
            options: CacheOptions::default(),
            state: Mutex::new(LruState::default()),
        }
    }

    /// Makes a new `CachedSource` with the given options.
    ///
    /// `options.block_size` must be positive.
    pub fn with_options(inner: S, options: CacheOptions) -> Result<Self> {
        track_assert_ne!(options.block_size, 0, ErrorKind::InvalidInput);
        Ok(CachedSource {
            inner,
            options,
            state: Mutex::new(LruState::default()),
        })
    }

    /// Returns a reference to the inner source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the number of bytes currently cached.
    pub fn cached_bytes(&self) -> u64 {
        self.state.lock().total_bytes
    }

    /// Returns the block at `index`, fetching it from the inner source if it is not cached.
    pub fn fetch(&self, index: u64) -> Result<Arc<Vec<u8>>> {
        let slot = {
            let mut state = self.state.lock();
            state.clock += 1;
            let now = state.clock;
            let entry = state.entries.entry(index).or_insert_with(|| Entry {
                slot: Slot::default(),
                bytes: 0,
                last_used: now,
            });
            entry.last_used = now;
            Arc::clone(&entry.slot)
        };

        let mut block = slot.lock();
        if let Some(ref data) = *block {
            return Ok(Arc::clone(data));
        }

        let start = index * self.options.block_size;
        let end = (start + self.options.block_size).min(self.inner.len());
        track_assert!(start < end, ErrorKind::InvalidInput, "No such block: {}", index);
        tracing::debug!("Fetching cache block {} ({}..{})", index, start, end);
        let data = Arc::new(track!(self.inner.read_range(start, end))?);
        *block = Some(Arc::clone(&data));
        drop(block);

        self.account(index, data.len() as u64);
        Ok(data)
    }

    fn account(&self, index: u64, bytes: u64) {
        let mut state = self.state.lock();
        match state.entries.get_mut(&index) {
            Some(entry) => entry.bytes = bytes,
            None => return,
        }
        state.total_bytes += bytes;

        while state.total_bytes > self.options.max_bytes {
            let victim = state
                .entries
                .iter()
                .filter(|&(&i, e)| i != index && e.bytes > 0)
                .min_by_key(|&(_, e)| e.last_used)
                .map(|(&i, _)| i);
            let Some(victim) = victim else { break };
            if let Some(entry) = state.entries.remove(&victim) {
                tracing::debug!("Evicting cache block {}", victim);
                state.total_bytes -= entry.bytes;
            }
        }
    }
}
impl<S: ByteSource> ByteSource for CachedSource<S> {
    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        track_assert!(start <= end && end <= self.len(), ErrorKind::InvalidInput);
        let mut buf = Vec::with_capacity((end - start) as usize);
        let block_size = self.options.block_size;
        let mut position = start;
        while position < end {
            let index = position / block_size;
            let block = track!(self.fetch(index))?;
            let block_start = index * block_size;
            let from = (position - block_start) as usize;
            let to = ((end - block_start) as usize).min(block.len());
            buf.extend_from_slice(&block[from..to]);
            position = block_start + to as u64;
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use rand::Rng;

    use super::*;
    use crate::source::ByteRange;

    #[derive(Debug)]
    struct CountingSource {
        data: Vec<u8>,
        reads: AtomicUsize,
    }
    impl ByteSource for CountingSource {
        fn len(&self) -> u64 {
            self.data.len() as u64
        }
        fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            thread::yield_now();
            Ok(self.data[start as usize..end as usize].to_vec())
        }
    }

    fn counting_source(len: usize) -> CountingSource {
        let mut rng = rand::thread_rng();
        CountingSource {
            data: (0..len).map(|_| rng.gen()).collect(),
            reads: AtomicUsize::new(0),
        }
    }

    #[test]
    fn nested_slices_read_the_same_bytes() {
        let source = counting_source(64 * 1024);
        let expected = source.data.clone();
        let options = CacheOptions {
            block_size: 1024,
            max_bytes: 8 * 1024,
        };
        let root = ByteRange::new(track_try_unwrap!(CachedSource::with_options(source, options)));

        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let mut range = root.clone();
            let mut window = 0..expected.len();
            for _ in 0..100 {
                let len = window.len() as u64;
                let a = rng.gen_range(0..=len);
                let b = rng.gen_range(a..=len);
                range = track_try_unwrap!(range.slice(a, b));
                window = window.start + a as usize..window.start + b as usize;
                if rng.gen_bool(0.1) {
                    assert_eq!(track_try_unwrap!(range.read()), &expected[window.clone()]);
                }
            }
            assert_eq!(track_try_unwrap!(range.read()), &expected[window]);
        }
    }

    #[test]
    fn eviction_keeps_the_budget() {
        let options = CacheOptions {
            block_size: 100,
            max_bytes: 300,
        };
        let cache = track_try_unwrap!(CachedSource::with_options(counting_source(1000), options));
        for i in 0..10 {
            track_try_unwrap!(cache.fetch(i));
            assert!(cache.cached_bytes() <= 300);
        }
        assert_eq!(cache.inner().reads.load(Ordering::SeqCst), 10);

        // the most recent blocks are still cached
        track_try_unwrap!(cache.fetch(9));
        track_try_unwrap!(cache.fetch(8));
        assert_eq!(cache.inner().reads.load(Ordering::SeqCst), 10);

        // the oldest one was evicted
        track_try_unwrap!(cache.fetch(0));
        assert_eq!(cache.inner().reads.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn at_most_one_fetch_per_block() {
        let cache = track_try_unwrap!(CachedSource::with_options(
            counting_source(4096),
            CacheOptions {
                block_size: 1024,
                max_bytes: 1024 * 1024,
            },
        ));
        let barrier = Barrier::new(8);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    for i in 0..4 {
                        track_try_unwrap!(cache.fetch(i));
                    }
                });
            }
        });
        assert_eq!(cache.inner().reads.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn reads_spanning_blocks() {
        let source = counting_source(250);
        let expected = source.data.clone();
        let cache = track_try_unwrap!(CachedSource::with_options(
            source,
            CacheOptions {
                block_size: 100,
                max_bytes: 1000,
            },
        ));
        assert_eq!(track_try_unwrap!(cache.read_range(95, 205)), &expected[95..205]);
        assert_eq!(track_try_unwrap!(cache.read_range(200, 250)), &expected[200..]);
        assert!(track_try_unwrap!(cache.read_range(42, 42)).is_empty());
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let options = CacheOptions {
            block_size: 0,
            max_bytes: 1024,
        };
        let e = CachedSource::with_options(counting_source(10), options).err();
        assert_eq!(e.map(|e| *e.kind()), Some(ErrorKind::InvalidInput));
    }
}
