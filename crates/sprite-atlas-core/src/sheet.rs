use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use image::RgbaImage;
use tracing::debug;

use crate::error::{AtlasError, Result};
use crate::model::SheetLoader;

fn lock_unpoisoned<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Counting permit pool capping simultaneous in-flight sheet decodes.
///
/// Workers hold a [`LoadPermit`] for the duration of one load+trim; the guard
/// releases on every exit path, including unwinding.
pub(crate) struct LoadPermits {
    available: Mutex<usize>,
    cv: Condvar,
}

impl LoadPermits {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            available: Mutex::new(count.max(1)),
            cv: Condvar::new(),
        }
    }

    pub(crate) fn acquire(&self) -> LoadPermit<'_> {
        let mut available = lock_unpoisoned(&self.available);
        while *available == 0 {
            available = self
                .cv
                .wait(available)
                .unwrap_or_else(|e| e.into_inner());
        }
        *available -= 1;
        LoadPermit { pool: self }
    }
}

pub(crate) struct LoadPermit<'a> {
    pool: &'a LoadPermits,
}

impl Drop for LoadPermit<'_> {
    fn drop(&mut self) {
        let mut available = lock_unpoisoned(&self.pool.available);
        *available += 1;
        self.pool.cv.notify_one();
    }
}

/// Memoized sheet decoder over a bounded [`moka::sync::Cache`].
///
/// Concurrent `get`s of the same path decode once (`try_get_with` coalesces
/// per-key initializers); different paths decode concurrently. Evicting an
/// entry drops its `Arc`, releasing the pixel buffer once no worker still
/// holds it. Decode failures are not retained, so a later `get` retries.
pub(crate) struct SheetCache {
    loaders: HashMap<String, Arc<dyn SheetLoader>>,
    images: moka::sync::Cache<String, Arc<RgbaImage>>,
}

impl SheetCache {
    pub(crate) fn new(loaders: HashMap<String, Arc<dyn SheetLoader>>, capacity: usize) -> Self {
        let images = moka::sync::CacheBuilder::new(capacity.max(1) as u64)
            .eviction_listener(|path: Arc<String>, _image, _cause| debug!("evicted sheet {path}"))
            .build();
        Self { loaders, images }
    }

    pub(crate) fn get(&self, path: &str) -> Result<Arc<RgbaImage>> {
        self.images
            .try_get_with_by_ref(path, || match self.loaders.get(path) {
                Some(loader) => loader.load(path).map(Arc::new).map_err(|e| e.to_string()),
                None => Err("no loader registered".to_string()),
            })
            .map_err(|message: Arc<String>| AtlasError::SheetDecode {
                path: path.to_string(),
                message: message.as_ref().clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        calls: AtomicUsize,
    }

    impl SheetLoader for CountingLoader {
        fn load(&self, _path: &str) -> Result<RgbaImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])))
        }
    }

    struct FailingLoader;

    impl SheetLoader for FailingLoader {
        fn load(&self, path: &str) -> Result<RgbaImage> {
            Err(AtlasError::SheetDecode {
                path: path.into(),
                message: "garbled".into(),
            })
        }
    }

    fn cache_with(loader: Arc<dyn SheetLoader>, paths: &[&str], capacity: usize) -> SheetCache {
        let loaders = paths
            .iter()
            .map(|p| (p.to_string(), Arc::clone(&loader)))
            .collect();
        SheetCache::new(loaders, capacity)
    }

    #[test]
    fn repeated_gets_decode_once() {
        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
        });
        let cache = cache_with(loader.clone(), &["s1"], 8);
        for _ in 0..5 {
            cache.get("s1").unwrap();
        }
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn decode_failure_surfaces_as_error() {
        let cache = cache_with(Arc::new(FailingLoader), &["bad"], 8);
        let err = cache.get("bad").unwrap_err();
        assert!(matches!(err, AtlasError::SheetDecode { .. }));
    }

    #[test]
    fn eviction_keeps_cache_bounded() {
        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
        });
        let cache = cache_with(loader.clone(), &["a", "b", "c"], 1);
        cache.get("a").unwrap();
        cache.get("b").unwrap();
        cache.get("c").unwrap();
        cache.images.run_pending_tasks();
        assert!(cache.images.entry_count() <= 1);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 3);
    }
}
