//! Stream resolver cache
//!
//! Snapshots the streams discovery currently sees, keyed by uid, with
//! the source used to open inlets. A resolve replaces the entire cache;
//! there is no incremental merge, and concurrent resolves race with
//! last-writer-wins. Descriptors and sources handed out before a later
//! resolve may therefore describe streams that are no longer reachable;
//! liveness is only checked when an inlet is actually opened.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::source::{Discovery, InletSource, SourceError, StreamDescriptor};

struct CachedStream {
    descriptor: Arc<StreamDescriptor>,
    source: Arc<dyn InletSource>,
}

/// Caches resolved streams for quick lookup
pub struct StreamResolver {
    discovery: Arc<dyn Discovery>,
    cache: RwLock<HashMap<String, CachedStream>>,
}

impl StreamResolver {
    /// Create a resolver over the given discovery backend
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self {
            discovery,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Query discovery for up to `timeout` and replace the cache with the result
    pub async fn resolve(
        &self,
        timeout: Duration,
    ) -> Result<Vec<Arc<StreamDescriptor>>, SourceError> {
        tracing::info!(timeout_ms = timeout.as_millis() as u64, "Resolving streams");
        let found = self.discovery.resolve(timeout).await?;
        tracing::info!(count = found.len(), "Resolve complete");

        let mut fresh = HashMap::with_capacity(found.len());
        let mut descriptors = Vec::with_capacity(found.len());
        for stream in found {
            let descriptor = Arc::new(stream.descriptor);
            descriptors.push(Arc::clone(&descriptor));
            fresh.insert(
                descriptor.uid.clone(),
                CachedStream {
                    descriptor,
                    source: stream.source,
                },
            );
        }

        *self.cache.write().unwrap() = fresh;
        Ok(descriptors)
    }

    /// Descriptor for a uid in the current cache generation
    pub fn descriptor(&self, uid: &str) -> Option<Arc<StreamDescriptor>> {
        let cache = self.cache.read().unwrap();
        cache.get(uid).map(|s| Arc::clone(&s.descriptor))
    }

    /// Inlet source for a uid in the current cache generation
    pub fn source(&self, uid: &str) -> Option<Arc<dyn InletSource>> {
        let cache = self.cache.read().unwrap();
        cache.get(uid).map(|s| Arc::clone(&s.source))
    }

    /// Descriptor and source together, for subscribe paths
    pub fn lookup(&self, uid: &str) -> Option<(Arc<StreamDescriptor>, Arc<dyn InletSource>)> {
        let cache = self.cache.read().unwrap();
        cache
            .get(uid)
            .map(|s| (Arc::clone(&s.descriptor), Arc::clone(&s.source)))
    }

    /// All descriptors in the current cache generation
    pub fn descriptors(&self) -> Vec<Arc<StreamDescriptor>> {
        let cache = self.cache.read().unwrap();
        cache.values().map(|s| Arc::clone(&s.descriptor)).collect()
    }
}
