// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::store_trait::Store;
use common::Result;
use config::CompressionPolicy;
use std::path::Path;
use std::sync::Arc;

/// Opens and creates container-file handles. The bit-exact on-disk layout
/// of the container is out of scope for this crate; a real deployment
/// plugs in a factory backed by the actual file format, while
/// `store::memory::MemoryStoreFactory` stands in for it in tests and in
/// any embedder happy with an in-memory store.
pub trait StoreFactory: Send + Sync {
    /// Whether a store already exists at `path`. The Processing API uses
    /// this for its "output path must not already exist" guard.
    fn exists(&self, path: &Path) -> bool;

    /// Creates a brand-new, empty store at `path`. `bus_attached` is
    /// forwarded to `Store::open` so compression/checksums can be disabled
    /// automatically when a message bus is in play.
    fn create(
        &self,
        path: &Path,
        compression: CompressionPolicy,
        bus_attached: bool,
    ) -> Result<Arc<dyn Store>>;
}
