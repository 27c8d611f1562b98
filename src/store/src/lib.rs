// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

pub mod factory;
pub mod memory;
pub mod naming;
pub mod store_trait;
pub mod transform;
pub mod types;

pub use factory::StoreFactory;
pub use memory::{MemoryStore, MemoryStoreFactory};
pub use naming::{dataset_name, tag_from_dataset_name};
pub use store_trait::Store;
pub use transform::Transform;
pub use types::{
    AttributeValue, ElementType, EventCatalog, Stream, StationXml, Trace, WriteIntent,
};
