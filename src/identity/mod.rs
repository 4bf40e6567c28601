//! Unit-of-work identity: keys, hydrated instances and the registry that
//! guarantees one live instance per key.

mod instance;
mod keys;
mod registry;

pub use instance::{
    AttributeValue, CollectionHandle, EntityHandle, EntityInstance, ExecutionId, InstanceData,
    InstanceState, PersistentCollection, MAX_LIST_INDEX,
};
pub use keys::{CollectionKey, EntityKey};
pub use registry::IdentityRegistry;
