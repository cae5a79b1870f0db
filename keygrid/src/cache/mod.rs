pub mod entry;
pub mod invalidation;
pub mod policy;
pub mod with_cache;

pub use entry::{CacheEntry, CacheValue};
pub use invalidation::{InvalidationCoordinator, InvalidationMessage, NoopBroadcaster, PropagationPolicy};
pub use policy::CachePolicy;
pub use with_cache::CacheAside;
