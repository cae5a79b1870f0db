mod sled_origin;

pub use sled_origin::SledOriginStore;
