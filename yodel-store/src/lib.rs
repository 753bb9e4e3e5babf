pub mod backends;
pub mod directory;
pub mod error;
pub mod headers;
pub mod r#trait;

pub use backends::{CachedYoStore, MemoryYoStore};
pub use directory::{LoggingNotifier, MemoryDirectory, PassthroughShortener};
pub use error::{Result, StoreError};
pub use headers::MemoryHeaders;
pub use r#trait::YoStore;
