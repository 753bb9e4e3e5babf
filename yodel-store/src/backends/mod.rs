mod cached;
mod memory;

pub use cached::CachedYoStore;
pub use memory::MemoryYoStore;
