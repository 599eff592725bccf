pub mod address;
pub mod cache;
pub mod decode;
pub mod loader;
pub mod source;
pub mod store;

// Re-exports for convenience
pub use address::{TileAddress, TileKey};
pub use cache::{CacheLookup, FetchOutcome, TileCache};
pub use decode::{BytesDecoder, PlaceholderFilter, TileDecoder};
pub use loader::{FetcherConfig, HttpFetcher, TileFetcher};
pub use source::{TemplateSource, TileSource};
pub use store::{DiskStore, DiskUsage, MemoryStore, PersistentStore};

#[cfg(feature = "render")]
pub use decode::RasterDecoder;
