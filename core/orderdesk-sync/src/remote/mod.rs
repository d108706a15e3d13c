//! Remote store implementations.
//!
//! The hosted real-time tree is reached over REST in production; tests and
//! local development use the in-memory store.

pub mod http;
pub mod memory;
pub mod store;

pub use http::{HttpRemoteStore, HttpStoreConfig};
pub use memory::MemoryStore;
pub use store::{OrdersWatch, RemoteStore};
