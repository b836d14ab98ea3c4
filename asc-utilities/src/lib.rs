//! ASC Utilities
//!
//! Typed access to byte-oriented session and cache stores. Values are written
//! as UTF-8 JSON text and read back by declared type.

pub mod cache;
pub mod error;
pub mod session;
pub mod store;

pub use cache::{Expiration, MemoryCache};
pub use error::{CacheError, CacheResult, SessionError, SessionResult};
pub use session::{ByteStore, SessionExt};
pub use store::{MemorySessionStore, Session, SessionId, SessionStore};
