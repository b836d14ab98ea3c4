//! Typed values over byte stores
//!
//! Any store that can hold raw bytes under a string key gets typed
//! `set_session` / `get_session` through [`SessionExt`]. Values are encoded
//! as UTF-8 JSON text.

use crate::cache::MemoryCache;
use crate::error::{SessionError, SessionResult};
use serde::{de::DeserializeOwned, Serialize};

/// Raw byte storage keyed by string
pub trait ByteStore {
    /// Bytes stored under `key`, or `None` when absent
    fn try_get(&self, key: &str) -> SessionResult<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: Vec<u8>) -> SessionResult<()>;

    fn remove(&self, key: &str) -> SessionResult<()>;
}

/// Typed access to a [`ByteStore`]
pub trait SessionExt {
    /// Serialize `value` as JSON and store it under `key`.
    ///
    /// `None` and `()` are stored as `null`.
    fn set_session<T>(&self, key: &str, value: &T) -> SessionResult<()>
    where
        T: Serialize + ?Sized;

    /// Read the value under `key` as `T`.
    ///
    /// Returns `Ok(None)` when nothing was stored. A stored value that is not
    /// valid JSON for `T` is a [`SessionError::Deserialization`]; a stored
    /// `null` only reads back successfully as an `Option`.
    fn get_session<T>(&self, key: &str) -> SessionResult<Option<T>>
    where
        T: DeserializeOwned;

    fn remove_session(&self, key: &str) -> SessionResult<()>;
}

impl<S> SessionExt for S
where
    S: ByteStore + ?Sized,
{
    fn set_session<T>(&self, key: &str, value: &T) -> SessionResult<()>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_string(value).map_err(|source| SessionError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.set(key, json.into_bytes())
    }

    fn get_session<T>(&self, key: &str) -> SessionResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let Some(bytes) = self.try_get(key)? else {
            return Ok(None);
        };

        let text = String::from_utf8(bytes).map_err(|e| SessionError::Deserialization {
            key: key.to_string(),
            source: Box::new(e),
        })?;

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| SessionError::Deserialization {
                key: key.to_string(),
                source: Box::new(e),
            })
    }

    fn remove_session(&self, key: &str) -> SessionResult<()> {
        self.remove(key)
    }
}

impl ByteStore for MemoryCache<String, Vec<u8>> {
    fn try_get(&self, key: &str) -> SessionResult<Option<Vec<u8>>> {
        Ok(self.get(&key.to_string())?)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> SessionResult<()> {
        Ok(MemoryCache::set(self, key.to_string(), value)?)
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        MemoryCache::remove(self, &key.to_string())?;
        Ok(())
    }
}
