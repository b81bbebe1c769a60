use derive_new::new;
use serde::{de::DeserializeOwned, Serialize};

use crate::db::{DbError, DB};

type Result<T> = std::result::Result<T, DbError>;

/// DB handle for storing data tied to a specific type/entity.
///
/// Key structure: `<entity>_<additional_prefix(es)>_<key>`. Entities MUST NOT share a
/// prefix with any other entity opened against the same underlying [`DB`] — doing so
/// would let one entity's keys shadow another's.
#[derive(Debug, Clone, new)]
pub struct TypedDB {
    entity: String,
    db: DB,
}

impl AsRef<DB> for TypedDB {
    fn as_ref(&self) -> &DB {
        &self.db
    }
}

impl TypedDB {
    fn full_prefix(&self, prefix: impl AsRef<[u8]>) -> Vec<u8> {
        let mut full_prefix = vec![];
        full_prefix.extend(self.entity.as_bytes());
        full_prefix.extend(b"_");
        full_prefix.extend(prefix.as_ref());
        full_prefix
    }

    fn full_key(&self, prefix: impl AsRef<[u8]>, key: impl AsRef<[u8]>) -> Vec<u8> {
        let mut full_key = self.full_prefix(prefix);
        full_key.extend(key.as_ref());
        full_key
    }

    /// Store a serializable value under `prefix`/`key`.
    pub fn store_encodable<V: Serialize>(
        &self,
        prefix: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
        value: &V,
    ) -> Result<()> {
        let encoded = serde_json::to_vec(value)?;
        self.db.store(&self.full_key(prefix, key), &encoded)
    }

    /// Retrieve a deserializable value stored under `prefix`/`key`.
    pub fn retrieve_decodable<V: DeserializeOwned>(
        &self,
        prefix: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
    ) -> Result<Option<V>> {
        match self.db.retrieve(&self.full_key(prefix, key))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete whatever is stored under `prefix`/`key`. A no-op if absent.
    pub fn delete(&self, prefix: impl AsRef<[u8]>, key: impl AsRef<[u8]>) -> Result<()> {
        self.db.delete(&self.full_key(prefix, key))
    }

    /// Delete the value stored under `prefix` for a serializable key.
    pub fn delete_keyed<K: Serialize>(&self, prefix: impl AsRef<[u8]>, key: &K) -> Result<()> {
        let key_bytes = serde_json::to_vec(key)?;
        self.delete(prefix, key_bytes)
    }

    /// Store a serializable value keyed by a serializable key.
    pub fn store_keyed_encodable<K: Serialize, V: Serialize>(
        &self,
        prefix: impl AsRef<[u8]>,
        key: &K,
        value: &V,
    ) -> Result<()> {
        let key_bytes = serde_json::to_vec(key)?;
        self.store_encodable(prefix, key_bytes, value)
    }

    /// Retrieve a deserializable value given a serializable key.
    pub fn retrieve_keyed_decodable<K: Serialize, V: DeserializeOwned>(
        &self,
        prefix: impl AsRef<[u8]>,
        key: &K,
    ) -> Result<Option<V>> {
        let key_bytes = serde_json::to_vec(key)?;
        self.retrieve_decodable(prefix, key_bytes)
    }

    /// Iterate over all stored values for `prefix` whose encoded value decodes cleanly,
    /// skipping (and logging) entries that fail to decode.
    pub fn prefix_iterator<V: DeserializeOwned>(
        &self,
        prefix: impl AsRef<[u8]>,
    ) -> impl Iterator<Item = V> + '_ {
        let full_prefix = self.full_prefix(prefix);
        self.db
            .prefix_iterator(&full_prefix)
            .filter_map(|item| item.ok())
            .take_while(move |(k, _)| k.starts_with(full_prefix.as_slice()))
            .filter_map(|(_, v)| match serde_json::from_slice::<V>(&v) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!(%err, "skipping value that failed to decode");
                    None
                }
            })
    }
}
