use std::path::Path;

use tracing::trace;

use crate::DurableStore;
use crate::StorageError;

/// Sled tree holding one record per persistent channel
const CHANNELS_NAMESPACE: &str = "channels";

/// Durable store backed by an embedded sled database.
pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl std::fmt::Debug for SledStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("tree_len", &self.tree.len())
            .finish()
    }
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> std::result::Result<Self, StorageError> {
        let db = sled::Config::default().path(path.as_ref()).open()?;
        let tree = db.open_tree(CHANNELS_NAMESPACE)?;
        Ok(Self { db, tree })
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn flush(&self) -> std::result::Result<usize, StorageError> {
        Ok(self.db.flush()?)
    }
}

impl DurableStore for SledStore {
    fn read(
        &self,
        key: u16,
    ) -> std::result::Result<Option<Vec<u8>>, StorageError> {
        Ok(self.tree.get(key.to_be_bytes())?.map(|ivec| ivec.to_vec()))
    }

    fn write(
        &self,
        key: u16,
        value: &[u8],
    ) -> std::result::Result<usize, StorageError> {
        let key = key.to_be_bytes();
        if let Some(current) = self.tree.get(key)? {
            if current.as_ref() == value {
                trace!("record {:?} unchanged, skip write", key);
                return Ok(0);
            }
        }

        self.tree.insert(key, value)?;
        self.tree.flush()?;
        Ok(value.len())
    }
}
