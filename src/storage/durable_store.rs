#[cfg(test)]
use mockall::automock;

use crate::StorageError;

/// Keyed record store surviving reboots.
///
/// Calls are blocking and bounded by the underlying device.
#[cfg_attr(test, automock)]
pub trait DurableStore: Send + Sync + 'static {
    /// Returns the live record for `key`, `None` when it was never written.
    fn read(
        &self,
        key: u16,
    ) -> std::result::Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`.
    ///
    /// Returns the number of bytes written; `0` means the identical value was
    /// already stored and nothing was written.
    fn write(
        &self,
        key: u16,
        value: &[u8],
    ) -> std::result::Result<usize, StorageError>;
}
