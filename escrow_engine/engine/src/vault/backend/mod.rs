mod file;
mod memory;

use async_trait::async_trait;

use crate::error::EscrowResult;
use crate::vault::ShareRecords;

pub use file::FileShareStore;
pub use memory::MemoryShareStore;

/// Where a key-holder's records live between restarts.
///
/// `persist` replaces the stored set wholesale; a failed `persist` must leave
/// the previously stored set readable.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Load the stored set, or an empty set if nothing was ever persisted.
    async fn load(&self) -> EscrowResult<ShareRecords>;

    async fn persist(&self, records: &ShareRecords) -> EscrowResult<()>;
}
