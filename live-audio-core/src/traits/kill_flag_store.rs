use crate::models::error::FlagStoreError;
use crate::models::kill_record::KillRecord;

/// Durable "was killed" flag shared between a background service and the host.
///
/// The service raises the flag when it detects that a recording ended
/// without an explicit stop; the host reads it on the next launch.
/// `consume` must be atomic with respect to the store itself: no `peek`
/// may observe a value that a concurrent `consume` is about to clear.
pub trait KillFlagStore: Send + Sync {
    /// Raise the flag, replacing any previous record.
    fn set(&self, record: KillRecord) -> Result<(), FlagStoreError>;

    /// Read the flag without clearing it.
    fn peek(&self) -> Result<bool, FlagStoreError>;

    /// Reset the flag to false.
    fn clear(&self) -> Result<(), FlagStoreError>;

    /// Read and clear the flag in one step. Returns false if never set.
    fn consume(&self) -> Result<bool, FlagStoreError>;
}
