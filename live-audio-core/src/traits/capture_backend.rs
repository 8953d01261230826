use std::sync::Arc;

use async_trait::async_trait;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::kill_flag_store::KillFlagStore;

/// Native capture engine driven by a [`LiveAudioSession`](crate::LiveAudioSession).
///
/// Implemented by:
/// - `BackgroundRecordingService` (live-audio-service)
/// - test doubles
///
/// `start` and `stop` complete on the backend's own schedule; they must
/// not block the calling thread while waiting.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Register the sink that receives every event this backend emits.
    fn attach(&self, delegate: Arc<dyn CaptureDelegate>);

    /// Store the configuration used by the next `start`.
    fn init(&self, config: &CaptureConfiguration) -> Result<(), CaptureError>;

    /// Begin capture. Resolves with an acknowledgment once audio is flowing.
    async fn start(&self) -> Result<String, CaptureError>;

    /// End capture and release the device. Resolves with an acknowledgment.
    async fn stop(&self) -> Result<String, CaptureError>;

    /// Release any capture begun by a `start` whose future was dropped
    /// before it resolved. Runs synchronously; the default does nothing.
    fn abort(&self) {}

    /// Kill-flag store, for backends that run as a background service.
    fn kill_flag_store(&self) -> Option<Arc<dyn KillFlagStore>> {
        None
    }
}
