//! Platform-agnostic audio device contract
//!
//! Abstracts the actual playback backend (native output, web audio, a cast
//! target). The engine never touches audio data; it only issues transport
//! commands and reads the device clock.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Song;

/// A source handed to the device for playback
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSource {
    /// Transient playable URL resolved through the gateway
    pub url: String,

    /// The song being loaded, for device-level metadata (media sessions,
    /// lock screens)
    pub song: Song,
}

/// Transport contract the engine drives
///
/// `load` and `current_time` are asynchronous because they cross into
/// platform code that may itself wait on IO; they are the engine's only
/// suspension points besides URL resolution.
///
/// The device is expected to signal natural end-of-track to the host, which
/// forwards it as [`PlaybackManager::handle_track_ended`].
///
/// [`PlaybackManager::handle_track_ended`]: crate::PlaybackManager::handle_track_ended
#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// Resume playback of the loaded source
    fn play(&self);

    /// Pause playback, keeping the loaded source
    fn pause(&self);

    /// Load a new source, or tear down with `None`
    ///
    /// `None` also clears any device-level metadata.
    async fn load(&self, source: Option<DeviceSource>) -> Result<()>;

    /// Current playback position in seconds
    async fn current_time(&self) -> Result<f64>;

    /// Seek to an absolute position in seconds
    ///
    /// Positions past the end of the source are the device's problem to
    /// reject or clip.
    fn set_current_time(&self, seconds: f64);

    /// Set the output volume as a fraction in `0.0..=1.0`
    fn set_volume(&self, fraction: f32);
}
