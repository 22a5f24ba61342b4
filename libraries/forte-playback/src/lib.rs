//! Forte Player - Play Queue Management
//!
//! Platform-agnostic play-queue engine for Forte Player.
//!
//! This crate provides:
//! - The play queue itself (ordered contents, current index, manual enqueue)
//! - Shuffle with an invertible index mapping (the original order is always
//!   recoverable, and the playing song is pinned to the top when shuffling)
//! - Repeat modes (off, all, one) with the standard end-of-queue policy
//! - Volume control (0-100, forwarded to the device as a fraction)
//! - Persisted preferences (shuffle, repeat, volume) rehydrated at startup
//! - Typed change-notification channels for every observable aspect
//! - Position polling while playing, with an explicit timer lifecycle
//!
//! # Architecture
//!
//! `forte-playback` is completely platform-agnostic: it has no audio output,
//! storage, or UI dependency. The host supplies three collaborators as
//! traits:
//!
//! - [`AudioDevice`]: the playback backend (native output, web audio, a
//!   cast target). The engine issues transport commands and reads the
//!   device clock; end-of-track is reported back by the host through
//!   [`PlaybackManager::handle_track_ended`].
//! - [`SongGateway`]: the song store. Resolves song references to transient
//!   playable URLs (which may fail for songs with missing content) and
//!   records play events.
//! - [`SettingsStore`]: durable key/value storage for the three persisted
//!   preferences.
//!
//! The engine is single-owner and event-loop driven: all methods take
//! `&mut self`, and observers learn about changes exclusively through the
//! subscription channels. Failures never crash playback - a song without a
//! stream or a device that rejects a load produces a transient notice on
//! the error channel and a well-defined engine state.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use forte_playback::{
//!     AudioDevice, DeviceSource, MemorySettings, PlaybackManager, QueueSource, Result,
//!     SetQueueOptions, Song, SongGateway,
//! };
//!
//! struct NullDevice;
//!
//! #[async_trait]
//! impl AudioDevice for NullDevice {
//!     fn play(&self) {}
//!     fn pause(&self) {}
//!     async fn load(&self, _source: Option<DeviceSource>) -> Result<()> {
//!         Ok(())
//!     }
//!     async fn current_time(&self) -> Result<f64> {
//!         Ok(0.0)
//!     }
//!     fn set_current_time(&self, _seconds: f64) {}
//!     fn set_volume(&self, _fraction: f32) {}
//! }
//!
//! struct StaticGateway;
//!
//! #[async_trait]
//! impl SongGateway for StaticGateway {
//!     async fn stream_url(&self, song: &Song) -> Result<String> {
//!         Ok(format!("https://media.example/{}.mp3", song.id))
//!     }
//!     async fn artwork_url(&self, song: &Song) -> Result<String> {
//!         Ok(format!("https://media.example/{}.jpg", song.id))
//!     }
//!     async fn record_played(&self, _song: &Song) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut manager = PlaybackManager::new(
//!         Arc::new(NullDevice),
//!         Arc::new(StaticGateway),
//!         Arc::new(MemorySettings::new()),
//!     );
//!
//!     // React to track changes
//!     let _subscription = manager.on_now_playing_change(|playing| {
//!         if let Some(playing) = playing {
//!             println!("now playing: {}", playing.item.song.title);
//!         }
//!     });
//!
//!     // Play an album starting from its second song
//!     let songs = vec![
//!         Song {
//!             id: "s1".to_string(),
//!             title: "First".to_string(),
//!             artist: None,
//!             album: None,
//!             duration: Duration::from_secs(200),
//!         },
//!         Song {
//!             id: "s2".to_string(),
//!             title: "Second".to_string(),
//!             artist: None,
//!             album: None,
//!             duration: Duration::from_secs(180),
//!         },
//!     ];
//!     manager
//!         .set_queue(SetQueueOptions {
//!             songs,
//!             source: QueueSource::Album {
//!                 id: "a1".to_string(),
//!                 name: "An Album".to_string(),
//!             },
//!             index: Some(1),
//!         })
//!         .await;
//!
//!     manager.next().await;
//!     manager.toggle_repeat();
//! }
//! ```

mod device;
mod error;
mod events;
mod manager;
mod settings;
mod shuffle;
mod store;
pub mod types;

// Public exports
pub use device::{AudioDevice, DeviceSource};
pub use error::{PlaybackError, Result};
pub use events::{Channel, Subscription};
pub use manager::PlaybackManager;
pub use settings::{JsonFileSettings, MemorySettings, SettingsStore};
pub use shuffle::{remove_from_shuffled, shuffle, shuffle_with, ShuffleMapping};
pub use store::{OptimisticPatch, SongGateway};
pub use types::{
    GeneratedView, NowPlaying, PlaybackState, PlayerOptions, QueueItem, QueueSource, RepeatMode,
    SetQueueOptions, Song,
};
