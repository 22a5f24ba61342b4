//! Common test doubles and fixtures for the playback engine
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use forte_playback::{
    AudioDevice, DeviceSource, MemorySettings, OptimisticPatch, PlaybackError, PlaybackManager,
    QueueSource, Result, SetQueueOptions, SettingsStore, Song, SongGateway,
};

/// Transport commands observed by the fake device, in order
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    Play,
    Pause,
    /// Load with the song id, or `None` for teardown
    Load(Option<String>),
    Seek(f64),
    Volume(f32),
}

/// Scriptable in-memory audio device
#[derive(Default)]
pub struct FakeDevice {
    commands: Mutex<Vec<DeviceCommand>>,
    loaded: Mutex<Option<DeviceSource>>,
    clock: Mutex<f64>,
    pub fail_loads: AtomicBool,
    pub fail_clock: AtomicBool,
}

impl FakeDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pretend the device has played up to `seconds`
    pub fn set_clock(&self, seconds: f64) {
        *self.clock.lock().unwrap() = seconds;
    }

    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn loaded_song_id(&self) -> Option<String> {
        self.loaded
            .lock()
            .unwrap()
            .as_ref()
            .map(|source| source.song.id.clone())
    }

    /// How many times a given song id was loaded
    pub fn load_count(&self, id: &str) -> usize {
        self.commands()
            .iter()
            .filter(|command| matches!(command, DeviceCommand::Load(Some(loaded)) if loaded == id))
            .count()
    }
}

#[async_trait]
impl AudioDevice for FakeDevice {
    fn play(&self) {
        self.commands.lock().unwrap().push(DeviceCommand::Play);
    }

    fn pause(&self) {
        self.commands.lock().unwrap().push(DeviceCommand::Pause);
    }

    async fn load(&self, source: Option<DeviceSource>) -> Result<()> {
        let id = source.as_ref().map(|source| source.song.id.clone());
        self.commands.lock().unwrap().push(DeviceCommand::Load(id));

        if source.is_some() && self.fail_loads.load(Ordering::SeqCst) {
            return Err(PlaybackError::Device("codec refused the source".to_string()));
        }

        *self.loaded.lock().unwrap() = source;
        *self.clock.lock().unwrap() = 0.0;
        Ok(())
    }

    async fn current_time(&self) -> Result<f64> {
        if self.fail_clock.load(Ordering::SeqCst) {
            return Err(PlaybackError::Device("clock unavailable".to_string()));
        }
        Ok(*self.clock.lock().unwrap())
    }

    fn set_current_time(&self, seconds: f64) {
        self.commands.lock().unwrap().push(DeviceCommand::Seek(seconds));
        *self.clock.lock().unwrap() = seconds;
    }

    fn set_volume(&self, fraction: f32) {
        self.commands
            .lock()
            .unwrap()
            .push(DeviceCommand::Volume(fraction));
    }
}

/// Local play statistics kept by the fake gateway
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayStats {
    pub played: u32,
}

/// In-memory song gateway
///
/// Songs marked unavailable fail URL resolution; play recording patches the
/// local stats optimistically and rolls back when the remote write is
/// rejected.
#[derive(Default)]
pub struct FakeGateway {
    stats: Mutex<HashMap<String, PlayStats>>,
    unavailable: Mutex<HashSet<String>>,
    pub reject_plays: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mark_unavailable(&self, id: &str) {
        self.unavailable.lock().unwrap().insert(id.to_string());
    }

    pub fn play_count(&self, id: &str) -> u32 {
        self.stats
            .lock()
            .unwrap()
            .get(id)
            .map_or(0, |stats| stats.played)
    }
}

#[async_trait]
impl SongGateway for FakeGateway {
    async fn stream_url(&self, song: &Song) -> Result<String> {
        if self.unavailable.lock().unwrap().contains(&song.id) {
            return Err(PlaybackError::SongUnavailable {
                title: song.title.clone(),
            });
        }
        Ok(format!("https://media.test/{}.mp3", song.id))
    }

    async fn artwork_url(&self, song: &Song) -> Result<String> {
        Ok(format!("https://media.test/{}.jpg", song.id))
    }

    async fn record_played(&self, song: &Song) -> Result<()> {
        let mut stats = self.stats.lock().unwrap();
        let entry = stats.entry(song.id.clone()).or_default();

        let patch = OptimisticPatch::apply(entry, |stats| stats.played += 1);
        if self.reject_plays.load(Ordering::SeqCst) {
            patch.undo(entry);
            return Err(PlaybackError::Gateway("write rejected".to_string()));
        }
        Ok(())
    }
}

/// An engine wired to fakes, plus handles to inspect them
pub struct Rig {
    pub manager: PlaybackManager,
    pub device: Arc<FakeDevice>,
    pub gateway: Arc<FakeGateway>,
    pub settings: Arc<MemorySettings>,
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}

impl Rig {
    pub fn new() -> Self {
        Self::with_settings(Arc::new(MemorySettings::new()))
    }

    /// Build a rig on top of pre-seeded settings (for rehydration tests)
    pub fn with_settings(settings: Arc<MemorySettings>) -> Self {
        init_tracing();
        let device = FakeDevice::new();
        let gateway = FakeGateway::new();
        let manager = PlaybackManager::new(
            Arc::clone(&device) as Arc<dyn AudioDevice>,
            Arc::clone(&gateway) as Arc<dyn SongGateway>,
            Arc::clone(&settings) as Arc<dyn SettingsStore>,
        );
        Self {
            manager,
            device,
            gateway,
            settings,
        }
    }

    /// Load `songs` as an album queue and start at `index`
    pub async fn play_album(&mut self, ids: &[&str], index: usize) {
        self.manager
            .set_queue(SetQueueOptions {
                songs: songs(ids),
                source: album_source(),
                index: Some(index),
            })
            .await;
    }
}

pub fn song(id: &str) -> Song {
    Song {
        id: id.to_string(),
        title: format!("Song {id}"),
        artist: Some("Test Artist".to_string()),
        album: Some("Test Album".to_string()),
        duration: Duration::from_secs(180),
    }
}

pub fn songs(ids: &[&str]) -> Vec<Song> {
    ids.iter().copied().map(song).collect()
}

pub fn album_source() -> QueueSource {
    QueueSource::Album {
        id: "album-1".to_string(),
        name: "Test Album".to_string(),
    }
}

/// Give detached tasks (play logging) a chance to run
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
