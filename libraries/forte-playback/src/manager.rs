//! The play-queue engine
//!
//! Single authoritative owner of "what plays next". Mediates between UI
//! commands and the audio device: queue contents, current index, shuffle
//! mapping, repeat mode, volume, and play/pause state all live here, and
//! every change is pushed to observers through the notification channels.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::device::{AudioDevice, DeviceSource};
use crate::events::{PlayerEvents, Subscription};
use crate::settings::SettingsStore;
use crate::shuffle::{self, ShuffleMapping};
use crate::store::SongGateway;
use crate::types::{
    NowPlaying, PlaybackState, PlayerOptions, QueueItem, QueueSource, RepeatMode, SetQueueOptions,
    Song,
};

const SHUFFLE_KEY: &str = "player-shuffle";
const REPEAT_KEY: &str = "player-repeat";
const VOLUME_KEY: &str = "player-volume";

/// `previous()` restarts the current song instead of stepping back once this
/// many seconds have elapsed
const PREVIOUS_RESTART_THRESHOLD_SECS: f64 = 4.0;

/// Device position cache shared with the poll task
///
/// Seconds stored as `f64` bits so the poller can publish readings without
/// taking a lock on the engine.
#[derive(Clone, Debug, Default)]
struct SharedPosition(Arc<AtomicU64>);

impl SharedPosition {
    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, seconds: f64) {
        self.0.store(seconds.to_bits(), Ordering::Relaxed);
    }
}

/// The play-queue engine
///
/// Constructed once at application start with its collaborators injected,
/// then driven from a single event loop. Methods take `&mut self`; the only
/// background work is the position-poll timer and detached play-logging
/// tasks, neither of which touches engine state directly.
pub struct PlaybackManager {
    device: Arc<dyn AudioDevice>,
    gateway: Arc<dyn SongGateway>,
    settings: Arc<dyn SettingsStore>,
    events: PlayerEvents,
    options: PlayerOptions,

    queue: Vec<QueueItem>,
    mapping: Option<ShuffleMapping>,
    index: Option<usize>,
    now_playing: Option<NowPlaying>,
    state: PlaybackState,
    repeat: RepeatMode,
    shuffle: bool,
    volume: u8,
    position: SharedPosition,

    /// Monotonic token; a song transition that resolves after a newer one
    /// began is discarded instead of clobbering it
    transition: u64,

    poll: Option<JoinHandle<()>>,
}

impl PlaybackManager {
    /// Create the engine, rehydrating persisted preferences
    ///
    /// Stored values are parsed defensively: anything malformed falls back
    /// to the default (shuffle off, repeat off, volume 100).
    pub fn new(
        device: Arc<dyn AudioDevice>,
        gateway: Arc<dyn SongGateway>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self::with_options(device, gateway, settings, PlayerOptions::default())
    }

    /// Create the engine with explicit options
    pub fn with_options(
        device: Arc<dyn AudioDevice>,
        gateway: Arc<dyn SongGateway>,
        settings: Arc<dyn SettingsStore>,
        options: PlayerOptions,
    ) -> Self {
        let shuffle = settings.get(SHUFFLE_KEY).as_deref() == Some("true");
        let repeat = settings
            .get(REPEAT_KEY)
            .and_then(|value| RepeatMode::parse(&value))
            .unwrap_or(RepeatMode::Off);
        let volume = settings
            .get(VOLUME_KEY)
            .and_then(|value| value.parse::<u8>().ok())
            .map_or(100, |value| value.min(100));

        device.set_volume(f32::from(volume) / 100.0);

        Self {
            device,
            gateway,
            settings,
            events: PlayerEvents::default(),
            options,
            queue: Vec::new(),
            mapping: None,
            index: None,
            now_playing: None,
            state: PlaybackState::Paused,
            repeat,
            shuffle,
            volume,
            position: SharedPosition::default(),
            transition: 0,
            poll: None,
        }
    }

    // ===== Queue Replacement =====

    /// Replace the queue and start playing
    ///
    /// When the source is [`QueueSource::Queue`] (re-entering playback from
    /// the queue view) the contents are kept and only the index changes.
    /// Otherwise the queue is rebuilt wholesale, any shuffle mapping is
    /// cleared, and - if shuffle is enabled - the new queue is reshuffled
    /// with the selected song pinned to the top.
    pub async fn set_queue(&mut self, options: SetQueueOptions) {
        let SetQueueOptions {
            songs,
            source,
            index,
        } = options;

        let fresh = !matches!(source, QueueSource::Queue);
        if fresh {
            let items = songs
                .into_iter()
                .enumerate()
                .map(|(position, song)| QueueItem {
                    song,
                    position,
                    source: source.clone(),
                })
                .collect();
            self.replace_items(items);
            self.index = None;
            self.mapping = None;
        }

        // Load before shuffling so the pinned index refers to the order the
        // user clicked in
        let loaded = self.change_song_index(index.unwrap_or(0), true).await;

        if fresh && self.shuffle {
            self.reshuffle();
        }

        if loaded {
            self.device.play();
            self.enter_state(PlaybackState::Playing);
        }
    }

    /// Append a song to the end of the queue as a manual entry
    ///
    /// If a shuffle mapping exists it is extended with an identity entry:
    /// a freshly enqueued song is never reshuffled away from its append
    /// position.
    pub fn enqueue(&mut self, song: Song) {
        let mut items = std::mem::take(&mut self.queue);
        let position = items.len();
        items.push(QueueItem {
            song,
            position,
            source: QueueSource::Manual,
        });

        if let Some(mapping) = &mut self.mapping {
            mapping.push_identity();
        }

        self.replace_items(items);
    }

    /// Remove the item at `at` (a position in the current ordering)
    ///
    /// Removing the slot at the current index force-reloads the same index
    /// value, which now denotes the following item; removing a slot before
    /// it shifts the index down by one.
    pub async fn dequeue(&mut self, at: usize) {
        if at >= self.queue.len() {
            warn!(at, len = self.queue.len(), "dequeue index out of range");
            return;
        }

        match self.mapping.take() {
            Some(mapping) => {
                let (items, mapping) = shuffle::remove_from_shuffled(&self.queue, &mapping, at);
                self.mapping = Some(mapping);
                self.replace_items(items);
            }
            None => {
                let mut items = std::mem::take(&mut self.queue);
                items.remove(at);
                self.replace_items(items);
            }
        }

        match self.index {
            Some(current) if at == current => {
                info!(index = current, "removed the playing song, reloading slot");
                self.try_to_go_to(current as isize, true, true).await;
            }
            Some(current) if at < current => {
                self.index = Some(current - 1);
                self.sync_now_playing();
            }
            _ => {}
        }
    }

    /// Stop playback and empty the queue
    pub async fn clear(&mut self) {
        self.stop_playing().await;
    }

    /// Reset queue, mapping, index, device source, and position
    pub async fn stop_playing(&mut self) {
        // Invalidate any in-flight song transition
        self.transition = self.transition.wrapping_add(1);

        self.enter_state(PlaybackState::Paused);
        self.set_now_playing(None);
        self.set_position(0.0);

        if let Err(err) = self.device.load(None).await {
            debug!(%err, "device teardown failed");
        }

        self.index = None;
        self.mapping = None;
        self.replace_items(Vec::new());
    }

    // ===== Navigation =====

    /// Move to the target index under the repeat/bounds policy
    ///
    /// Without `force`, repeat-one replays the current index instead of
    /// moving. Past either end of the queue, repeat off stops playback
    /// entirely and the other modes wrap around. Playback is restarted on
    /// every non-stop branch.
    pub async fn try_to_go_to(&mut self, target: isize, force: bool, jump: bool) {
        if !force && self.repeat == RepeatMode::One {
            let Some(current) = self.index else { return };
            self.change_and_play(current, jump).await;
        } else if target >= self.queue.len() as isize {
            info!(mode = ?self.repeat, "reached the end of the queue");
            if self.repeat == RepeatMode::Off {
                self.stop_playing().await;
            } else {
                self.change_and_play(0, jump).await;
            }
        } else if target < 0 {
            if self.repeat == RepeatMode::Off {
                self.stop_playing().await;
            } else {
                self.change_and_play(self.queue.len().saturating_sub(1), jump).await;
            }
        } else {
            self.change_and_play(target as usize, jump).await;
        }
    }

    /// Skip to the next song (user action; overrides repeat-one)
    pub async fn next(&mut self) {
        if let Some(current) = self.index {
            self.try_to_go_to(current as isize + 1, true, true).await;
        }
    }

    /// Go back one song, or restart the current one
    ///
    /// More than four seconds in, "previous" means "start this song over";
    /// near the beginning it steps back to the prior song.
    pub async fn previous(&mut self) {
        let Some(current) = self.index else { return };

        let elapsed = match self.device.current_time().await {
            Ok(seconds) => seconds,
            Err(err) => {
                debug!(%err, "could not read device position, using cached");
                self.position.get()
            }
        };

        if elapsed <= PREVIOUS_RESTART_THRESHOLD_SECS {
            self.try_to_go_to(current as isize - 1, true, true).await;
        } else {
            self.seek_time(0.0);
        }
    }

    /// Advance after the device reports natural end-of-track
    ///
    /// Unlike [`next`], this honors repeat-one.
    ///
    /// [`next`]: PlaybackManager::next
    pub async fn handle_track_ended(&mut self) {
        if let Some(current) = self.index {
            self.try_to_go_to(current as isize + 1, false, false).await;
        }
    }

    async fn change_and_play(&mut self, index: usize, jump: bool) {
        if self.change_song_index(index, jump).await {
            self.device.play();
            self.enter_state(PlaybackState::Playing);
        }
    }

    /// Load the song at `new_index` into the device
    ///
    /// Returns whether a song was actually loaded. State is only mutated
    /// once the URL resolution has succeeded; a failure reports a transient
    /// notice and leaves everything as it was. Device load errors are
    /// swallowed into a reported notice (the index has legitimately moved by
    /// then).
    async fn change_song_index(&mut self, new_index: usize, jump: bool) -> bool {
        self.transition = self.transition.wrapping_add(1);
        let token = self.transition;

        let Some(item) = self.queue.get(new_index).cloned() else {
            // Sanity check; the navigation policy should make this unreachable
            info!(
                index = new_index,
                len = self.queue.len(),
                "tried to play an index past the queue, stopping"
            );
            self.stop_playing().await;
            return false;
        };

        info!(
            index = new_index,
            title = %item.song.title,
            id = %item.song.id,
            "changing song"
        );

        let url = match self.gateway.stream_url(&item.song).await {
            Ok(url) => url,
            Err(err) => {
                warn!(%err, id = %item.song.id, "no playable stream");
                self.events
                    .errors
                    .emit(&format!("Unable to play \"{}\"", item.song.title));
                return false;
            }
        };

        if self.transition != token {
            debug!(index = new_index, "song transition superseded, discarding");
            return false;
        }

        // Play logging happens off to the side; a failure is the gateway's
        // problem, not playback's
        let gateway = Arc::clone(&self.gateway);
        let song = item.song.clone();
        tokio::spawn(async move {
            if let Err(err) = gateway.record_played(&song).await {
                warn!(%err, id = %song.id, "failed to record play");
            }
        });

        self.index = Some(new_index);
        self.set_now_playing(Some(NowPlaying {
            item: item.clone(),
            jump,
        }));

        let source = DeviceSource {
            url,
            song: item.song.clone(),
        };
        if let Err(err) = self.device.load(Some(source)).await {
            warn!(%err, id = %item.song.id, "device failed to load song");
            self.events
                .errors
                .emit(&format!("There was an error loading \"{}\"", item.song.title));
        }

        true
    }

    // ===== Shuffle & Repeat =====

    /// Toggle shuffle
    ///
    /// Enabling shuffles the queue with the current index pinned to the top;
    /// disabling restores the original order through the stored mapping and
    /// remaps the current index back.
    pub fn toggle_shuffle(&mut self) {
        if self.shuffle {
            if let Some(mapping) = self.mapping.take() {
                let restored = (0..self.queue.len())
                    .filter_map(|original| {
                        mapping
                            .shuffled_position(original)
                            .and_then(|position| self.queue.get(position).cloned())
                    })
                    .collect();
                self.index = self
                    .index
                    .and_then(|current| mapping.original_position(current));
                self.replace_items(restored);
                self.sync_now_playing();
            }
            self.set_shuffle_flag(false);
        } else {
            self.reshuffle();
            self.set_shuffle_flag(true);
        }
    }

    /// Set shuffle to an explicit value
    pub fn set_shuffle(&mut self, on: bool) {
        if on != self.shuffle {
            self.toggle_shuffle();
        }
    }

    /// Cycle the repeat mode: off -> all -> one -> off
    pub fn toggle_repeat(&mut self) {
        self.set_repeat(self.repeat.cycle());
    }

    /// Set the repeat mode
    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
        self.settings.set(REPEAT_KEY, mode.as_str());
        self.events.repeat.emit(&mode);
    }

    fn reshuffle(&mut self) {
        let (shuffled, mapping) = shuffle::shuffle(&self.queue, self.index);
        self.index = self
            .index
            .map(|current| mapping.shuffled_position(current).unwrap_or(current));
        self.mapping = Some(mapping);
        self.replace_items(shuffled);
        self.sync_now_playing();
    }

    fn set_shuffle_flag(&mut self, on: bool) {
        self.shuffle = on;
        self.settings
            .set(SHUFFLE_KEY, if on { "true" } else { "false" });
        self.events.shuffle.emit(&on);
    }

    // ===== Transport =====

    /// Toggle between playing and paused
    ///
    /// No-op when nothing is loaded.
    pub fn toggle_state(&mut self) {
        if self.index.is_none() {
            return;
        }
        match self.state {
            PlaybackState::Playing => {
                self.device.pause();
                self.enter_state(PlaybackState::Paused);
            }
            PlaybackState::Paused => {
                self.device.play();
                self.enter_state(PlaybackState::Playing);
            }
        }
    }

    /// Resume if currently paused (no-op when nothing is loaded)
    pub fn play_if_paused(&mut self) {
        if self.index.is_none() || self.state == PlaybackState::Playing {
            return;
        }
        self.device.play();
        self.enter_state(PlaybackState::Playing);
    }

    /// Pause if currently playing (no-op when nothing is loaded)
    pub fn pause_if_playing(&mut self) {
        if self.index.is_none() || self.state == PlaybackState::Paused {
            return;
        }
        self.device.pause();
        self.enter_state(PlaybackState::Paused);
    }

    /// Seek to an absolute position in seconds
    ///
    /// Clamped at 0 below; the upper bound is left to the device to reject
    /// or clip.
    pub fn seek_time(&mut self, seconds: f64) {
        let seconds = seconds.max(0.0);
        self.set_position(seconds);
        self.device.set_current_time(seconds);
    }

    /// Adjust the position by a relative amount in seconds
    pub async fn nudge_current_time(&mut self, delta: f64) {
        let now = match self.device.current_time().await {
            Ok(seconds) => seconds,
            Err(err) => {
                debug!(%err, "could not read device position, using cached");
                self.position.get()
            }
        };
        self.seek_time(now + delta);
    }

    /// Set the volume (0-100)
    pub fn set_volume(&mut self, level: u8) {
        let level = level.min(100);
        self.volume = level;
        self.settings.set(VOLUME_KEY, &level.to_string());
        self.events.volume.emit(&level);
        // The device wants a fraction between 0 and 1
        self.device.set_volume(f32::from(level) / 100.0);
    }

    /// Set the volume as a function of the previous volume
    pub fn update_volume(&mut self, update: impl FnOnce(u8) -> u8) {
        self.set_volume(update(self.volume));
    }

    // ===== Store Synchronization =====

    /// Reconcile the queue with the latest song records
    ///
    /// Queue items are refreshed from `lookup`; entries whose song no longer
    /// exists are removed (keeping the mapping and index consistent), and if
    /// the currently playing song vanished playback stops entirely.
    pub async fn sync_songs(&mut self, lookup: &HashMap<String, Song>) {
        if let Some(playing) = &self.now_playing {
            if !lookup.contains_key(&playing.item.song.id) {
                info!(id = %playing.item.song.id, "playing song removed from store, stopping");
                self.stop_playing().await;
                return;
            }
        }

        // Drop stale entries back to front so earlier positions stay valid
        let stale: Vec<usize> = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, item)| !lookup.contains_key(&item.song.id))
            .map(|(position, _)| position)
            .collect();

        for &at in stale.iter().rev() {
            match self.mapping.take() {
                Some(mapping) => {
                    let (items, mapping) = shuffle::remove_from_shuffled(&self.queue, &mapping, at);
                    self.mapping = Some(mapping);
                    self.queue = items;
                }
                None => {
                    self.queue.remove(at);
                }
            }
            if let Some(current) = self.index {
                if at < current {
                    self.index = Some(current - 1);
                }
            }
        }

        let mut items = std::mem::take(&mut self.queue);
        for item in &mut items {
            if let Some(song) = lookup.get(&item.song.id) {
                item.song = song.clone();
            }
        }
        self.replace_items(items);
        self.sync_now_playing();
    }

    /// Fetch the device position once into the local cache
    pub async fn refresh_position(&mut self) {
        match self.device.current_time().await {
            Ok(seconds) => self.set_position(seconds),
            Err(err) => debug!(%err, "could not refresh device position"),
        }
    }

    // ===== State Queries =====

    /// The queue in its current (possibly shuffled) ordering
    pub fn queue_items(&self) -> &[QueueItem] {
        &self.queue
    }

    /// The currently loaded item, if any
    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    /// Index of the currently loaded item within the current ordering
    pub fn current_index(&self) -> Option<usize> {
        self.index
    }

    /// Current repeat mode
    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    /// Current play/pause state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether shuffle is enabled
    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    /// Current volume (0-100)
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Last known playback position in seconds
    ///
    /// Updated by seeks and by the position poll while playing.
    pub fn current_time(&self) -> f64 {
        self.position.get()
    }

    /// The active shuffle mapping, for diagnostics
    pub fn shuffle_mapping(&self) -> Option<&ShuffleMapping> {
        self.mapping.as_ref()
    }

    // ===== Observers =====

    /// Observe queue contents changes
    pub fn on_queue_change(
        &self,
        callback: impl Fn(&Vec<QueueItem>) + Send + Sync + 'static,
    ) -> Subscription {
        self.events.queue.subscribe(callback)
    }

    /// Observe changes to the currently playing item
    pub fn on_now_playing_change(
        &self,
        callback: impl Fn(&Option<NowPlaying>) + Send + Sync + 'static,
    ) -> Subscription {
        self.events.now_playing.subscribe(callback)
    }

    /// Observe repeat mode changes
    pub fn on_repeat_change(
        &self,
        callback: impl Fn(&RepeatMode) + Send + Sync + 'static,
    ) -> Subscription {
        self.events.repeat.subscribe(callback)
    }

    /// Observe play/pause state changes
    pub fn on_state_change(
        &self,
        callback: impl Fn(&PlaybackState) + Send + Sync + 'static,
    ) -> Subscription {
        self.events.state.subscribe(callback)
    }

    /// Observe shuffle flag changes
    pub fn on_shuffle_change(&self, callback: impl Fn(&bool) + Send + Sync + 'static) -> Subscription {
        self.events.shuffle.subscribe(callback)
    }

    /// Observe volume changes
    pub fn on_volume_change(&self, callback: impl Fn(&u8) + Send + Sync + 'static) -> Subscription {
        self.events.volume.subscribe(callback)
    }

    /// Observe playback position updates (seconds)
    pub fn on_position_change(&self, callback: impl Fn(&f64) + Send + Sync + 'static) -> Subscription {
        self.events.position.subscribe(callback)
    }

    /// Observe transient user-facing error notices
    pub fn on_error(&self, callback: impl Fn(&String) + Send + Sync + 'static) -> Subscription {
        self.events.errors.subscribe(callback)
    }

    // ===== Lifecycle =====

    /// Tear the engine down
    ///
    /// Stops the position poll and releases the device source. The queue is
    /// left as-is; the engine is not meant to be reused afterwards.
    pub async fn dispose(&mut self) {
        self.stop_position_poll();
        if let Err(err) = self.device.load(None).await {
            debug!(%err, "device teardown failed");
        }
    }

    // ===== Internals =====

    /// Install `items` as the queue, renumbering positions, and notify
    fn replace_items(&mut self, mut items: Vec<QueueItem>) {
        for (position, item) in items.iter_mut().enumerate() {
            item.position = position;
        }
        self.queue = items;
        self.events.queue.emit(&self.queue);
    }

    fn set_now_playing(&mut self, value: Option<NowPlaying>) {
        self.now_playing = value;
        self.events.now_playing.emit(&self.now_playing);
    }

    /// Re-point the now-playing snapshot at the item currently under the
    /// index, preserving the jump flag
    ///
    /// Needed after mutations that renumber or reorder the queue.
    fn sync_now_playing(&mut self) {
        let Some(current) = self.index else { return };
        let Some(item) = self.queue.get(current) else {
            return;
        };
        if let Some(playing) = &self.now_playing {
            if playing.item != *item {
                let jump = playing.jump;
                self.set_now_playing(Some(NowPlaying {
                    item: item.clone(),
                    jump,
                }));
            }
        }
    }

    fn set_position(&mut self, seconds: f64) {
        self.position.set(seconds);
        self.events.position.emit(&seconds);
    }

    fn enter_state(&mut self, next: PlaybackState) {
        self.state = next;
        self.events.state.emit(&next);
        match next {
            PlaybackState::Playing => self.ensure_position_poll(),
            PlaybackState::Paused => self.stop_position_poll(),
        }
    }

    /// Start the position poll task if it is not already running
    ///
    /// The task holds only `Arc`-shared handles, so it can outlive any
    /// particular borrow of the engine; it is aborted on every transition
    /// out of `Playing`.
    fn ensure_position_poll(&mut self) {
        if self.poll.is_some() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, position polling disabled");
            return;
        };

        let device = Arc::clone(&self.device);
        let events = self.events.clone();
        let position = self.position.clone();
        let every = self.options.position_poll_interval;

        self.poll = Some(runtime.spawn(async move {
            let mut ticks = tokio::time::interval(every);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // An interval fires immediately; skip that so the first reading
            // lands one period after playback starts
            ticks.tick().await;
            loop {
                ticks.tick().await;
                match device.current_time().await {
                    Ok(seconds) => {
                        position.set(seconds);
                        events.position.emit(&seconds);
                    }
                    Err(err) => debug!(%err, "position poll failed"),
                }
            }
        }));
    }

    fn stop_position_poll(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.abort();
        }
    }
}

impl Drop for PlaybackManager {
    fn drop(&mut self) {
        self.stop_position_poll();
    }
}
