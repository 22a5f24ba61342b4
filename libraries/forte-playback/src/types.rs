//! Core types for queue management

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Song record as returned by the external store
///
/// The engine treats songs as opaque beyond the id (identity), the title
/// (user-facing notices), and display metadata. Playable URLs are resolved
/// on demand through the gateway, never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// Unique song identifier from the store
    pub id: String,

    /// Song title
    pub title: String,

    /// Artist name (optional)
    pub artist: Option<String>,

    /// Album name (optional)
    pub album: Option<String>,

    /// Song duration
    pub duration: Duration,
}

/// Auto-generated library views that can act as a queue source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratedView {
    /// Songs added most recently
    RecentlyAdded,

    /// Songs played most recently
    RecentlyPlayed,

    /// Songs the user has liked
    Liked,
}

impl GeneratedView {
    /// Stable id used for source identity
    pub fn id(self) -> &'static str {
        match self {
            GeneratedView::RecentlyAdded => "recently-added",
            GeneratedView::RecentlyPlayed => "recently-played",
            GeneratedView::Liked => "liked",
        }
    }

    /// Display label
    pub fn human_name(self) -> &'static str {
        match self {
            GeneratedView::RecentlyAdded => "Recently Added",
            GeneratedView::RecentlyPlayed => "Recently Played",
            GeneratedView::Liked => "Liked Songs",
        }
    }

    /// Parse a stable id back into a view
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "recently-added" => Some(GeneratedView::RecentlyAdded),
            "recently-played" => Some(GeneratedView::RecentlyPlayed),
            "liked" => Some(GeneratedView::Liked),
            _ => None,
        }
    }
}

/// Provenance of a queue's contents
///
/// Used for highlighting decisions in the UI ("is this album playing?"),
/// not for playback logic itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueSource {
    /// Queue built from an album
    Album {
        /// Album id
        id: String,
        /// Album display name
        name: String,
    },

    /// Queue built from an artist's songs
    Artist {
        /// Artist id
        id: String,
        /// Artist display name
        name: String,
    },

    /// Queue built from a playlist
    Playlist {
        /// Playlist id
        id: String,
        /// Playlist display name
        name: String,
    },

    /// Queue built from a generated library view
    Generated(GeneratedView),

    /// Queue built from a genre (the id doubles as the display name)
    Genre {
        /// Genre id
        id: String,
    },

    /// The whole library
    Library,

    /// Ad-hoc contents, e.g. search results or manually enqueued songs
    Manual,

    /// Re-entering playback from within the queue view itself
    Queue,
}

impl QueueSource {
    /// Source identity check
    ///
    /// Type-based, and id-based for the id-bearing variants. `Manual`
    /// sources never match, not even themselves: ad-hoc result sets are
    /// ephemeral and cannot be re-identified later.
    pub fn matches(&self, other: &QueueSource) -> bool {
        match (self, other) {
            (QueueSource::Album { id: a, .. }, QueueSource::Album { id: b, .. })
            | (QueueSource::Artist { id: a, .. }, QueueSource::Artist { id: b, .. })
            | (QueueSource::Playlist { id: a, .. }, QueueSource::Playlist { id: b, .. })
            | (QueueSource::Genre { id: a }, QueueSource::Genre { id: b }) => a == b,
            (QueueSource::Generated(a), QueueSource::Generated(b)) => a == b,
            (QueueSource::Library, QueueSource::Library)
            | (QueueSource::Queue, QueueSource::Queue) => true,
            _ => false,
        }
    }

    /// Display label for "playing from ..." UI, if the source has one
    pub fn human_name(&self) -> Option<String> {
        match self {
            QueueSource::Album { name, .. }
            | QueueSource::Artist { name, .. }
            | QueueSource::Playlist { name, .. } => Some(name.clone()),
            QueueSource::Genre { id } => Some(id.clone()),
            QueueSource::Generated(view) => Some(view.human_name().to_string()),
            QueueSource::Library => Some("Library".to_string()),
            QueueSource::Manual | QueueSource::Queue => None,
        }
    }
}

/// One playable entry in the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// The song this entry plays
    pub song: Song,

    /// Zero-based position within the current queue ordering
    pub position: usize,

    /// Where this entry came from
    pub source: QueueSource,
}

impl QueueItem {
    /// Item identity check
    ///
    /// Song ids are only unique within a source, so identity requires both
    /// the song id and the source to match. For `Queue`-sourced items the
    /// position stands in for source identity; `Manual` items never match.
    pub fn matches(&self, other: &QueueItem) -> bool {
        if self.song.id != other.song.id {
            return false;
        }

        match &self.source {
            QueueSource::Queue => {
                matches!(other.source, QueueSource::Queue) && self.position == other.position
            }
            QueueSource::Manual => false,
            source => source.matches(&other.source),
        }
    }
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatMode {
    /// Stop when the queue ends
    Off,

    /// Loop the entire queue
    All,

    /// Loop the current song only
    One,
}

impl RepeatMode {
    /// Cycle to the next mode: Off -> All -> One -> Off
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    /// Stable string form used for persistence
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::One => "one",
        }
    }

    /// Parse the persisted string form
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(RepeatMode::Off),
            "all" => Some(RepeatMode::All),
            "one" => Some(RepeatMode::One),
            _ => None,
        }
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Paused or nothing loaded
    Paused,

    /// Playing audio
    Playing,
}

/// The currently loaded queue item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    /// The loaded item
    pub item: QueueItem,

    /// Whether this transition was user-initiated (vs automatic
    /// continuation). Observers use it to decide e.g. whether to scroll.
    pub jump: bool,
}

/// Options for replacing the queue
#[derive(Debug, Clone)]
pub struct SetQueueOptions {
    /// Songs in their logical (unshuffled) order
    pub songs: Vec<Song>,

    /// Provenance of the new queue
    pub source: QueueSource,

    /// Index to start playing from (defaults to 0)
    pub index: Option<usize>,
}

/// Construction options for the playback manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerOptions {
    /// How often the device position is polled while playing
    pub position_poll_interval: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            position_poll_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str) -> Song {
        Song {
            id: id.to_string(),
            title: format!("Song {id}"),
            artist: Some("Test Artist".to_string()),
            album: None,
            duration: Duration::from_secs(180),
        }
    }

    fn album(id: &str) -> QueueSource {
        QueueSource::Album {
            id: id.to_string(),
            name: format!("Album {id}"),
        }
    }

    #[test]
    fn id_bearing_sources_match_on_type_and_id() {
        assert!(album("a1").matches(&album("a1")));
        assert!(!album("a1").matches(&album("a2")));
        assert!(!album("a1").matches(&QueueSource::Playlist {
            id: "a1".to_string(),
            name: "Album a1".to_string(),
        }));
    }

    #[test]
    fn untagged_sources_match_on_type() {
        assert!(QueueSource::Library.matches(&QueueSource::Library));
        assert!(QueueSource::Queue.matches(&QueueSource::Queue));
        assert!(!QueueSource::Library.matches(&QueueSource::Queue));
    }

    #[test]
    fn manual_sources_never_match() {
        assert!(!QueueSource::Manual.matches(&QueueSource::Manual));
        assert!(!QueueSource::Manual.matches(&QueueSource::Library));
    }

    #[test]
    fn generated_sources_match_on_view() {
        let liked = QueueSource::Generated(GeneratedView::Liked);
        assert!(liked.matches(&QueueSource::Generated(GeneratedView::Liked)));
        assert!(!liked.matches(&QueueSource::Generated(GeneratedView::RecentlyAdded)));
    }

    #[test]
    fn generated_view_ids_round_trip() {
        for view in [
            GeneratedView::RecentlyAdded,
            GeneratedView::RecentlyPlayed,
            GeneratedView::Liked,
        ] {
            assert_eq!(GeneratedView::from_id(view.id()), Some(view));
        }
        assert_eq!(GeneratedView::from_id("starred"), None);
    }

    #[test]
    fn queue_sourced_items_match_on_position() {
        let a = QueueItem {
            song: song("s1"),
            position: 3,
            source: QueueSource::Queue,
        };
        let mut b = a.clone();
        assert!(a.matches(&b));

        b.position = 4;
        assert!(!a.matches(&b));
    }

    #[test]
    fn manual_items_never_match() {
        let a = QueueItem {
            song: song("s1"),
            position: 0,
            source: QueueSource::Manual,
        };
        assert!(!a.matches(&a.clone()));
    }

    #[test]
    fn items_require_same_song() {
        let a = QueueItem {
            song: song("s1"),
            position: 0,
            source: album("a1"),
        };
        let b = QueueItem {
            song: song("s2"),
            position: 0,
            source: album("a1"),
        };
        assert!(!a.matches(&b));
        assert!(a.matches(&QueueItem {
            song: song("s1"),
            position: 7,
            source: album("a1"),
        }));
    }

    #[test]
    fn repeat_mode_cycles() {
        assert_eq!(RepeatMode::Off.cycle(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycle(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycle(), RepeatMode::Off);
    }

    #[test]
    fn repeat_mode_string_round_trip() {
        for mode in [RepeatMode::Off, RepeatMode::All, RepeatMode::One] {
            assert_eq!(RepeatMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(RepeatMode::parse("repeat"), None);
    }

    #[test]
    fn source_human_names() {
        assert_eq!(album("a1").human_name().as_deref(), Some("Album a1"));
        assert_eq!(
            QueueSource::Genre {
                id: "Jazz".to_string()
            }
            .human_name()
            .as_deref(),
            Some("Jazz")
        );
        assert_eq!(
            QueueSource::Generated(GeneratedView::Liked)
                .human_name()
                .as_deref(),
            Some("Liked Songs")
        );
        assert_eq!(QueueSource::Library.human_name().as_deref(), Some("Library"));
        assert_eq!(QueueSource::Manual.human_name(), None);
        assert_eq!(QueueSource::Queue.human_name(), None);
    }
}
