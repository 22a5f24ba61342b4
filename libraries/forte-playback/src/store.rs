//! Song store contract
//!
//! The persistent object store is a black box to the engine: it resolves
//! song references to transient URLs and records playback events. Gateways
//! own their own caching and consistency; the engine only ever calls them.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Song;

/// Contract for the external song store
#[async_trait]
pub trait SongGateway: Send + Sync {
    /// Resolve a song to a transient playable URL
    ///
    /// Fails when the song has no stored content (e.g. the upload never
    /// finished). Callers treat this as a transient, user-visible condition.
    async fn stream_url(&self, song: &Song) -> Result<String>;

    /// Resolve a song's artwork to a transient URL
    async fn artwork_url(&self, song: &Song) -> Result<String>;

    /// Record that a song was played
    ///
    /// The engine invokes this as a detached task: failures are logged and
    /// never propagated into playback.
    async fn record_played(&self, song: &Song) -> Result<()>;
}

/// Undo token for an optimistic local mutation
///
/// Gateways patch their local records before the remote write and roll back
/// if it fails: mutate through [`OptimisticPatch::apply`], keep the token,
/// and call [`undo`] when the remote rejects the write.
///
/// [`undo`]: OptimisticPatch::undo
#[derive(Debug)]
pub struct OptimisticPatch<T: Clone> {
    prior: T,
}

impl<T: Clone> OptimisticPatch<T> {
    /// Apply a local mutation, capturing the prior value
    pub fn apply(value: &mut T, mutate: impl FnOnce(&mut T)) -> Self {
        let prior = value.clone();
        mutate(value);
        Self { prior }
    }

    /// Restore the value captured before the mutation
    pub fn undo(self, value: &mut T) {
        *value = self.prior;
    }
}
