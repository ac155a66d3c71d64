/// Anime catalog provider abstraction
///
/// This module provides a pluggable architecture for the external anime catalog
/// and list-tracking API. The provider covers both read access (search, detail)
/// and the linked-account surface (viewer lookup, remote list, entry push) so the
/// rest of the crate never sees GraphQL.
use crate::{
    error::AppResult,
    models::{Anime, RemoteEntry, RemotePush, RemoteViewer},
};

pub mod anilist;

pub use anilist::AniListProvider;

/// Trait for anime catalog providers
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Search the catalog by title
    ///
    /// Returns a bounded page of matching anime.
    async fn search(&self, query: &str) -> AppResult<Vec<Anime>>;

    /// Fetch full detail for a single title by its catalog id
    async fn detail(&self, media_id: i32) -> AppResult<Anime>;

    /// Resolve the account behind an access token
    ///
    /// Used at link time to validate the token and pin the remote user id.
    async fn viewer(&self, token: &str) -> AppResult<RemoteViewer>;

    /// Fetch the complete remote list for a linked account
    async fn remote_list(&self, token: &str, viewer_id: i32) -> AppResult<Vec<RemoteEntry>>;

    /// Create or update one remote list entry
    ///
    /// The remote API upserts by media id, so repeating a push is harmless.
    async fn push_entry(&self, token: &str, push: &RemotePush) -> AppResult<()>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
