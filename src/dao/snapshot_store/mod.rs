mod file;

pub use file::FileSnapshotStore;

use futures::future::BoxFuture;

use crate::dao::{
    models::{EventDocument, EventId},
    storage::StoreResult,
};

/// Abstraction over the persistence layer holding one document per event.
pub trait SnapshotStore: Send + Sync {
    /// Load the document of an event, failing with `NotFound` when none exists.
    fn read(&self, id: EventId) -> BoxFuture<'static, StoreResult<EventDocument>>;
    /// Replace the whole document of an event.
    fn write(&self, id: EventId, document: EventDocument) -> BoxFuture<'static, StoreResult<()>>;
    /// Remove the document of an event. Removing a missing document succeeds.
    fn evict(&self, id: EventId) -> BoxFuture<'static, StoreResult<()>>;
    /// Every event id a document currently exists for, ascending.
    fn list_known_ids(&self) -> BoxFuture<'static, StoreResult<Vec<EventId>>>;
}
