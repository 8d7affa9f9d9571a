pub mod commands;
pub mod config;
pub mod directory;
pub mod handler;
pub mod index;
pub mod query;
pub mod reactor;
pub mod scheduler;
pub mod utils;

#[macro_use]
extern crate tracing;

use std::sync::Arc;

use serenity::model::prelude::ChannelId;
use serenity::prelude::TypeMapKey;
use tokio::sync::Mutex;

use directory::Directory;
use index::IndexStore;
use query::QueryService;
use reactor::EventReactor;
use scheduler::ArchiveScheduler;

/// Everything the event handler and commands need, built once in `main` and
/// carried through serenity's data map. No module-level singletons.
pub struct Services {
    pub forum_id: ChannelId,
    pub reactor: EventReactor,
    pub query: QueryService,
    pub scheduler: Arc<ArchiveScheduler>,
}

impl Services {
    pub fn new(directory: Arc<dyn Directory>, forum_id: ChannelId) -> Arc<Self> {
        let index = Arc::new(Mutex::new(IndexStore::new()));
        let scheduler = Arc::new(ArchiveScheduler::new(Arc::clone(&directory), forum_id));
        let reactor = EventReactor::new(
            forum_id,
            Arc::clone(&index),
            Arc::clone(&scheduler),
            directory,
        );
        Arc::new(Self {
            forum_id,
            reactor,
            query: QueryService::new(index),
            scheduler,
        })
    }
}

pub struct ServicesKey;

impl TypeMapKey for ServicesKey {
    type Value = Arc<Services>;
}
