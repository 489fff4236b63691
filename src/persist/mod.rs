mod queue_store;

pub use queue_store::{
    PersistedQueueSnapshot, QueueSlot, QueueStore, RestoredQueues, SNAPSHOT_VERSION,
};
