mod collection;
mod store;

pub use collection::{ensure_indexes_exist, Coll, ElectionDocument, MongoCollection, ELECTION_ID};
pub use store::{MemoryStore, MongoStore, StateStore, StoredState};
