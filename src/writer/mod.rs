pub mod schema_gen;
pub mod store;
pub mod upsert;

pub use store::{row_count, Store};
pub use upsert::{upsert, UpsertOutcome};
