pub mod analytics;
pub mod cli;
pub mod config;
pub mod context;
pub mod database;
pub mod models;
pub mod persistence;
pub mod sample;
pub mod store;
pub mod timer;
pub mod transfer;
pub mod tui;
pub mod utils;

pub use analytics::{Analytics, Window};
pub use config::Config;
pub use context::AppContext;
pub use database::Database;
pub use models::{Priority, Session, Task};
pub use persistence::{KeyValueStore, MemoryStore};
pub use store::TaskStore;
pub use timer::{SessionTracker, SystemClock};
pub use utils::Profile;
