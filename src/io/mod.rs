pub mod buckets;
pub mod config_io;
pub mod lock;
pub mod state;
pub mod store;
