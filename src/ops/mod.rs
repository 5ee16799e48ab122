pub mod export;
pub mod notebook;
pub mod numbering;
pub mod search;
pub mod stats;
pub mod ticker;
pub mod timers;
