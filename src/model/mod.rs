pub mod category;
pub mod clock;
pub mod config;
pub mod day;
pub mod note;

pub use category::*;
pub use clock::*;
pub use config::*;
pub use note::*;
