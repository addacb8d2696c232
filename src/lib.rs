pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod media;
pub mod park;
pub mod search;

pub use config::Config;
pub use error::MediaError;
