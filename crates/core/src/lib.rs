#![forbid(unsafe_code)]

pub mod autosave;
pub mod error;
pub mod model;
pub mod optimistic;
pub mod time;
pub mod unlock;

pub use error::Error;
pub use time::Clock;
