#![forbid(unsafe_code)]

mod engine;
mod error;
mod model;
#[cfg(feature = "sql")]
pub mod schema;
mod staging;
mod warehouse;

pub use engine::*;
pub use error::*;
pub use model::*;
pub use staging::*;
pub use warehouse::*;
