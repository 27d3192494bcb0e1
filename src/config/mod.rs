pub mod merge;
pub mod schema;
mod types;

pub use types::*;
