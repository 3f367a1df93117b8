pub mod error;
pub mod models;
pub mod validation;
pub mod identity;
pub mod tally;

pub use error::{Error, ErrorCode, Result};
pub use models::*;
pub use validation::*;
pub use identity::*;
pub use tally::{Tally, Orphans, unix_millis};

#[cfg(test)]
mod tests;
