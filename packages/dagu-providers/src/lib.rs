pub mod shopping;

mod error;

pub use error::{Error, Result};
