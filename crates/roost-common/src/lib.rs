pub mod error;
pub mod facts;
pub mod node;

pub use error::Error;
pub use facts::{Facts, FACT_IS_VIRTUAL, FACT_VIRTUAL};
pub use node::*;

pub type Result<T> = std::result::Result<T, Error>;
