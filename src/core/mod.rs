pub mod error;
pub mod types;
pub mod value;

pub use error::{BulkError, Result};
pub use types::WireType;
pub use value::Value;
