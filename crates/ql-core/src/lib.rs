pub mod context;
pub mod document;
pub mod encounter;
pub mod error;
pub mod types;
pub mod value;

pub use context::QuestContext;
pub use document::*;
pub use encounter::*;
pub use error::QuestError;
pub use types::*;
pub use value::*;
