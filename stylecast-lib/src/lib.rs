pub mod dom;
pub mod error;
pub mod generate;
pub mod page;
pub mod parser;
pub mod properties;
pub mod sass;
pub mod session;
pub mod snapshot;
pub mod source_map;
pub mod style;
pub mod tree_builder;

pub use error::{Result, StylecastError};
