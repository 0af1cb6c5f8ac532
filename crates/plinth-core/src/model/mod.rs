//! Data model
//!
//! Resource descriptors, property values and the project that holds them.

mod project;
mod resource;
mod value;

pub use project::*;
pub use resource::*;
pub use value::*;
