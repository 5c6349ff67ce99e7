//! Parameter sets: typed values, schemas and the active-set manager.

mod manager;
mod schema;
mod value;

pub use manager::{CUSTOM_SET, CustomSet, DEFAULT_SET, ParameterSetManager};
pub use schema::{Constraints, ParameterKind, ParameterSchema, ParameterSpec};
pub use value::{ParameterSet, ParameterValue, ScaffoldPackage};
