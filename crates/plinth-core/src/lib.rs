//! Plinth core
//!
//! The resource descriptor model and the KDL project loader.
//!
//! ```kdl
//! resource "aws:ec2:Subnet" "my-subnet" {
//!     vpc_id (ref)"my-vpc.id"
//!     availability_zone (var)"availability_zone"
//! }
//! output "publicSubnetId" (ref)"my-subnet.id"
//! ```

pub mod error;
pub mod loader;
pub mod model;
pub mod parser;

pub use error::{CoreError, Result};
pub use loader::{VARIABLE_ENV_PREFIX, VariableOverrides, load_project, resolve_variables};
pub use model::*;
pub use parser::{parse_kdl_file, parse_kdl_string};
