//! Simulated provider for Plinth
//!
//! Answers create, update and delete calls for the EC2 resource types of
//! the reference topology (VPC, subnet, internet gateway, route table,
//! route, route table association, security group and instance) without
//! any network access. Used by the CLI and by end-to-end tests.
//!
//! Failures can be injected per resource name:
//!
//! ```text
//! PLINTH_SIM_FAIL=my-instance-2          # permanent failure
//! PLINTH_SIM_THROTTLE=my-subnet:2        # two retryable failures
//! PLINTH_SIM_LATENCY_MS=250              # delay of every call
//! ```

pub mod catalog;
pub mod error;
pub mod provider;

pub use catalog::{CATALOG, TypeSpec, lookup};
pub use error::{Result, SimError};
pub use provider::{FAIL_ENV, LATENCY_ENV, SimProvider, THROTTLE_ENV};
