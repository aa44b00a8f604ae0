//! Typed - task handlers and the router that builds them from envelopes.
//!
//! - **Typed**: `Task` trait, kwargs checked by serde at routing time.
//! - **Dyn**: `DynRoute`, object-safe, stored by task name.

pub mod handler;
pub mod registry;
pub mod task;

pub use self::handler::TaskHandler;
pub use self::registry::{DynRoute, RouteError, TaskRouter};
pub use self::task::Task;
