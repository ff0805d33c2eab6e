//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the admin server is
//! up, and the teardown that stops them.
//!
//! # Tasks
//! - L1 maintenance: purges expired local entries in every engine
//! - Shutdown: stops maintenance and disconnects every engine

mod maintenance;
mod shutdown;

pub use maintenance::{run_pass, spawn_maintenance_task};
pub use shutdown::serve_then_shut_down;
