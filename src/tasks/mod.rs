//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is open.
//!
//! # Tasks
//! - Maintenance: expiration sweep, log fsync and snapshot on every tick

mod maintenance;

pub(crate) use maintenance::{spawn_maintenance_task, MaintenanceHandle};
