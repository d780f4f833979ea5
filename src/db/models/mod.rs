#![allow(unused_imports)]

//! Database models split into separate files.
//! This module re-exports individual model modules so imports like
//! `use crate::db::models::*;` keep working.

pub mod language;
pub mod platform;
pub mod publish_record;
pub mod scheduled_event;
pub mod social_authorization;
pub mod subscription;

// Re-export all types at the `crate::db::models` namespace.
pub use self::language::*;
pub use self::platform::*;
pub use self::publish_record::*;
pub use self::scheduled_event::*;
pub use self::social_authorization::*;
pub use self::subscription::*;
