//! Pipeline document model
//!
//! Normalizes a parsed pipeline document into typed activities, resolving
//! legacy field aliases into one canonical shape.

mod definition;

pub use definition::{
    Activity, ActivityKind, ActivityList, Endpoint, PipelineDocument, Schedule, ScheduleKind,
};
