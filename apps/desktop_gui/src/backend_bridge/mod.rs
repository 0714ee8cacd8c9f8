//! Bridge between the UI thread and the worker tasks that talk to Labstep.

pub mod commands;
pub mod runtime;
