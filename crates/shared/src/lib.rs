//! Types shared between the Labstep client library and the desktop app.

pub mod domain;
pub mod error;
pub mod protocol;
pub mod time;
