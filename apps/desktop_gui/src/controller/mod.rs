//! Controller layer: UI events, reducer-like state transitions, and command orchestration.

pub mod events;
pub mod guard;
pub mod orchestration;
pub mod reducer;
pub mod session;
