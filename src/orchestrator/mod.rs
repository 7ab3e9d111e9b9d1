//! Application-level orchestration.
//!
//! This module owns the dashboard lifecycle: page fetches, run requests and the
//! status poller. UI layers send [`UiCommand`]s in and render the events that
//! come back out.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
