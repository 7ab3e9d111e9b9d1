//! Run-test command and runner status polling.

mod controller;
mod poller;

pub use controller::RunTestController;
pub use poller::StatusPoller;
