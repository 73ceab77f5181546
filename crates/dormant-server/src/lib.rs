//! Dormant server library: HTTP routes, background timers and application
//! state around the suspension engine. Separated from main.rs for
//! integration testing.

pub mod config;
pub mod logging;
pub mod routes;
pub mod scheduler;
pub mod state;
