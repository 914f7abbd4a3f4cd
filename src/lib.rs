//! tm-setter - interactive setup wizard for test-management runs
//!
//! The wizard walks through login, DB code selection, Jira issue selection
//! and an optional repository/version choice. Progress is saved after every
//! step so an interrupted run can be resumed.

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod steps;
pub mod store;
pub mod ui;
pub mod wizard;
