//! forgetube-cli library: command handlers and the HTTP API, exposed for tests.

pub mod commands;
pub mod http;
pub mod logging;
