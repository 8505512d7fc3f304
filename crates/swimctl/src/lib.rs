//! swimctl library - exposes modules for testing

pub mod commands;
pub mod device_input;
pub mod logging;
pub mod output;
