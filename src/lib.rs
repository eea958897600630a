#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod console;
pub mod error;
