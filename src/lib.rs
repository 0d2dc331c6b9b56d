// benchling-webhook - Deployment configuration CLI
//
// Argument parsing, prompts and printing only. Resolution, validation and
// persistence live in the library crates.

pub mod commands;
mod init;
pub mod output;

pub use commands::{Command, Context};
pub use init::{init_tracing, LogFormat};
