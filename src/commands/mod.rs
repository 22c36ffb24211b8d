//! Command handlers for the aitk CLI.
//!
//! Handlers print user-facing output and return typed errors; exit codes are
//! decided in `main`.

mod check;
mod config_cmd;
mod env;

pub use check::handle_check;
pub use config_cmd::{
    handle_config_get, handle_config_list, handle_config_path, handle_config_set,
    handle_config_unset, handle_interactive_setup,
};
pub use env::{handle_env_diff, handle_env_init, handle_env_list, handle_env_pull, handle_env_push};
