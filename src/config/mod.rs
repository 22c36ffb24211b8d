//! Configuration: the credential file and its line format.

pub mod dotenv;
mod paths;
mod store;

pub use paths::{APP_DIR, config_file_path};
pub use store::ConfigStore;
