//! Utility functions shared across the application.

mod mask;
pub(crate) mod permissions;

pub use mask::{mask_value, redact_url};
pub(crate) use mask::redact_text;
pub use permissions::{restrict_file_permissions, write_private_file_atomic};
