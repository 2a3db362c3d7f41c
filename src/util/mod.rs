//! Utility functions shared by the pipeline stages.
//!
//! - **URL validation**: feed URLs must be http(s) with a host
//! - **File names**: feed titles become safe artifact file stems

mod text;
mod url_validator;

pub use text::{sanitize_file_stem, MAX_STEM_BYTES};
pub use url_validator::{validate_url, UrlValidationError};
