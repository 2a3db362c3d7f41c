//! courier: builds per-feed HTML digests from an OPML subscription list and
//! mails them to a reading device.
//!
//! A run loads the OPML file, extracts every feed reference, fetches each
//! feed, keeps entries newer than the cutoff, renders one HTML document per
//! feed and writes it to the output directory. The paths of the written
//! documents are handed to [`dispatch`].

pub mod config;
pub mod digest;
pub mod dispatch;
pub mod feed;
pub mod pipeline;
pub mod util;

pub use config::{Config, ConfigError, EmailConfig};
pub use pipeline::{Pipeline, PipelineConfig, RunReport};
