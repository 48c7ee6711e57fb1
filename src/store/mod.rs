//! On-disk configuration store.
//!
//! - [`instance`]: per-instance JSON launch records used for rebuild and export
//! - [`databases`]: the YAML catalog of auxiliary database containers
//! - [`tags`]: image tag listing files shown on the home page

pub mod databases;
pub mod instance;
pub mod tags;

pub use databases::{DatabaseCatalog, DatabaseSpec};
pub use instance::{InstanceRecord, InstanceStore};
pub use tags::{parse_tag_file, parse_tags};
