//! Release asset resolution
//!
//! Turns a package descriptor, a requested version and a target platform into
//! a concrete download URL with checksum details.
//!
//! - [`orchestrator`]: Channel fallback, tag lookup and the resolve flow
//! - [`degraded`]: Checksum-less resolution when upstream quota is exhausted
//! - [`assets`]: Asset matching, platform filtering, archive detection
//! - [`asset_index`]: JSON asset indexes served at download URLs
//! - [`checksum`]: `<algorithm>:<hex>` normalization
//! - [`template`]: `{placeholder}` expansion
//! - [`platform`]: Platform parsing and asset pattern selection
//! - [`expr`]: Contract for the external expression evaluator
//! - [`package`]: Package descriptors and resolution results
//! - [`error`]: Resolution errors

pub mod asset_index;
pub mod assets;
pub mod checksum;
pub mod degraded;
pub mod error;
pub mod expr;
pub mod orchestrator;
pub mod package;
pub mod platform;
pub mod template;

pub use error::ResolveError;
pub use orchestrator::Orchestrator;
pub use package::{PackageDescriptor, Resolution, ResolveOptions};
pub use platform::Platform;
