//! Version discovery layer
//!
//! Lists the versions of a GitHub repository through several upstream channels
//! and turns upstream tags into normalized, ordered version records.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ git-upload- │────▶│    Cache    │────▶│             │
//! │ pack refs   │     │ (TTL, RAM)  │     │             │
//! └─────────────┘     └─────────────┘     │  Versions   │
//! ┌─────────────┐                         │ (normalize, │
//! │ REST        │────────────────────────▶│  sort)      │
//! └─────────────┘                         │             │
//! ┌─────────────┐                         │             │
//! │ GraphQL     │────────────────────────▶│             │
//! └─────────────┘                         └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`normalize`]: Tag normalization and prerelease detection
//! - [`semver`]: Lenient parsing, ordering and suggestions
//! - [`types`]: `Version`, `Versions`, `RepoId` and list options
//! - [`source`]: Traits implemented by discovery channels
//! - [`sources`]: Concrete channels and the shared GitHub client
//! - [`cache`]: In-memory discovery cache with an injectable clock
//! - [`error`]: Error types for discovery channels

pub mod cache;
pub mod error;
pub mod normalize;
pub mod semver;
pub mod source;
pub mod sources;
pub mod types;
