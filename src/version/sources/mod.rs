//! Concrete discovery channels
//!
//! - [`git_refs`]: git-upload-pack ref advertisement (no API quota)
//! - [`rest`]: REST release listing and release lookups
//! - [`graphql`]: GraphQL tag and release queries
//! - [`cached`]: TTL-cached decorator over any channel
//! - [`client`]: shared HTTP client, credentials and response mapping
//! - [`retry`]: backoff policy for transient failures
//! - [`rate_limit`]: quota parsing and reporting
//! - [`pktline`]: PKT-LINE decoder

pub mod cached;
pub mod client;
pub mod git_refs;
pub mod graphql;
pub mod pktline;
pub mod rate_limit;
pub mod rest;
pub mod retry;

pub use cached::CachedSource;
pub use client::{Credential, GitHubClient, credential_from_env, resolve_credential};
pub use git_refs::GitRefsSource;
pub use graphql::GraphqlSource;
pub use rest::RestSource;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
