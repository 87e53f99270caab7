//! Build-system collaborators for the submit queue
//!
//! - [`JobClient`]: last completed build of a CI job (Jenkins JSON API)
//! - [`ArtifactStore`]: `latest-build.txt`, `finished.json` and test-result
//!   artifacts from a build bucket
//! - [`junit`]: failure counting for JUnit result files

pub mod client;
pub mod error;
pub mod junit;
pub mod types;

pub use client::{ArtifactStore, BucketArtifactStore, JenkinsClient, JobClient};
pub use error::{CiError, CiResult};
pub use types::{BuildResult, FinishedResult, JobBuild};
