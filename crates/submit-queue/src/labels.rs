//! Label names the submit queue reacts to

/// The author signed the CLA
pub const CLA_YES: &str = "cla: yes";

/// A reviewer approved the change
pub const LGTM: &str = "lgtm";

/// A maintainer vouches for a non-whitelisted author
pub const OK_TO_MERGE: &str = "ok-to-merge";

/// Blocks merging regardless of anything else
pub const DO_NOT_MERGE: &str = "do-not-merge";

/// Skip the CI and E2E requirements and merge directly
pub const E2E_NOT_REQUIRED: &str = "e2e-not-required";

/// Prefix of `priority/P<digit>` labels
pub const PRIORITY_PREFIX: &str = "priority/P";
