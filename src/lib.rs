//! labmirror - GitLab Group Backup Tool
//!
//! labmirror discovers every repository reachable under the top-level groups of a
//! GitLab instance and mirrors them onto local disk, cloning new projects and
//! pulling existing clones.
//!
//! ## Core Features
//!
//! - **GitLab Integration**: Automatic project discovery via the GitLab REST API
//! - **Clone-or-Pull Reconciliation**: Local directory existence decides clone vs pull
//! - **Failure Containment**: A broken project or a failed API page never aborts the run
//! - **Configuration Management**: YAML-based configuration with XDG compliance
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`gitlab`]: GitLab API integration and paginated fetching
//! - [`git`]: Clone and pull operations over the git binary
//! - [`sync`]: Backup orchestration across groups and projects

pub mod config;
pub mod git;
pub mod gitlab;
pub mod sync;

pub use config::Config;
pub use git::{GitClient, SyncAction, SyncResult};
pub use gitlab::{GitLabClient, Group, Project};
pub use sync::{SyncEngine, SyncSummary};
