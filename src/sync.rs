//! Sync Engine - Orchestrates the backup pass
//!
//! This module provides the high-level orchestration that walks root groups,
//! fans out to their projects, and reconciles each project against local disk
//! using the GitClient for actual git operations.

use crate::config::Config;
use crate::git::{GitClient, SyncResult};
use crate::gitlab::{GitLabClient, Project};
use anyhow::{anyhow, Context, Result};
use path_clean::PathClean;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Results from a complete backup pass
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub groups_processed: usize,
    pub total_projects: usize,
    pub cloned: usize,
    pub pulled: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration: Duration,
    pub results: Vec<SyncResult>,
}

/// The main engine driving discovery and reconciliation.
///
/// Work is strictly sequential: one API request or one git subprocess in
/// flight at a time. Per-project failures are contained in the summary and
/// never abort sibling work; only filesystem errors are fatal.
pub struct SyncEngine {
    config: Arc<Config>,
    gitlab: GitLabClient,
    git: GitClient,
}

impl SyncEngine {
    /// Create a new sync engine with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let gitlab = GitLabClient::new(&config)?;
        let git = GitClient::new(&config);

        Ok(Self {
            config: Arc::new(config),
            gitlab,
            git,
        })
    }

    /// Create from existing clients (used by tests to inject collaborators)
    pub fn with_clients(config: Config, gitlab: GitLabClient, git: GitClient) -> Self {
        Self {
            config: Arc::new(config),
            gitlab,
            git,
        }
    }

    /// Run a complete backup pass: discover groups and projects, then
    /// reconcile each project against the backup root.
    pub async fn run(&self) -> Result<SyncSummary> {
        let start_time = Instant::now();

        let root = PathBuf::from(&self.config.base_directory);
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create backup root: {}", root.display()))?;

        info!("Starting GitLab backup");

        let groups = self.gitlab.list_root_groups().await;

        let mut results = Vec::new();
        for group in &groups {
            info!("Processing group: {}", group.full_path);

            let projects = self.gitlab.list_group_projects(group.id).await;

            for project in &projects {
                results.push(self.sync_project(&root, project).await?);
            }
        }

        let summary = compile_summary(groups.len(), results, start_time.elapsed());

        info!(
            "GitLab backup completed: {} cloned, {} pulled, {} skipped, {} failed in {:.2}s",
            summary.cloned,
            summary.pulled,
            summary.skipped,
            summary.failed,
            summary.duration.as_secs_f64()
        );

        Ok(summary)
    }

    /// Discover the projects a run would mirror, without touching the filesystem
    pub async fn discover_projects(&self) -> Vec<Project> {
        let mut all_projects = Vec::new();

        for group in self.gitlab.list_root_groups().await {
            all_projects.extend(self.gitlab.list_group_projects(group.id).await);
        }

        all_projects
    }

    /// Reconcile a single project. Only filesystem errors propagate.
    async fn sync_project(&self, root: &Path, project: &Project) -> Result<SyncResult> {
        if matches_exclusion_pattern(
            &project.path_with_namespace,
            &self.config.gitlab.exclude_patterns,
        ) {
            debug!(
                "Excluding project due to pattern match: {}",
                project.path_with_namespace
            );
            return Ok(SyncResult::Skipped {
                path: PathBuf::from(&project.path_with_namespace),
                reason: "Matched exclusion pattern".to_string(),
            });
        }

        let dest = match project_destination(root, &project.path_with_namespace) {
            Ok(dest) => dest,
            Err(e) => {
                warn!("Skipping {}: {}", project.path_with_namespace, e);
                return Ok(SyncResult::Skipped {
                    path: PathBuf::from(&project.path_with_namespace),
                    reason: e.to_string(),
                });
            }
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create parent directory for {}", dest.display()))?;
        }

        Ok(self
            .git
            .sync_repository(&project.http_url_to_repo, &dest)
            .await)
    }

    /// Get configuration for external inspection
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Map a namespace-qualified project path to its destination under `root`.
///
/// The namespace path comes from the remote API and is used as a relative
/// filesystem path, so it is cleaned and then required to consist solely of
/// normal components: no absolute paths, no `..`, no bare `.`.
pub fn project_destination(root: &Path, namespace_path: &str) -> Result<PathBuf> {
    if namespace_path.is_empty() {
        return Err(anyhow!("Project namespace path is empty"));
    }

    let relative = Path::new(namespace_path).clean();

    let traversal_safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));

    if !traversal_safe {
        return Err(anyhow!(
            "Project namespace path escapes the backup root: {}",
            namespace_path
        ));
    }

    Ok(root.join(relative))
}

/// Check if a project path matches any exclusion pattern
pub fn matches_exclusion_pattern(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        // Simple glob pattern matching
        if pattern.contains('*') {
            let pattern_regex = pattern.replace('.', r"\.").replace('*', ".*");

            regex::Regex::new(&format!("^{}$", pattern_regex))
                .map(|re| re.is_match(name))
                .unwrap_or(false)
        } else {
            name == pattern
        }
    })
}

/// Compile the run summary from per-project results
fn compile_summary(
    groups_processed: usize,
    results: Vec<SyncResult>,
    duration: Duration,
) -> SyncSummary {
    let total_projects = results.len();
    let mut cloned = 0;
    let mut pulled = 0;
    let mut skipped = 0;
    let mut failed = 0;

    for result in &results {
        match result {
            SyncResult::Cloned { .. } => cloned += 1,
            SyncResult::Pulled { .. } => pulled += 1,
            SyncResult::Skipped { .. } => skipped += 1,
            SyncResult::Failed { .. } => failed += 1,
        }
    }

    SyncSummary {
        groups_processed,
        total_projects,
        cloned,
        pulled,
        skipped,
        failed,
        duration,
        results,
    }
}
