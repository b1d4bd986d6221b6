use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Request header carrying the personal access token
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// GitLab caps per_page at 100; larger values are silently truncated server-side
const MAX_PER_PAGE: u32 = 100;

/// A top-level GitLab group as returned by the groups endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub id: u64,
    pub full_path: String,
}

/// A GitLab project with the fields needed to mirror it locally
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    pub path_with_namespace: String,
    pub http_url_to_repo: String,
}

/// GitLab client wrapper with token management and paginated fetching
pub struct GitLabClient {
    http: reqwest::Client,
    base_url: String,
    per_page: u32,
    min_access_level: u32,
    include_subgroups: bool,
}

impl GitLabClient {
    /// Create a new GitLab client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let token = resolve_token(config)?;

        let mut token_value = HeaderValue::from_str(&token)
            .context("Access token contains characters not valid in an HTTP header")?;
        token_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, token_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.http.timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: format!("{}/api/v4", config.instance_url()),
            per_page: config.http.per_page.min(MAX_PER_PAGE),
            min_access_level: config.gitlab.min_access_level,
            include_subgroups: config.gitlab.include_subgroups,
        })
    }

    /// List all root groups visible to the token
    pub async fn list_root_groups(&self) -> Vec<Group> {
        debug!("Fetching root groups");

        let url = format!("{}/groups", self.base_url);
        let params = [
            ("min_access_level", self.min_access_level.to_string()),
            ("top_level_only", "true".to_string()),
        ];

        let groups: Vec<Group> = self.fetch_all(&url, &params).await;

        info!("Found {} root groups", groups.len());
        groups
    }

    /// List all projects under a group, flattening its subgroup tree
    pub async fn list_group_projects(&self, group_id: u64) -> Vec<Project> {
        debug!("Fetching projects for group {}", group_id);

        let url = format!("{}/groups/{}/projects", self.base_url, group_id);
        let params = [(
            "include_subgroups",
            self.include_subgroups.to_string(),
        )];

        let projects: Vec<Project> = self.fetch_all(&url, &params).await;

        info!("Found {} projects for group {}", projects.len(), group_id);
        projects
    }

    /// Fetch every page of a paginated endpoint into one ordered sequence.
    ///
    /// Pagination starts at page 1 and ends on the first empty page. A failed
    /// request (transport error, non-2xx status, undecodable body) halts
    /// pagination immediately and returns whatever accumulated so far; callers
    /// must tolerate truncated result sets.
    async fn fetch_all<T: DeserializeOwned>(&self, url: &str, params: &[(&str, String)]) -> Vec<T> {
        let mut results = Vec::new();
        let mut page = 1u32;

        loop {
            let page_params = [
                ("page", page.to_string()),
                ("per_page", self.per_page.to_string()),
            ];

            let response = match self
                .http
                .get(url)
                .query(params)
                .query(&page_params)
                .send()
                .await
                .and_then(|response| response.error_for_status())
            {
                Ok(response) => response,
                Err(e) => {
                    error!("GitLab API error for {} page {}: {}", url, page, e);
                    break;
                }
            };

            let items: Vec<T> = match response.json().await {
                Ok(items) => items,
                Err(e) => {
                    error!("Failed to decode {} page {}: {}", url, page, e);
                    break;
                }
            };

            if items.is_empty() {
                break;
            }

            results.extend(items);
            page += 1;
        }

        results
    }
}

/// Resolve the access token: an explicit config value wins, then the
/// GITLAB_TOKEN environment variable.
fn resolve_token(config: &Config) -> Result<String> {
    let token = match &config.gitlab.token {
        Some(token) if !token.is_empty() => token.clone(),
        _ => env::var("GITLAB_TOKEN").map_err(|_| {
            anyhow!(
                "No GitLab access token found. Please either:\n\
                 1. Set the GITLAB_TOKEN environment variable\n\
                 2. Add `token` to the gitlab section of your config file"
            )
        })?,
    };

    if token.is_empty() {
        return Err(anyhow!("GitLab access token is empty"));
    }

    if !token.starts_with("glpat-") {
        warn!("Access token doesn't look like a GitLab personal access token (should start with glpat-)");
    }

    Ok(token)
}
