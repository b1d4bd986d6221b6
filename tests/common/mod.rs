/// Common test utilities and helpers for labmirror tests
use std::path::{Path, PathBuf};

use labmirror::Config;
use serde_json::{json, Value};

/// Build a config pointing at a mock GitLab instance and a temp backup root
pub fn test_config(instance: &str, base_directory: &Path) -> Config {
    let mut config = Config::default();
    config.base_directory = base_directory.to_string_lossy().into_owned();
    config.gitlab.instance = instance.to_string();
    config.gitlab.token = Some("glpat-test-token".to_string());
    config.http.timeout = 5;
    config.sync.git_timeout = 10;
    config
}

/// Write a fake git executable that records its argv, one invocation per
/// line, into `log_path`. A clone invocation creates the destination
/// directory the way real git would; the failing variant writes to stderr
/// and exits non-zero without touching the filesystem.
pub fn write_fake_git(dir: &Path, log_path: &Path, fail: bool) -> PathBuf {
    let script_path = dir.join("fake-git");

    let body = if fail {
        format!(
            "#!/bin/sh\n\
             echo \"$@\" >> \"{log}\"\n\
             echo \"fatal: could not read from remote repository\" >&2\n\
             exit 1\n",
            log = log_path.display()
        )
    } else {
        format!(
            "#!/bin/sh\n\
             echo \"$@\" >> \"{log}\"\n\
             if [ \"$1\" = \"clone\" ]; then\n\
                 mkdir -p \"$3\"\n\
             fi\n\
             exit 0\n",
            log = log_path.display()
        )
    };

    std::fs::write(&script_path, body).expect("Failed to write fake git script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake git executable");
    }

    script_path
}

/// Read the fake git invocation log, one recorded argv per line
pub fn read_git_log(log_path: &Path) -> Vec<String> {
    if !log_path.exists() {
        return Vec::new();
    }

    std::fs::read_to_string(log_path)
        .expect("Failed to read fake git log")
        .lines()
        .map(str::to_string)
        .collect()
}

/// JSON body for a single group
pub fn group_json(id: u64, full_path: &str) -> Value {
    json!({
        "id": id,
        "full_path": full_path,
        "name": full_path.rsplit('/').next().unwrap_or(full_path),
        "visibility": "private"
    })
}

/// JSON body for a single project
pub fn project_json(id: u64, path_with_namespace: &str, instance: &str) -> Value {
    json!({
        "id": id,
        "path_with_namespace": path_with_namespace,
        "http_url_to_repo": format!("{}/{}.git", instance, path_with_namespace),
        "default_branch": "main"
    })
}

/// A full page of generated projects, ids and paths numbered from `start`
pub fn project_page(start: u64, count: u64, instance: &str) -> Value {
    let items: Vec<Value> = (start..start + count)
        .map(|i| project_json(i, &format!("bulk/project-{}", i), instance))
        .collect();
    Value::Array(items)
}
