//! GitHub repository snapshot fetcher.
//!
//! Pulls repo metadata and a bounded, size-capped set of representative
//! text files through the GitHub REST API. Works unauthenticated; a token
//! raises the rate limit and unlocks private repos.

use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::constants::{
    GITHUB_API, GITHUB_RAW, GITHUB_TIMEOUT_SECS, SNAPSHOT_BUDGET_CHARS, SNAPSHOT_MAX_FILES,
    SNAPSHOT_PER_FILE_CHARS,
};
use crate::keys::KeyStore;

/// Repository identifier parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn pretty(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// One fetched file, already truncated to the per-file cap.
#[derive(Debug, Clone)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
}

/// Everything the prompt builder needs about a repository.
#[derive(Debug, Clone)]
pub struct RepoSnapshot {
    pub id: RepoId,
    pub default_branch: String,
    pub description: Option<String>,
    pub files: Vec<RepoFile>,
}

/// Parse `https://github.com/owner/repo[/...]` or bare `owner/repo`.
pub fn parse_repo_url(input: &str) -> Option<RepoId> {
    let trimmed = input.trim();

    let rest = trimmed
        .strip_prefix("https://github.com/")
        .or_else(|| trimmed.strip_prefix("http://github.com/"))
        .or_else(|| trimmed.strip_prefix("github.com/"));

    if let Some(rest) = rest {
        let mut parts = rest.split('/');
        let owner = parts.next()?;
        let name = parts.next()?.trim_end_matches(".git");
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        return Some(RepoId { owner: owner.to_string(), name: name.to_string() });
    }

    // Any other URL is not a GitHub repo.
    if trimmed.contains("://") {
        return None;
    }

    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
        return Some(RepoId {
            owner: parts[0].to_string(),
            name: parts[1].trim_end_matches(".git").to_string(),
        });
    }
    None
}

#[derive(Debug, Deserialize)]
struct RepoMetaResponse {
    default_branch: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeItem>,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    item_type: String,
}

/// GitHub REST client
pub struct GithubClient {
    client: Client,
    token: Option<SecretString>,
}

impl GithubClient {
    pub fn new(keys: &KeyStore) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(GITHUB_TIMEOUT_SECS))
            .user_agent("readme-pilot")
            .build()
            .expect("failed to build reqwest client");
        Self { client, token: keys.github_token().cloned() }
    }

    /// Fetch a full snapshot: metadata, recursive tree, then the most
    /// important textual files within the character budgets.
    pub fn fetch_snapshot(&self, input: &str) -> Result<RepoSnapshot, String> {
        let id = parse_repo_url(input).ok_or_else(|| {
            "Enter a valid GitHub URL like https://github.com/owner/repo or owner/repo".to_string()
        })?;

        let meta: RepoMetaResponse =
            self.get_json(&format!("{}/repos/{}/{}", GITHUB_API, id.owner, id.name))?;
        let tree: TreeResponse = self.get_json(&format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            GITHUB_API, id.owner, id.name, meta.default_branch
        ))?;

        let mut candidates: Vec<&TreeItem> = tree
            .tree
            .iter()
            .filter(|t| t.item_type == "blob" && looks_textual(&t.path))
            .collect();
        candidates.sort_by(|a, b| importance(&b.path).cmp(&importance(&a.path)));
        candidates.truncate(SNAPSHOT_MAX_FILES);

        let mut files = Vec::new();
        let mut used = 0usize;

        for item in candidates {
            let url = format!(
                "{}/{}/{}/{}/{}",
                GITHUB_RAW, id.owner, id.name, meta.default_branch, item.path
            );
            // A single unreadable file should not sink the snapshot.
            let Ok(mut text) = self.get_text(&url) else {
                continue;
            };
            if text.len() > SNAPSHOT_PER_FILE_CHARS {
                let mut cut = SNAPSHOT_PER_FILE_CHARS;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
                text.push_str("\n/* …truncated… */");
            }
            if used + text.len() > SNAPSHOT_BUDGET_CHARS {
                break;
            }
            used += text.len();
            files.push(RepoFile { path: item.path.clone(), content: text });
        }

        Ok(RepoSnapshot {
            id,
            default_branch: meta.default_branch,
            description: meta.description,
            files,
        })
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, String> {
        let response = self
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .map_err(|e| format!("Request failed: {}", e))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(format!(
                "{} {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("error"),
                url
            ));
        }
        response.json::<T>().map_err(|e| format!("Failed to parse response: {}", e))
    }

    fn get_text(&self, url: &str) -> Result<String, String> {
        let response = self.get(url).send().map_err(|e| format!("Request failed: {}", e))?;
        if !response.status().is_success() {
            return Err(format!("{}: {}", response.status().as_u16(), url));
        }
        response.text().map_err(|e| format!("Failed to read response: {}", e))
    }

    fn get(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        let mut builder = self.client.get(url);
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {}", token.expose_secret()));
        }
        builder
    }
}

const TEXTUAL_EXTS: &[&str] = &[
    "md", "mdx", "txt", "js", "jsx", "ts", "tsx", "json", "yml", "yaml", "toml", "xml", "html",
    "css", "scss", "less", "py", "rb", "go", "java", "kt", "rs", "c", "cpp", "h", "cs", "php",
    "sh", "env", "dockerfile", "gradle", "properties",
];

/// Whether a tree path looks like a text file worth including.
pub fn looks_textual(path: &str) -> bool {
    let lower = path.to_lowercase();
    if lower.ends_with(".min.js") {
        return false;
    }
    let ext = lower.rsplit('.').next().unwrap_or("");
    TEXTUAL_EXTS.contains(&ext) || lower == "dockerfile" || lower == "makefile"
}

/// Importance score for snapshot file selection. Docs and manifests
/// first, then shallow source and examples.
pub fn importance(path: &str) -> i32 {
    let l = path.to_lowercase();
    let mut s = 0;
    if l.ends_with("/readme.md") || l == "readme.md" {
        s += 100;
    }
    if l == "package.json" || l == "cargo.toml" {
        s += 95;
    }
    if l.contains("contributing") {
        s += 70;
    }
    if l.contains("docs/") {
        s += 70;
    }
    if l.ends_with("requirements.txt") || l.ends_with("pyproject.toml") {
        s += 70;
    }
    if l.ends_with("pom.xml") || l.ends_with("build.gradle") {
        s += 60;
    }
    if l.ends_with("go.mod") {
        s += 60;
    }
    if l.starts_with("src/") && l.split('/').count() <= 3 {
        s += 40;
    }
    if l.contains("example") || l.contains("sample") {
        s += 35;
    }
    if l.contains("license") {
        s += 20;
    }
    s
}
