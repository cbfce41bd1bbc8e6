//! Workspace markers and the anchor document that carries them.
//!
//! A workspace's anchor tab is titled
//! `"[{label}] Lookout Workspace [{token}]"` (the label part is optional).
//! The anchor page builds that title itself from its location fragment, so
//! opening a workspace is just launching the browser at
//! `file://…/anchor.html#marker={token}&name={label}`.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const MARKER_PREFIX: &str = "Lookout Workspace";

const ANCHOR_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Lookout Workspace</title>
<style>
  body { font-family: sans-serif; margin: 3em; color: #444; }
  h1 { font-weight: 500; }
</style>
</head>
<body>
<h1 id="name">Lookout Workspace</h1>
<p>Keep this tab open: it lets lookout find this window again.</p>
<script>
  const params = new URLSearchParams(window.location.hash.slice(1));
  const marker = params.get("marker") || "";
  const name = params.get("name") || "";
  document.title = (name ? "[" + name + "] " : "") + "Lookout Workspace [" + marker + "]";
  if (name) { document.getElementById("name").textContent = name; }
</script>
</body>
</html>
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceMarker {
    pub token: String,
    pub label: Option<String>,
}

impl WorkspaceMarker {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The part of the anchor title that identifies this workspace
    pub fn needle(&self) -> String {
        format!("{} [{}]", MARKER_PREFIX, self.token)
    }

    /// Full anchor tab title, as the anchor page sets it
    pub fn tab_title(&self) -> String {
        match &self.label {
            Some(label) => format!("[{}] {}", label, self.needle()),
            None => self.needle(),
        }
    }

    pub fn matches(&self, title: &str) -> bool {
        title.contains(&self.needle())
    }
}

/// The local page the browser is pointed at when a workspace opens
pub struct AnchorDocument {
    path: PathBuf,
}

impl AnchorDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the anchor page if it is missing or out of date
    pub fn ensure(&self) -> Result<()> {
        if fs::read_to_string(&self.path).is_ok_and(|existing| existing == ANCHOR_HTML) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, ANCHOR_HTML)
            .with_context(|| format!("Failed to write anchor document {}", self.path.display()))
    }

    pub fn url(&self, marker: &WorkspaceMarker) -> String {
        let path = self.path.to_string_lossy().replace('\\', "/");
        let path = urlencoding::encode(&path).replace("%2F", "/").replace("%3A", ":");
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        format!(
            "file://{}#marker={}&name={}",
            path,
            urlencoding::encode(&marker.token),
            urlencoding::encode(marker.label.as_deref().unwrap_or(""))
        )
    }
}

/// Title the anchor page gives itself for a launch URL, mirroring its script
pub fn title_from_anchor_url(url: &str) -> Option<String> {
    let (_, fragment) = url.split_once('#')?;
    let mut marker = None;
    let mut name = None;
    for pair in fragment.split('&') {
        let (key, value) = pair.split_once('=')?;
        let value = urlencoding::decode(value).ok()?.into_owned();
        match key {
            "marker" => marker = Some(value),
            "name" => name = Some(value).filter(|n| !n.is_empty()),
            _ => {}
        }
    }
    let mut workspace = WorkspaceMarker::new(marker?);
    workspace.label = name;
    Some(workspace.tab_title())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tab_title_with_and_without_label() {
        let marker = WorkspaceMarker::new("abc-123");
        assert_eq!(marker.tab_title(), "Lookout Workspace [abc-123]");

        let marker = marker.with_label("Fix login");
        assert_eq!(marker.tab_title(), "[Fix login] Lookout Workspace [abc-123]");
        assert!(marker.matches("[Fix login] Lookout Workspace [abc-123] - Chromium"));
        assert!(!marker.matches("Lookout Workspace [abc-1234]"));
    }

    #[test]
    fn test_matches_opaque_tokens() {
        for token in ["team:alpha", "fix+login", "has space", "s2.b"] {
            let marker = WorkspaceMarker::new(token).with_label("x");
            assert!(marker.matches(&marker.tab_title()), "{}", token);
        }
        assert!(!WorkspaceMarker::new("team").matches("Lookout Workspace [team:alpha]"));
    }

    #[test]
    fn test_anchor_url_round_trips_title() {
        let temp_dir = TempDir::new().unwrap();
        let anchor = AnchorDocument::new(temp_dir.path().join("my dir/anchor.html"));
        let marker = WorkspaceMarker::new("s1").with_label("Fix & ship");

        let url = anchor.url(&marker);
        assert!(url.starts_with("file:///"));
        assert!(url.contains("my%20dir/anchor.html#marker=s1&name=Fix%20%26%20ship"));
        assert_eq!(
            title_from_anchor_url(&url).as_deref(),
            Some("[Fix & ship] Lookout Workspace [s1]")
        );
    }

    #[test]
    fn test_ensure_writes_once() {
        let temp_dir = TempDir::new().unwrap();
        let anchor = AnchorDocument::new(temp_dir.path().join("data/anchor.html"));
        anchor.ensure().unwrap();
        anchor.ensure().unwrap();
        let content = fs::read_to_string(anchor.path()).unwrap();
        assert!(content.contains("Lookout Workspace ["));
    }
}
