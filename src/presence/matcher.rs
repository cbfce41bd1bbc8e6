//! Window title classification.
//!
//! Each top-level window title is run through an ordered list of rules; the
//! first rule that recognises the title decides which session the window
//! belongs to and how it is labelled.
//!
//! | Title | Label |
//! |-------|-------|
//! | `Copilot CLI - {id}` | `Copilot CLI` |
//! | `Terminal - {id}` | `Terminal` |
//! | `Terminal #N - {id}` | `Terminal #N` |
//! | `{emoji} {known display name}` | `Copilot CLI` |

use super::title::strip_leading_symbols;
use crate::data::{ProcessId, WindowHandle};
use crate::platform::WindowSystem;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

pub const AGENT_LABEL: &str = "Copilot CLI";
pub const TERMINAL_LABEL: &str = "Terminal";

static NUMBERED_TERMINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Terminal #(\d+) - (\S+)\s*$").expect("valid regex"));

/// Display name -> session id, for sessions whose agent renames its window
pub type KnownNames = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowCategory {
    AgentWindow,
    Terminal,
}

impl WindowCategory {
    /// Label stem used when windows of this category are renumbered
    pub fn base_label(&self) -> &'static str {
        match self {
            Self::AgentWindow => AGENT_LABEL,
            Self::Terminal => TERMINAL_LABEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMatch {
    pub session_id: String,
    pub label: String,
    pub category: WindowCategory,
    /// Instance number carried by the title itself (`Terminal #3`)
    pub explicit_instance: Option<u32>,
}

/// A window attributed to a session during one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedWindow {
    pub label: String,
    pub title: String,
    pub handle: WindowHandle,
    pub category: WindowCategory,
    pub instance: u32,
    /// Owning process, when the enumeration reported one
    pub process_id: Option<ProcessId>,
}

pub trait TitleRule: Send + Sync {
    fn classify(&self, title: &str, known: &KnownNames) -> Option<TitleMatch>;
}

/// `"{prefix}{id}"` titles set by windows this tool launched itself
pub struct PrefixRule {
    prefix: &'static str,
    label: &'static str,
    category: WindowCategory,
}

impl PrefixRule {
    pub const fn new(prefix: &'static str, label: &'static str, category: WindowCategory) -> Self {
        Self {
            prefix,
            label,
            category,
        }
    }
}

impl TitleRule for PrefixRule {
    fn classify(&self, title: &str, _known: &KnownNames) -> Option<TitleMatch> {
        let id = title.strip_prefix(self.prefix)?.trim();
        if id.is_empty() || id.contains(char::is_whitespace) {
            return None;
        }
        Some(TitleMatch {
            session_id: id.to_string(),
            label: self.label.to_string(),
            category: self.category,
            explicit_instance: None,
        })
    }
}

/// `"Terminal #N - {id}"`
pub struct NumberedTerminalRule;

impl TitleRule for NumberedTerminalRule {
    fn classify(&self, title: &str, _known: &KnownNames) -> Option<TitleMatch> {
        let caps = NUMBERED_TERMINAL.captures(title)?;
        let number: u32 = caps[1].parse().ok()?;
        Some(TitleMatch {
            session_id: caps[2].to_string(),
            label: format!("{} #{}", TERMINAL_LABEL, number),
            category: WindowCategory::Terminal,
            explicit_instance: Some(number),
        })
    }
}

/// The agent renames its own window to the session summary, so its window
/// is recognised by content rather than by an id suffix.
pub struct KnownNameRule;

impl TitleRule for KnownNameRule {
    fn classify(&self, title: &str, known: &KnownNames) -> Option<TitleMatch> {
        let name = strip_leading_symbols(title).trim();
        let session_id = known.get(name)?;
        Some(TitleMatch {
            session_id: session_id.clone(),
            label: AGENT_LABEL.to_string(),
            category: WindowCategory::AgentWindow,
            explicit_instance: None,
        })
    }
}

pub struct WindowMatcher {
    rules: Vec<Box<dyn TitleRule>>,
}

impl Default for WindowMatcher {
    fn default() -> Self {
        Self::new(vec![
            Box::new(PrefixRule::new(
                "Copilot CLI - ",
                AGENT_LABEL,
                WindowCategory::AgentWindow,
            )),
            Box::new(PrefixRule::new(
                "Terminal - ",
                TERMINAL_LABEL,
                WindowCategory::Terminal,
            )),
            Box::new(NumberedTerminalRule),
            Box::new(KnownNameRule),
        ])
    }
}

impl WindowMatcher {
    pub fn new(rules: Vec<Box<dyn TitleRule>>) -> Self {
        Self { rules }
    }

    /// First rule (in priority order) that recognises the title
    pub fn classify(&self, title: &str, known: &KnownNames) -> Option<TitleMatch> {
        self.rules.iter().find_map(|rule| rule.classify(title, known))
    }

    /// Classify already-read titles, preserving enumeration order per session.
    ///
    /// Labels stay as classified while they are unique within a session.
    /// When two windows of one category collide, every window of that
    /// category is renumbered `{base} #1`, `{base} #2`, ... in enumeration
    /// order.
    pub fn match_titles(
        &self,
        windows: &[(WindowHandle, String)],
        known: &KnownNames,
    ) -> HashMap<String, Vec<MatchedWindow>> {
        let mut matched: HashMap<String, Vec<(TitleMatch, WindowHandle, String)>> = HashMap::new();
        for (handle, title) in windows {
            if let Some(m) = self.classify(title, known) {
                matched
                    .entry(m.session_id.clone())
                    .or_default()
                    .push((m, *handle, title.clone()));
            }
        }

        matched
            .into_iter()
            .map(|(session_id, entries)| {
                let mut labels: HashSet<&str> = HashSet::new();
                let mut colliding: HashSet<WindowCategory> = HashSet::new();
                for (m, _, _) in &entries {
                    if !labels.insert(m.label.as_str()) {
                        colliding.insert(m.category);
                    }
                }

                let mut seen: HashMap<WindowCategory, u32> = HashMap::new();
                let windows = entries
                    .iter()
                    .map(|(m, handle, title)| {
                        let (label, instance) = if colliding.contains(&m.category) {
                            let nth = seen.entry(m.category).or_default();
                            *nth += 1;
                            (format!("{} #{}", m.category.base_label(), nth), *nth)
                        } else {
                            (m.label.clone(), m.explicit_instance.unwrap_or(1))
                        };
                        MatchedWindow {
                            label,
                            title: title.clone(),
                            handle: *handle,
                            category: m.category,
                            instance,
                            process_id: None,
                        }
                    })
                    .collect();
                (session_id, windows)
            })
            .collect()
    }

    /// Enumerate the desktop once and classify every window.
    ///
    /// A window whose title cannot be read (torn down mid-enumeration) is
    /// skipped; it never aborts the scan.
    pub fn scan(
        &self,
        windows: &dyn WindowSystem,
        known: &KnownNames,
    ) -> HashMap<String, Vec<MatchedWindow>> {
        let listing = match windows.top_level_windows() {
            Ok(listing) => listing,
            Err(e) => {
                tracing::debug!("Window enumeration failed: {:#}", e);
                return HashMap::new();
            }
        };

        let owners: HashMap<WindowHandle, ProcessId> = listing
            .iter()
            .filter_map(|w| Some((w.handle, w.process_id?)))
            .collect();

        let titled: Vec<(WindowHandle, String)> = listing
            .into_iter()
            .filter_map(|w| match windows.window_title(w.handle) {
                Ok(title) => Some((w.handle, title)),
                Err(e) => {
                    tracing::trace!("Skipping window {}: {:#}", w.handle, e);
                    None
                }
            })
            .collect();

        let mut matched = self.match_titles(&titled, known);
        for window in matched.values_mut().flatten() {
            window.process_id = owners.get(&window.handle).copied();
        }
        matched
    }
}
