use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque OS identifier for a top-level window.
///
/// Handles are claimed pointers: they may be reused or torn down at any
/// moment, so every consumer re-checks liveness before acting on one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Opaque OS process identifier. `0` means "no owning process tracked".
pub type ProcessId = u32;

/// A logical work session, as reported by the external session store.
///
/// Read-only to this crate: sessions are observed, never created or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Summary derived by the agent (e.g. from the first prompt)
    #[serde(default)]
    pub summary: Option<String>,
    /// User-provided override for the display name
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub working_directory: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: None,
            alias: None,
            working_directory: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Alias wins over summary; sessions with neither show a short id.
    pub fn display_name(&self) -> String {
        self.alias
            .as_deref()
            .or(self.summary.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.id.chars().take(8).collect())
    }
}

/// Kind of surface tracked for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    Terminal,
    AgentWindow,
    Editor,
    FileBrowser,
    BrowserWorkspace,
}

impl SurfaceKind {
    /// Kinds discovered by title enumeration are rediscovered every pass;
    /// everything else has to be carried across passes (and restarts).
    pub fn is_title_discovered(&self) -> bool {
        matches!(self, Self::Terminal | Self::AgentWindow)
    }
}

/// What is currently live for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackedSurface {
    Terminal {
        instance: u32,
        handle: WindowHandle,
    },
    /// The agent's own window; its title may carry a transient status prefix
    AgentWindow {
        instance: u32,
        handle: WindowHandle,
        title: String,
    },
    EditorProcess {
        name: String,
        process_id: ProcessId,
        handle: WindowHandle,
        folder_hint: Option<String>,
    },
    FileBrowserWindow {
        handle: WindowHandle,
    },
    BrowserWorkspace {
        anchor_marker: String,
        handle: WindowHandle,
    },
}

impl TrackedSurface {
    pub fn kind(&self) -> SurfaceKind {
        match self {
            Self::Terminal { .. } => SurfaceKind::Terminal,
            Self::AgentWindow { .. } => SurfaceKind::AgentWindow,
            Self::EditorProcess { .. } => SurfaceKind::Editor,
            Self::FileBrowserWindow { .. } => SurfaceKind::FileBrowser,
            Self::BrowserWorkspace { .. } => SurfaceKind::BrowserWorkspace,
        }
    }

    pub fn handle(&self) -> WindowHandle {
        match self {
            Self::Terminal { handle, .. }
            | Self::AgentWindow { handle, .. }
            | Self::EditorProcess { handle, .. }
            | Self::FileBrowserWindow { handle }
            | Self::BrowserWorkspace { handle, .. } => *handle,
        }
    }
}

/// Classification of what a session's agent is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Not authoritative: callers keep whatever they knew before
    #[default]
    Unknown,
    Working,
    /// Idle and may announce "ready"
    Idle,
    /// Idle, but must not announce (abort, mode switch, decayed work)
    IdleSilent,
}

impl SessionStatus {
    pub fn is_working(&self) -> bool {
        matches!(self, Self::Working)
    }

    pub fn is_authoritative(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Per-session indicator exposed to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    #[default]
    Idle,
    Working,
    /// Session finished and needs attention
    Bell,
}

/// Rotating arc shown while a session works, one frame per refresh
pub const SPINNER_FRAMES: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

impl Indicator {
    /// Icon for refresh `frame`; only `Working` animates
    pub fn icon(&self, frame: u64) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Working => SPINNER_FRAMES[(frame % SPINNER_FRAMES.len() as u64) as usize],
            Self::Bell => "🔔",
        }
    }
}
