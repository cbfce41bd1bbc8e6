//! X11 desktop adapter driven through the `wmctrl` and `xdotool` CLIs.
//!
//! Browsers do not expose their tab strip to these tools, so the browser
//! side is title-only: every browser window reports its active tab as its
//! single tab, and address reads are unsupported.

use super::{BrowserAutomation, BrowserTab, WindowInfo, WindowSystem};
use crate::config::BrowserConfig;
use crate::data::WindowHandle;
use anyhow::{bail, Context, Result};
use std::process::{Command, Stdio};

pub struct CommandDesktop {
    browser_command: String,
    browser_classes: Vec<String>,
}

impl CommandDesktop {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            browser_command: config.command.clone(),
            browser_classes: config
                .window_classes
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
        }
    }

    fn is_browser_class(&self, class: &str) -> bool {
        let class = class.to_lowercase();
        self.browser_classes.iter().any(|c| class.contains(c.as_str()))
    }
}

fn run<const N: usize>(program: &str, args: [&str; N]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to run {}", program))?;

    if !output.status.success() {
        bail!(
            "{} {:?} exited with {}: {}",
            program,
            args,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Parse `wmctrl -lpx` output: `<id> <desktop> <pid> <class> <host> <title>`
pub fn parse_wmctrl_listing(output: &str) -> Vec<WindowInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let id = parts.next()?;
            let _desktop = parts.next()?;
            let pid = parts.next()?;
            let class = parts.next()?;

            let handle = u64::from_str_radix(id.trim_start_matches("0x"), 16).ok()?;
            let process_id = pid.parse::<u32>().ok().filter(|pid| *pid != 0);

            Some(WindowInfo {
                handle: WindowHandle(handle),
                process_id,
                class: Some(class.to_string()).filter(|c| c != "N/A"),
            })
        })
        .collect()
}

impl WindowSystem for CommandDesktop {
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>> {
        let output = run("wmctrl", ["-l", "-p", "-x"])?;
        Ok(parse_wmctrl_listing(&output))
    }

    fn window_title(&self, handle: WindowHandle) -> Result<String> {
        let id = handle.0.to_string();
        let title = run("xdotool", ["getwindowname", id.as_str()])?;
        Ok(title.trim_end_matches('\n').to_string())
    }

    fn is_window(&self, handle: WindowHandle) -> bool {
        self.window_title(handle).is_ok()
    }

    fn minimize(&self, handle: WindowHandle) -> Result<()> {
        let id = handle.0.to_string();
        run("xdotool", ["windowminimize", id.as_str()]).map(|_| ())
    }

    fn focus(&self, handle: WindowHandle) -> Result<()> {
        let id = handle.to_string();
        run("wmctrl", ["-i", "-a", id.as_str()]).map(|_| ())
    }
}

impl BrowserAutomation for CommandDesktop {
    fn browser_windows(&self) -> Result<Vec<WindowHandle>> {
        Ok(self
            .top_level_windows()?
            .into_iter()
            .filter(|w| w.class.as_deref().is_some_and(|c| self.is_browser_class(c)))
            .map(|w| w.handle)
            .collect())
    }

    fn tabs(&self, window: WindowHandle) -> Result<Vec<BrowserTab>> {
        Ok(vec![BrowserTab {
            title: self.window_title(window)?,
            selected: true,
        }])
    }

    fn select_tab(&self, window: WindowHandle, index: usize) -> Result<()> {
        if index != 0 {
            bail!("window {} only exposes its active tab", window);
        }
        Ok(())
    }

    fn address(&self, window: WindowHandle) -> Result<String> {
        bail!("address field of {} is not observable without accessibility", window)
    }

    fn new_tab(&self, window: WindowHandle) -> Result<()> {
        let id = window.0.to_string();
        run("xdotool", ["key", "--window", id.as_str(), "ctrl+t"]).map(|_| ())
    }

    fn launch(&self, url: &str) -> Result<()> {
        Command::new(&self.browser_command)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch {}", self.browser_command))?;
        Ok(())
    }
}
