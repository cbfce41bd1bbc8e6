//! Tests for window title classification

use lookout::data::WindowHandle;
use lookout::platform::memory::MemoryDesktop;
use lookout::presence::matcher::{KnownNames, WindowCategory, AGENT_LABEL};
use lookout::presence::title::{is_generic_shell_title, strip_leading_symbols};
use lookout::presence::{MatchedWindow, WindowMatcher};
use std::collections::HashMap;

fn known(pairs: &[(&str, &str)]) -> KnownNames {
    pairs
        .iter()
        .map(|(name, id)| (name.to_string(), id.to_string()))
        .collect()
}

mod symbol_stripping {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_emoji_prefix() {
        assert_eq!(strip_leading_symbols("🤖 My Session"), "My Session");
    }

    #[test]
    fn plain_title_is_unchanged() {
        assert_eq!(strip_leading_symbols("My Session"), "My Session");
    }

    #[test]
    fn stripping_is_idempotent() {
        for title in ["🤖 My Session", "⏳✨ Build", "My Session", "", "   ", "$ budget"] {
            let once = strip_leading_symbols(title);
            assert_eq!(strip_leading_symbols(once), once, "{:?}", title);
        }
    }

    #[test]
    fn strips_emoji_with_variation_selector_and_zwj() {
        assert_eq!(strip_leading_symbols("❤\u{fe0f} Session"), "Session");
        assert_eq!(strip_leading_symbols("👩\u{200d}💻 Session"), "Session");
    }

    #[test]
    fn keeps_letters_digits_and_punctuation() {
        assert_eq!(strip_leading_symbols("2 fixes"), "2 fixes");
        assert_eq!(strip_leading_symbols("[wip] Task"), "[wip] Task");
    }
}

mod generic_shell_titles {
    use super::*;

    fn defaults() -> Vec<String> {
        lookout::config::PresenceConfig::default().generic_shell_titles
    }

    #[test]
    fn recognises_unrenamed_shells() {
        assert!(is_generic_shell_title("Windows PowerShell", &defaults()));
        assert!(is_generic_shell_title("bash", &defaults()));
        assert!(is_generic_shell_title(
            "C:\\WINDOWS\\system32\\cmd.exe",
            &defaults()
        ));
    }

    #[test]
    fn renamed_windows_are_not_generic() {
        assert!(!is_generic_shell_title("Terminal - abc", &defaults()));
        assert!(!is_generic_shell_title("🤖 Fix login", &defaults()));
    }
}

mod scanning {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn agent_window_found_by_summary() {
        let desktop = MemoryDesktop::new();
        let agent = desktop.open_window("🤖 Fix login bug", Some(10));
        desktop.open_window("Inbox - Mail", Some(11));

        let matched = WindowMatcher::default().scan(&desktop, &known(&[("Fix login bug", "s1")]));
        assert_eq!(matched.len(), 1);
        let windows = &matched["s1"];
        assert_eq!(windows[0].label, AGENT_LABEL);
        assert_eq!(windows[0].handle, agent);
        assert_eq!(windows[0].category, WindowCategory::AgentWindow);
        assert_eq!(windows[0].title, "🤖 Fix login bug");
    }

    #[test]
    fn numbered_terminals_keep_discovery_order() {
        let desktop = MemoryDesktop::new();
        desktop.open_window("Terminal - id1", None);
        desktop.open_window("Terminal #2 - id1", None);

        let matched = WindowMatcher::default().scan(&desktop, &KnownNames::new());
        let labels: Vec<_> = matched["id1"].iter().map(|w| w.label.as_str()).collect();
        assert_eq!(labels, vec!["Terminal", "Terminal #2"]);
    }

    #[test]
    fn duplicate_terminals_are_numbered() {
        let desktop = MemoryDesktop::new();
        desktop.open_window("Terminal - id1", None);
        desktop.open_window("Terminal - id2", None);
        desktop.open_window("Terminal - id1", None);

        let matched = WindowMatcher::default().scan(&desktop, &KnownNames::new());
        let labels: Vec<_> = matched["id1"].iter().map(|w| w.label.as_str()).collect();
        assert_eq!(labels, vec!["Terminal #1", "Terminal #2"]);
        assert_eq!(matched["id2"][0].label, "Terminal");
    }

    #[test]
    fn torn_down_window_does_not_abort_scan() {
        let desktop = MemoryDesktop::new();
        let broken = desktop.open_window("Terminal - id1", None);
        desktop.break_title(broken);
        let ok = desktop.open_window("Copilot CLI - id1", None);

        let matched = WindowMatcher::default().scan(&desktop, &KnownNames::new());
        assert_eq!(matched["id1"].len(), 1);
        assert_eq!(matched["id1"][0].handle, ok);
    }

    #[test]
    fn pure_match_agrees_with_scan() {
        let desktop = MemoryDesktop::new();
        let a = desktop.open_window("Copilot CLI - s1", None);
        let b = desktop.open_window("Terminal - s1", None);
        let matcher = WindowMatcher::default();

        let scanned = matcher.scan(&desktop, &KnownNames::new());
        let pure = matcher.match_titles(
            &[
                (a, "Copilot CLI - s1".to_string()),
                (b, "Terminal - s1".to_string()),
            ],
            &KnownNames::new(),
        );
        let handles = |m: &HashMap<String, Vec<MatchedWindow>>| -> Vec<WindowHandle> {
            m["s1"].iter().map(|w| w.handle).collect()
        };
        assert_eq!(handles(&scanned), handles(&pure));
    }
}
