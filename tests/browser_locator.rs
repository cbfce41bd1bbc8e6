//! Tests for browser workspace discovery, opening and tab capture

mod test_utils;

use lookout::browser::marker::title_from_anchor_url;
use lookout::browser::WorkspaceMarker;
use lookout::platform::memory::MemoryTab;
use std::time::Duration;
use test_utils::Fixture;

fn anchor(token: &str) -> MemoryTab {
    MemoryTab::new(
        WorkspaceMarker::new(token).with_label("Work").tab_title(),
        format!("file:///anchor.html#marker={}", token),
    )
}

fn page(title: &str, address: &str) -> MemoryTab {
    MemoryTab::new(title, address)
}

mod discovery {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bulk_scan_matches_individual_lookups() {
        let fixture = Fixture::new();
        let w1 = fixture
            .desktop
            .open_browser_window(vec![page("News", "https://news.test"), anchor("s1")], 0);
        let w2 = fixture
            .desktop
            .open_browser_window(vec![anchor("s2"), anchor("s3")], 1);
        fixture
            .desktop
            .open_browser_window(vec![page("Mail", "https://mail.test")], 0);

        let tokens: Vec<String> = ["s1", "s2", "s3", "s4"].iter().map(|s| s.to_string()).collect();

        let bulk = fixture.locator().bulk_scan(&tokens);
        let single = fixture.locator();
        for token in &tokens {
            let looked_up = single.is_open(&WorkspaceMarker::new(token.as_str()));
            assert_eq!(bulk.get(token).copied(), looked_up, "{}", token);
        }
        assert_eq!(bulk["s1"], w1);
        assert_eq!(bulk["s2"], w2);
        assert_eq!(bulk["s3"], w2);
    }

    #[test]
    fn bulk_scan_finds_tokens_with_punctuation() {
        let fixture = Fixture::new();
        let w1 = fixture
            .desktop
            .open_browser_window(vec![anchor("team:alpha"), anchor("fix+login")], 0);
        let w2 = fixture.desktop.open_browser_window(vec![anchor("s2.b")], 0);

        let tokens: Vec<String> = ["team:alpha", "fix+login", "s2.b", "team"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let bulk = fixture.locator().bulk_scan(&tokens);
        let single = fixture.locator();
        for token in &tokens {
            let looked_up = single.is_open(&WorkspaceMarker::new(token.as_str()));
            assert_eq!(bulk.get(token).copied(), looked_up, "{}", token);
        }
        assert_eq!(bulk["team:alpha"], w1);
        assert_eq!(bulk["fix+login"], w1);
        assert_eq!(bulk["s2.b"], w2);
        assert!(!bulk.contains_key("team"));
    }

    #[test]
    fn bulk_scan_enumerates_once() {
        let fixture = Fixture::new();
        for token in ["a", "b", "c"] {
            fixture.desktop.open_browser_window(vec![anchor(token)], 0);
        }
        let locator = fixture.locator();
        let enumerations = fixture.desktop.enumeration_count();
        let scans = fixture.desktop.tab_scan_count();

        let tokens: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(locator.bulk_scan(&tokens).len(), 3);
        assert_eq!(fixture.desktop.enumeration_count() - enumerations, 1);
        assert_eq!(fixture.desktop.tab_scan_count() - scans, 3);
    }

    #[test]
    fn fast_path_inspects_only_the_remembered_window() {
        let fixture = Fixture::new();
        fixture
            .desktop
            .open_browser_window(vec![page("Mail", "https://mail.test")], 0);
        let window = fixture.desktop.open_browser_window(vec![anchor("s1")], 0);
        let locator = fixture.locator();
        let marker = WorkspaceMarker::new("s1");
        assert_eq!(locator.is_open(&marker), Some(window));

        let enumerations = fixture.desktop.enumeration_count();
        let scans = fixture.desktop.tab_scan_count();
        assert_eq!(locator.is_open(&marker), Some(window));
        assert_eq!(fixture.desktop.enumeration_count(), enumerations);
        assert_eq!(fixture.desktop.tab_scan_count() - scans, 1);
    }

    #[test]
    fn anchor_found_when_another_tab_is_selected() {
        let fixture = Fixture::new();
        let window = fixture
            .desktop
            .open_browser_window(vec![anchor("s1"), page("Docs", "https://docs.test")], 1);
        let locator = fixture.locator();
        assert_eq!(locator.is_open(&WorkspaceMarker::new("s1")), Some(window));
    }
}

mod opening {
    use super::*;
    use pretty_assertions::assert_eq;

    fn open_anchor_windows(fixture: &Fixture) {
        fixture.desktop.on_launch(|url| {
            title_from_anchor_url(url).map(|title| vec![MemoryTab::new(title, url)])
        });
    }

    #[tokio::test]
    async fn open_waits_for_anchor_then_adds_a_tab() {
        let fixture = Fixture::new();
        open_anchor_windows(&fixture);
        let locator = fixture.locator();
        let marker = WorkspaceMarker::new("s1").with_label("Fix login");

        let restore = vec!["https://docs.test".to_string()];
        let window = locator
            .open(&marker, Duration::from_secs(2), &restore)
            .await
            .unwrap();

        let launched = fixture.desktop.launched_urls();
        assert_eq!(launched.len(), 2);
        assert!(launched[0].contains("#marker=s1&name=Fix%20login"));
        assert_eq!(launched[1], "https://docs.test");
        assert_eq!(fixture.desktop.new_tab_requests(), vec![window]);
        assert!(fixture.config.anchor_document_path().unwrap().exists());
    }

    #[tokio::test]
    async fn open_reuses_an_existing_workspace() {
        let fixture = Fixture::new();
        let window = fixture.desktop.open_browser_window(vec![anchor("s1")], 0);
        let locator = fixture.locator();

        let opened = locator
            .open(&WorkspaceMarker::new("s1"), Duration::from_secs(1), &[])
            .await
            .unwrap();
        assert_eq!(opened, window);
        assert!(fixture.desktop.launched_urls().is_empty());
    }

    #[tokio::test]
    async fn open_times_out_when_nothing_appears() {
        let fixture = Fixture::new();
        let locator = fixture.locator();

        let result = locator
            .open(&WorkspaceMarker::new("s1"), Duration::from_millis(50), &[])
            .await;
        assert!(result.is_err());
        assert!(fixture.desktop.new_tab_requests().is_empty());
    }
}

mod tab_capture {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn captures_every_non_anchor_tab_and_restores_selection() {
        let fixture = Fixture::new();
        let window = fixture.desktop.open_browser_window(
            vec![
                anchor("s1"),
                page("Docs", "https://docs.test"),
                page("Issue", "https://issues.test/1"),
            ],
            1,
        );
        let locator = fixture.locator();

        let urls = locator
            .capture_tab_urls(window, &WorkspaceMarker::new("s1"))
            .unwrap();
        assert_eq!(urls, vec!["https://docs.test", "https://issues.test/1"]);
        assert_eq!(fixture.desktop.selected_tab(window), Some(1));
    }

    #[test]
    fn anchor_selection_is_restored() {
        let fixture = Fixture::new();
        let window = fixture
            .desktop
            .open_browser_window(vec![anchor("s1"), page("Docs", "https://docs.test")], 0);

        let urls = fixture
            .locator()
            .capture_tab_urls(window, &WorkspaceMarker::new("s1"))
            .unwrap();
        assert_eq!(urls, vec!["https://docs.test"]);
        assert_eq!(fixture.desktop.selected_tab(window), Some(0));
    }

    #[test]
    fn failed_sweep_restores_selection_and_returns_nothing() {
        let fixture = Fixture::new();
        let window = fixture.desktop.open_browser_window(
            vec![
                anchor("s1"),
                page("Docs", "https://docs.test"),
                page("Issue", "https://issues.test/1"),
            ],
            2,
        );
        // First select (Docs) succeeds, second (Issue) fails
        fixture.desktop.fail_select_at(1);

        let result = fixture
            .locator()
            .capture_tab_urls(window, &WorkspaceMarker::new("s1"));
        assert!(result.is_err());
        assert_eq!(fixture.desktop.selected_tab(window), Some(2));
    }
}
