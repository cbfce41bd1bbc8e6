//! Tests for the event-log status detector

mod test_utils;

use chrono::{Duration, Utc};
use lookout::data::SessionStatus;
use lookout::status::{LogWatcher, StatusCache, StatusDetector, StatusRecord};
use serde_json::json;
use std::collections::HashMap;
use std::fs::File;
use std::time::SystemTime;
use test_utils::{event, event_with, Fixture};

mod classification {
    use super::*;

    #[test]
    fn ambiguous_tail_keeps_working() {
        let fixture = Fixture::new();
        let detector = fixture.detector();

        fixture.append_event("s1", &event("assistant.turn_start"));
        detector.observe("s1");
        assert_eq!(detector.status("s1"), SessionStatus::Working);

        fixture.append_event("s1", &event("tool.execution_complete"));
        assert_eq!(detector.observe("s1"), None);
        assert_eq!(detector.status("s1"), SessionStatus::Working);

        fixture.append_event("s1", &event("assistant.turn_end"));
        assert_eq!(detector.observe("s1"), None);
        assert_eq!(detector.status("s1"), SessionStatus::Working);
    }

    #[test]
    fn ask_user_is_idle_other_tools_work() {
        let fixture = Fixture::new();
        let detector = fixture.detector();

        fixture.append_event(
            "s1",
            &event_with("tool.execution_start", json!({ "toolName": "bash" })),
        );
        detector.observe("s1");
        assert_eq!(detector.status("s1"), SessionStatus::Working);

        fixture.append_event(
            "s1",
            &event_with("tool.execution_start", json!({ "toolName": "ask_user" })),
        );
        let transition = detector.observe("s1").unwrap();
        assert_eq!(transition.previous, SessionStatus::Working);
        assert_eq!(transition.current, SessionStatus::Idle);
    }

    #[test]
    fn idle_to_idle_silent_raises_nothing() {
        let fixture = Fixture::new();
        let detector = fixture.detector();

        fixture.append_event("s1", &event("user.message"));
        assert!(detector.observe("s1").unwrap().became_working());

        fixture.append_event("s1", &event_with("assistant.message", json!({})));
        let finished = detector.observe("s1").unwrap();
        assert_eq!(finished.current, SessionStatus::Idle);

        fixture.append_event("s1", &event("session.plan_changed"));
        assert_eq!(detector.observe("s1"), None);
        assert_eq!(detector.status("s1"), SessionStatus::IdleSilent);
    }
}

mod staleness {
    use super::*;

    #[test]
    fn working_decays_without_new_writes() {
        let fixture = Fixture::new();
        let detector = fixture.detector();

        fixture.append_event("s1", &event("user.message"));
        detector.observe("s1");

        let later = Utc::now() + Duration::minutes(31);
        assert_eq!(detector.status_at("s1", later), SessionStatus::IdleSilent);
        assert_eq!(detector.status("s1"), SessionStatus::Working);
    }

    #[test]
    fn old_log_is_not_trusted() {
        let fixture = Fixture::new();
        let detector = fixture.detector();

        fixture.append_event("s1", &event("user.message"));
        let log = fixture.session_state_dir().join("s1/events.jsonl");
        let old = SystemTime::now() - std::time::Duration::from_secs(45 * 60);
        File::options()
            .write(true)
            .open(&log)
            .unwrap()
            .set_modified(old)
            .unwrap();

        assert_eq!(detector.observe("s1"), None);
        assert_eq!(detector.status("s1"), SessionStatus::Unknown);
    }

    #[test]
    fn stale_cache_records_are_discarded_on_load() {
        let fixture = Fixture::new();
        let cache = StatusCache::new(fixture.config.status_cache_path().unwrap());
        let mut records = HashMap::new();
        records.insert(
            "old".to_string(),
            StatusRecord {
                last_observed_utc: Utc::now() - Duration::hours(2),
                status: SessionStatus::Working,
            },
        );
        records.insert(
            "recent".to_string(),
            StatusRecord {
                last_observed_utc: Utc::now() - Duration::minutes(1),
                status: SessionStatus::Idle,
            },
        );
        cache.save(&records).unwrap();

        let detector = fixture.detector();
        assert_eq!(detector.status("old"), SessionStatus::Unknown);
        assert_eq!(detector.status("recent"), SessionStatus::Idle);
    }
}

mod priming {
    use super::*;

    #[test]
    fn priming_seeds_without_transitions() {
        let fixture = Fixture::new();
        fixture.append_event("busy", &event("assistant.turn_start"));
        fixture.append_event("done", &event_with("assistant.message", json!({})));

        let detector = fixture.detector();
        detector.prime(["busy", "done", "missing"]);

        assert_eq!(detector.status("busy"), SessionStatus::Working);
        assert_eq!(detector.status("done"), SessionStatus::Idle);
        // Already known: re-reading the same tail changes nothing
        assert_eq!(detector.observe("busy"), None);
        assert_eq!(detector.observe("done"), None);
    }

    #[test]
    fn statuses_survive_restart() {
        let fixture = Fixture::new();
        fixture.append_event("s1", &event("abort"));
        {
            let detector = fixture.detector();
            detector.prime(["s1"]);
            detector.save().unwrap();
        }

        let detector = StatusDetector::new(
            fixture.dir.path().join("elsewhere"),
            StatusCache::new(fixture.config.status_cache_path().unwrap()),
            Duration::minutes(30),
        );
        assert_eq!(detector.status("s1"), SessionStatus::IdleSilent);
    }
}

mod delivery {
    use super::*;

    #[test]
    fn fallback_is_idle_while_push_path_works() {
        let fixture = Fixture::new();
        let detector = fixture.detector();
        let (watcher, _transitions) =
            LogWatcher::start(detector, std::time::Duration::from_secs(30));

        if !watcher.push_failed() {
            assert_eq!(watcher.poll_fallback(["s1"]), 0);
        }
    }

    #[test]
    fn dropping_the_watcher_stops_delivery() {
        let fixture = Fixture::new();
        let detector = fixture.detector();
        let (watcher, transitions) =
            LogWatcher::start(detector, std::time::Duration::from_secs(30));
        drop(watcher);

        // Every sender is gone once the delivery thread has been joined
        assert!(transitions.recv().is_err());
    }
}
