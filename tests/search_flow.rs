//! Search policy tests against scripted engines
//!
//! Every engine counts how often it is asked, so the tests can tell which
//! engines a search reached and where it stopped.

mod common;

use common::{
    NOT_FOUND_PAGE, Reply, ScriptedSource, calls, complete_nzb, incomplete_nzb,
    one_percent_missing_nzb, release_nzb, two_percent_missing_nzb,
};
use nzb_monkey::{
    CheckConfig, CheckResult, Error, Event, NzbSearch, NzbSource, SearchConfig, SearchQuery, nzb,
};
use std::sync::Arc;

fn policy(best_nzb: bool, skip_failed: bool) -> SearchConfig {
    SearchConfig {
        best_nzb,
        skip_failed,
        ..Default::default()
    }
}

fn query() -> SearchQuery {
    SearchQuery::new("Some.Release", "Some_Release_Header")
}

fn search(config: SearchConfig, sources: Vec<(u8, Arc<dyn NzbSource>)>) -> NzbSearch {
    NzbSearch::with_sources(config, CheckConfig::default(), sources).expect("valid search setup")
}

#[tokio::test]
async fn later_priority_is_asked_when_earlier_ones_fail_and_complete_nzb_stops() {
    let (a, a_calls) = ScriptedSource::new("a", Reply::Nzb(incomplete_nzb("rel")));
    let (b, b_calls) = ScriptedSource::new("b", Reply::Nzb(incomplete_nzb("rel")));
    let (c, c_calls) = ScriptedSource::new("c", Reply::Nzb(complete_nzb("rel", 3, 10)));
    let (d, d_calls) = ScriptedSource::new("d", Reply::Nzb(complete_nzb("rel", 3, 10)));
    let (e, e_calls) = ScriptedSource::new("e", Reply::Nzb(complete_nzb("rel", 3, 10)));

    let search = search(
        policy(false, true),
        vec![(1, a), (1, b), (2, c), (2, d), (3, e)],
    );
    let outcome = search.search(&query()).await.expect("NZB found");

    assert_eq!(outcome.selected.source, "c");
    assert_eq!(outcome.selected.result, CheckResult::Complete);
    assert_eq!(calls(&a_calls), 1);
    assert_eq!(calls(&b_calls), 1);
    assert_eq!(calls(&c_calls), 1, "priority 2 is reached because priority 1 had no success");
    assert_eq!(calls(&d_calls), 0, "search stops right after the complete NZB");
    assert_eq!(calls(&e_calls), 0);
    assert_eq!(outcome.sources_queried, 3);
}

#[tokio::test]
async fn without_best_nzb_first_passing_nzb_stops_the_search() {
    let (a, _) = ScriptedSource::new("a", Reply::Nzb(two_percent_missing_nzb("rel")));
    let (b, b_calls) = ScriptedSource::new("b", Reply::Nzb(complete_nzb("rel", 4, 25)));

    let search = search(policy(false, true), vec![(1, a), (2, b)]);
    let outcome = search.search(&query()).await.expect("NZB found");

    assert_eq!(outcome.selected.source, "a");
    assert_eq!(outcome.selected.result, CheckResult::Ok);
    assert_eq!(calls(&b_calls), 0);
}

#[tokio::test]
async fn best_nzb_keeps_searching_and_picks_smallest_shortfall() {
    let (a, _) = ScriptedSource::new("a", Reply::Nzb(two_percent_missing_nzb("rel")));
    let (b, _) = ScriptedSource::new("b", Reply::Nzb(one_percent_missing_nzb("rel")));
    let (c, c_calls) = ScriptedSource::new("c", Reply::Nzb(two_percent_missing_nzb("rel")));

    let search = search(policy(true, true), vec![(1, a), (1, b), (2, c)]);
    let outcome = search.search(&query()).await.expect("NZB found");

    assert_eq!(calls(&c_calls), 1, "lower confidence passes do not stop the search");
    assert_eq!(outcome.candidates, 3);
    assert_eq!(outcome.selected.source, "b");
    assert_eq!(outcome.selected.missing_percent(), Some(1.0));
}

#[tokio::test]
async fn best_nzb_still_stops_at_a_complete_nzb() {
    let (a, _) = ScriptedSource::new("a", Reply::Nzb(one_percent_missing_nzb("rel")));
    let (b, _) = ScriptedSource::new("b", Reply::Nzb(complete_nzb("rel", 2, 2)));
    let (c, c_calls) = ScriptedSource::new("c", Reply::Nzb(complete_nzb("rel", 2, 2)));

    let search = search(policy(true, true), vec![(1, a), (1, b), (1, c)]);
    let mut events = search.subscribe();
    let outcome = search.search(&query()).await.expect("NZB found");

    assert_eq!(outcome.selected.source, "b");
    assert_eq!(calls(&c_calls), 0, "same priority group is cut short too");

    let mut skipped = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::SourceSkipped { source } = event {
            skipped.push(source);
        }
    }
    assert_eq!(skipped, vec!["c"]);
}

#[tokio::test]
async fn failed_nzb_is_kept_as_last_resort_when_allowed() {
    let (a, _) = ScriptedSource::new("a", Reply::Nzb(incomplete_nzb("first")));
    let (b, _) = ScriptedSource::new("b", Reply::Nzb(incomplete_nzb("second")));

    let search = search(policy(true, false), vec![(1, a), (1, b)]);
    let outcome = search.search(&query()).await.expect("failed NZB kept");

    assert!(!outcome.is_success());
    assert_eq!(outcome.selected.source, "a", "only the first failed NZB is kept");
    assert_eq!(outcome.candidates, 1);
    assert_eq!(outcome.selected.result, CheckResult::TooManyMissingFiles);
}

#[tokio::test]
async fn passing_nzb_with_fewer_missing_files_beats_the_last_resort() {
    let (a, _) = ScriptedSource::new("a", Reply::Nzb(incomplete_nzb("rel")));
    let (b, _) = ScriptedSource::new("b", Reply::Nzb(two_percent_missing_nzb("rel")));

    let search = search(policy(true, false), vec![(1, a), (2, b)]);
    let outcome = search.search(&query()).await.expect("NZB found");

    assert!(outcome.is_success());
    assert_eq!(outcome.selected.source, "b");
    assert_eq!(outcome.candidates, 2, "the last resort stays a candidate");
}

#[tokio::test]
async fn last_resort_with_fewer_missing_files_wins_selection() {
    // all four files, 10 of 100 segments missing: fails on segments
    let (a, _) = ScriptedSource::new(
        "a",
        Reply::Nzb(release_nzb("rel", 4, &[(25, 25), (25, 15), (25, 25), (25, 25)])),
    );
    // three of four files, every segment present: passes
    let (b, _) = ScriptedSource::new("b", Reply::Nzb(release_nzb("rel", 4, &[(25, 25); 3])));

    let search = search(policy(true, false), vec![(1, a), (1, b)]);
    let outcome = search.search(&query()).await.expect("NZB found");

    assert_eq!(outcome.candidates, 2);
    assert_eq!(outcome.selected.source, "a", "(0 files, 10 %) sorts before (1 file, 0 %)");
    assert_eq!(outcome.selected.result, CheckResult::TooManyMissingSegments);
    assert!(!outcome.is_success());
}

#[tokio::test]
async fn only_failed_nzbs_with_skip_failed_is_total_failure() {
    let (a, _) = ScriptedSource::new("a", Reply::Nzb(incomplete_nzb("rel")));
    let (b, _) = ScriptedSource::new("b", Reply::Nzb(NOT_FOUND_PAGE.to_string()));

    let search = search(policy(true, true), vec![(1, a), (2, b)]);
    let err = search.search(&query()).await.unwrap_err();

    assert!(
        matches!(err, Error::NoNzbFound { sources_queried: 2 }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn unreachable_engines_are_skipped() {
    let (a, a_calls) = ScriptedSource::new("a", Reply::Timeout);
    let (b, b_calls) = ScriptedSource::new("b", Reply::Refused);
    let (c, _) = ScriptedSource::new("c", Reply::Gone);
    let (d, _) = ScriptedSource::new("d", Reply::NotFound);
    let (e, _) = ScriptedSource::new("e", Reply::Nzb(complete_nzb("rel", 1, 1)));

    let search = search(policy(true, true), vec![(1, a), (1, b), (1, c), (1, d), (2, e)]);
    let mut events = search.subscribe();
    let outcome = search.search(&query()).await.expect("NZB found");

    assert_eq!(outcome.selected.source, "e");
    assert_eq!(calls(&a_calls), 1);
    assert_eq!(calls(&b_calls), 1);

    let mut failed = Vec::new();
    let mut not_found = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            Event::SourceFailed { source, .. } => failed.push(source),
            Event::SourceNotFound { source } => not_found.push(source),
            _ => {}
        }
    }
    assert_eq!(failed, vec!["a", "b", "c"]);
    assert_eq!(not_found, vec!["d"]);
}

#[tokio::test]
async fn engines_receive_the_normalized_header() {
    struct Recording(std::sync::Mutex<Vec<String>>);

    #[async_trait::async_trait]
    impl NzbSource for Recording {
        fn name(&self) -> &str {
            "recording"
        }
        async fn locate(&self, key: &str) -> nzb_monkey::Result<Option<String>> {
            self.0.lock().expect("lock").push(key.to_string());
            Ok(None)
        }
        async fn fetch(&self, _address: &str) -> nzb_monkey::Result<Vec<u8>> {
            unreachable!("nothing is located")
        }
    }

    let recording = Arc::new(Recording(std::sync::Mutex::new(Vec::new())));
    let search = search(policy(true, true), vec![(1, recording.clone() as Arc<dyn NzbSource>)]);
    let query = SearchQuery::new("t", "  abc_def_ghi  ");
    assert!(search.search(&query).await.is_err());

    assert_eq!(*recording.0.lock().expect("lock"), vec!["abc def ghi"]);
}

#[tokio::test]
async fn selected_document_carries_the_password() {
    let (a, _) = ScriptedSource::new("a", Reply::Nzb(complete_nzb("rel", 2, 3)));
    let search = search(policy(true, true), vec![(1, a)]);

    let outcome = search
        .search(&query().with_password("s3cret"))
        .await
        .expect("NZB found");

    assert!(outcome.password_injected);
    let reparsed = nzb::parse(outcome.text.as_bytes());
    assert_eq!(reparsed.password(), Some("s3cret"));
    assert_eq!(reparsed.files.len(), 2);
    assert_eq!(reparsed.segment_count(), 6);
    assert_eq!(outcome.selected.nzb.password(), None, "candidate keeps the original");
}

#[tokio::test]
async fn search_events_follow_the_search() {
    let (a, _) = ScriptedSource::new("a", Reply::NotFound);
    let (b, _) = ScriptedSource::new("b", Reply::Nzb(complete_nzb("rel", 1, 2)));
    let search = search(policy(true, true), vec![(1, a), (2, b)]);
    let mut events = search.subscribe();

    search.search(&query()).await.expect("NZB found");

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    assert_eq!(
        seen.first(),
        Some(&Event::SearchStarted {
            header: "Some Release Header".to_string(),
            sources: 2,
        })
    );
    assert!(seen.contains(&Event::SourceQueried {
        source: "b".to_string(),
        priority: 2,
    }));
    assert!(seen.contains(&Event::Checked {
        source: "b".to_string(),
        result: CheckResult::Complete,
        files_missing: Some(0),
        missing_percent: Some(0.0),
    }));
    assert_eq!(
        seen.last(),
        Some(&Event::Selected {
            source: "b".to_string(),
            result: CheckResult::Complete,
            candidates: 1,
        })
    );
}
