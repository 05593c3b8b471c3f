/*
    End-to-End Pipeline Tests

    Each test drives full requests through the orchestrator against an
    in-memory account:
    - limit-bounded scans with duplicates
    - join handling for every reference kind
    - short histories, upstream failures and encoding skips
    - concurrent requests for the same channel
*/

use mailscrape_core::config::Config;
use mailscrape_core::delivery::ArtifactEncoding;
use mailscrape_core::provider::memory::{InvitePolicy, MemoryChannel};
use mailscrape_core::test_utils::{
    assert_completes_within, assert_no_artifacts, assert_state, credential, run_concurrently,
    scenario_a_channel, test_orchestrator, test_orchestrator_with_config, HistoryBuilder,
    RecordingSink, SinkCall, DEFAULT_TEST_TIMEOUT,
};
use mailscrape_core::{
    DirectorySink, MembershipOutcome, RequestState, Requester, ScrapeError, ScrapeRequest,
};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::tempdir;

fn request(reference: &str, limit: &str) -> ScrapeRequest {
    ScrapeRequest::new(reference, limit, Requester::new("Tester", "tg://user?id=7"))
}

fn delivered_lines(sink: &RecordingSink) -> Vec<String> {
    sink.calls()
        .into_iter()
        .find_map(|(_, call)| match call {
            SinkCall::Deliver { contents, .. } => Some(contents),
            _ => None,
        })
        .map(|c| c.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Limit 50 over a history with 55 distinct credentials and repeats
/// mixed in: the scan stops as soon as 50 unique ones are in hand.
#[tokio::test]
async fn test_limit_bounded_scan_with_duplicates() {
    let out = tempdir().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let (orch, provider) = test_orchestrator(vec![scenario_a_channel()], sink.clone(), out.path()).await;

    let report = orch.handle(request("@combodumps", "50")).await;
    assert_state(&report, RequestState::Done);

    let collection = report.collection.unwrap();
    assert_eq!(collection.credentials.len(), 50);
    assert_eq!(collection.duplicates_removed, 5);
    assert!(!collection.exhausted);
    assert_eq!(collection.scanned_messages, 55);

    let expected: Vec<String> = (0..50).map(credential).collect();
    assert_eq!(delivered_lines(&sink), expected);

    let summary = report.delivery.unwrap();
    assert_eq!(summary.amount, 50);
    assert_eq!(summary.duplicates_removed, 5);
    assert_eq!(summary.source, "Combo Dumps");

    assert_eq!(provider.open_cursors(), 0);
    assert_no_artifacts(out.path());
}

/// A private invite that needs approval: the request ends pending and no
/// history is ever read.
#[tokio::test]
async fn test_pending_join_reads_no_history() {
    let out = tempdir().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let vault = MemoryChannel::private(-2002, "Vault")
        .with_invite("ZBqGFP5evRpmY2Y1", InvitePolicy::Approval)
        .with_messages([Some("hidden@mail.test:1")]);
    let (orch, provider) = test_orchestrator(vec![vault], sink.clone(), out.path()).await;

    let report = orch
        .handle(request("https://t.me/+ZBqGFP5evRpmY2Y1", "10"))
        .await;

    assert_state(&report, RequestState::JoinPending);
    assert_eq!(report.outcome, Some(MembershipOutcome::JoinRequestPending));
    assert_eq!(provider.history_calls(), 0);
    assert_eq!(provider.pending_requests().await, vec!["ZBqGFP5evRpmY2Y1"]);
    assert_eq!(sink.deliveries(), 0);
}

/// Fewer credentials than requested: everything is delivered and the
/// history is marked exhausted.
#[tokio::test]
async fn test_short_history_is_exhausted() {
    let out = tempdir().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let channel = HistoryBuilder::new()
        .credentials(0..3)
        .media()
        .text("no credentials here")
        .build_into(MemoryChannel::private(-3003, "Small").member());
    let (orch, _provider) = test_orchestrator(vec![channel], sink.clone(), out.path()).await;

    let report = orch.handle(request("-3003", "100")).await;

    assert_state(&report, RequestState::Done);
    assert_eq!(report.outcome, Some(MembershipOutcome::AlreadyMember));
    let collection = report.collection.unwrap();
    assert!(collection.exhausted);
    assert_eq!(collection.credentials.len(), 3);
    assert_eq!(collection.scanned_messages, 5);
}

#[tokio::test]
async fn test_numeric_id_never_joins() {
    let out = tempdir().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let stranger = MemoryChannel::private(-4004, "Stranger")
        .with_invite("open-door", InvitePolicy::Open)
        .with_messages([Some("a@mail.test:1")]);
    let (orch, provider) = test_orchestrator(vec![stranger], sink.clone(), out.path()).await;

    let report = orch.handle(request("-4004", "5")).await;

    assert_state(&report, RequestState::Aborted("invalid_chat_id"));
    assert_eq!(provider.join_calls(), 0);
    assert_eq!(provider.history_calls(), 0);
    assert_eq!(sink.deliveries(), 0);
    assert_no_artifacts(out.path());
}

/// Open invite joins on first use and finds the membership on second use
#[tokio::test]
async fn test_open_invite_joins_then_reuses_membership() {
    let out = tempdir().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let channel = HistoryBuilder::new()
        .credentials(0..4)
        .build_into(MemoryChannel::private(-5005, "Club").with_invite("club", InvitePolicy::Open));
    let (orch, provider) = test_orchestrator(vec![channel], sink.clone(), out.path()).await;

    let first = orch.handle(request("t.me/joinchat/club", "2")).await;
    assert_state(&first, RequestState::Done);
    assert_eq!(first.outcome, Some(MembershipOutcome::Joined));

    let second = orch.handle(request("https://t.me/+club", "2")).await;
    assert_state(&second, RequestState::Done);
    assert_eq!(second.outcome, Some(MembershipOutcome::AlreadyMember));
    assert_eq!(provider.join_calls(), 2);
}

#[tokio::test]
async fn test_expired_invite_is_rejected() {
    let out = tempdir().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let channel = MemoryChannel::private(-6006, "Old").with_invite("gone", InvitePolicy::Expired);
    let (orch, _provider) = test_orchestrator(vec![channel], sink.clone(), out.path()).await;

    let req = request("https://t.me/+gone", "5");
    let id = req.id;
    let report = orch.handle(req).await;

    assert_state(&report, RequestState::Aborted("invalid_invite"));
    assert_eq!(
        sink.calls_for(id).last(),
        Some(&SinkCall::Update("Incorrect invite link".to_string()))
    );
}

#[tokio::test]
async fn test_upstream_failure_mid_scan() {
    let out = tempdir().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let mut config = Config::default();
    config.scrape.output_dir = out.path().to_path_buf();

    let channel = HistoryBuilder::new()
        .credentials(0..10)
        .build_into(MemoryChannel::public(-7007, "Flaky", "flaky"));
    let provider = Arc::new(
        mailscrape_core::provider::InMemoryProvider::from_channels(vec![channel])
            .failing_history_after(3),
    );
    let ctx = mailscrape_core::ScrapeContext::start(config, provider.clone())
        .await
        .unwrap();
    let orch = mailscrape_core::RequestOrchestrator::new(Arc::new(ctx), sink.clone());

    let report = orch.handle(request("@flaky", "10")).await;

    assert_state(&report, RequestState::Aborted("upstream_unavailable"));
    assert!(matches!(report.error, Some(ScrapeError::UpstreamUnavailable(_))));
    assert_eq!(provider.open_cursors(), 0);
    assert_eq!(sink.deliveries(), 0);
}

/// ASCII artifacts leave out credentials with non-ASCII characters and
/// report how many were skipped.
#[tokio::test]
async fn test_unencodable_credentials_are_skipped() {
    let out = tempdir().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let mut config = Config::default();
    config.scrape.output_dir = out.path().to_path_buf();
    config.scrape.artifact_encoding = ArtifactEncoding::Ascii;

    let channel = HistoryBuilder::new()
        .text("plain@mail.test:abc")
        .text("umlaut@mail.test:pässwort")
        .build_into(MemoryChannel::public(-8008, "Mixed", "mixed"));
    let (orch, _provider) = test_orchestrator_with_config(config, vec![channel], sink.clone()).await;

    let report = orch.handle(request("@mixed", "10")).await;

    assert_state(&report, RequestState::Done);
    let summary = report.delivery.unwrap();
    assert_eq!(summary.amount, 2);
    assert_eq!(summary.skipped_unencodable, 1);
    assert_eq!(delivered_lines(&sink), vec!["plain@mail.test:abc"]);
    assert_no_artifacts(out.path());
}

/// Parallel requests for one channel each get their own artifact and
/// never see each other's files.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_same_channel() {
    let out = tempdir().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let (orch, provider) = test_orchestrator(vec![scenario_a_channel()], sink.clone(), out.path()).await;

    let reports = assert_completes_within(
        DEFAULT_TEST_TIMEOUT,
        run_concurrently(8, |i| {
            let orch = orch.clone();
            async move { orch.handle(request("@combodumps", &(10 + i).to_string())).await }
        }),
    )
    .await;

    for (i, report) in reports.iter().enumerate() {
        assert_state(report, RequestState::Done);
        assert_eq!(report.delivery.as_ref().unwrap().amount, 10 + i);
    }

    let paths: HashSet<_> = sink.delivered_paths().into_iter().collect();
    assert_eq!(paths.len(), 8);
    assert_eq!(provider.open_cursors(), 0);
    assert_no_artifacts(out.path());
}

#[tokio::test]
async fn test_missing_limit_reports_before_resolving() {
    let out = tempdir().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let (orch, provider) = test_orchestrator(vec![scenario_a_channel()], sink.clone(), out.path()).await;

    let req = ScrapeRequest::from_args(&["@combodumps"], Requester::default());
    let id = req.id;
    let report = orch.handle(req).await;

    assert_state(&report, RequestState::Aborted("missing_arguments"));
    assert_eq!(
        sink.calls_for(id),
        vec![SinkCall::Post(
            "Please provide a channel and an amount".to_string()
        )]
    );
    assert_eq!(provider.history_calls(), 0);
}

/// Delivering into the artifact directory would copy the file onto itself
/// and then delete it, so the request fails instead of reporting success.
#[tokio::test]
async fn test_delivery_into_output_dir_fails() {
    let out = tempdir().unwrap();
    let sink = Arc::new(DirectorySink::new(out.path()));
    let channel = HistoryBuilder::new()
        .credentials(0..3)
        .build_into(MemoryChannel::public(-9009, "Leaks", "leaks"));
    let (orch, _provider) = test_orchestrator(vec![channel], sink, out.path()).await;

    let report = orch.handle(request("@leaks", "10")).await;

    assert_state(&report, RequestState::Aborted("delivery_failed"));
    assert!(report.delivery.is_none());
    let captions: Vec<_> = std::fs::read_dir(out.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".caption.txt"))
        .collect();
    assert!(captions.is_empty());
    assert_no_artifacts(out.path());
}
