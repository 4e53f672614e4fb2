mod common;

use std::sync::Arc;

use common::{seed_reader, FakeBackend};
use inkkeeper_core::{
    ActiveSessionInput, BookFormat, BookStatus, PortError, ReadingFlow, RewardModel,
    SessionSubmitter, SubmissionError, SubmissionRules,
};
use tokio::sync::Notify;

fn pages_rules() -> SubmissionRules {
    SubmissionRules {
        reward_model: RewardModel::UnitBased,
        ..SubmissionRules::default()
    }
}

#[tokio::test]
async fn physical_session_issues_one_atomic_call() {
    let backend = Arc::new(FakeBackend::new());
    let reader = seed_reader(&backend, BookFormat::Physical, 100);
    let submitter = SessionSubmitter::new(backend.clone(), pages_rules());

    let receipt = submitter
        .submit_active(
            &reader.ctx,
            ActiveSessionInput {
                duration_seconds: 900,
                start_unit: Some(100),
                end_unit: Some(130),
                ..ActiveSessionInput::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(receipt.units_read, 30);
    assert_eq!(receipt.reward.ink_gained, 60);
    assert_eq!(receipt.reward.xp_gained, 60);

    let logged = backend.read(|s| s.logged.clone());
    assert_eq!(logged.len(), 1);
    let call = &logged[0];
    assert_eq!(call.new_book_unit, 130);
    assert_eq!(call.new_book_status, BookStatus::Active);
    assert_eq!(call.book_id, reader.book_id);
    assert_eq!(call.companion_id, reader.companion_id);
    assert_eq!(call.user_id, reader.ctx.user_id);
    assert_eq!(call.duration_seconds, 900);
}

#[tokio::test]
async fn invalid_sessions_never_reach_the_backend() {
    let backend = Arc::new(FakeBackend::new());
    let reader = seed_reader(&backend, BookFormat::Physical, 100);
    let submitter = SessionSubmitter::new(backend.clone(), SubmissionRules::default());

    let backwards = submitter
        .submit_active(
            &reader.ctx,
            ActiveSessionInput {
                duration_seconds: 900,
                end_unit: Some(90),
                ..ActiveSessionInput::default()
            },
        )
        .await;
    assert!(matches!(backwards, Err(SubmissionError::EndBeforeStart { start: 100, end: 90 })));

    let short = submitter
        .submit_active(
            &reader.ctx,
            ActiveSessionInput {
                duration_seconds: 59,
                ..ActiveSessionInput::default()
            },
        )
        .await;
    assert!(matches!(short, Err(SubmissionError::TooShort { .. })));

    assert!(backend.read(|s| s.logged.is_empty()));
}

#[tokio::test]
async fn backend_error_is_surfaced_verbatim() {
    let backend = Arc::new(FakeBackend::new());
    let reader = seed_reader(&backend, BookFormat::Audio, 0);
    backend.with(|s| s.log_error = Some("duplicate key value violates unique constraint".to_string()));
    let submitter = SessionSubmitter::new(backend.clone(), SubmissionRules::default());

    let err = submitter
        .submit_active(
            &reader.ctx,
            ActiveSessionInput {
                duration_seconds: 120,
                ..ActiveSessionInput::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "duplicate key value violates unique constraint");
    // The guard is released after a failure so the user can retry.
    assert!(!submitter.is_submitting(reader.ctx.user_id));
}

#[tokio::test]
async fn missing_active_book_asks_for_the_library() {
    let backend = Arc::new(FakeBackend::new());
    let reader = seed_reader(&backend, BookFormat::Physical, 0);
    backend.with(|s| {
        s.profiles.get_mut(&reader.ctx.user_id).unwrap().active_book_id = None;
    });
    let submitter = SessionSubmitter::new(backend.clone(), SubmissionRules::default());

    let err = submitter
        .submit_active(
            &reader.ctx,
            ActiveSessionInput {
                duration_seconds: 600,
                ..ActiveSessionInput::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::MissingPrerequisite(_)));
}

#[tokio::test]
async fn someone_elses_book_is_refused() {
    let backend = Arc::new(FakeBackend::new());
    let owner = seed_reader(&backend, BookFormat::Physical, 0);
    let intruder = seed_reader(&backend, BookFormat::Physical, 0);
    let submitter = SessionSubmitter::new(backend.clone(), SubmissionRules::default());

    let err = submitter
        .submit_active(
            &intruder.ctx,
            ActiveSessionInput {
                book_id: Some(owner.book_id),
                duration_seconds: 600,
                ..ActiveSessionInput::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Backend(PortError::Unauthorized)));
}

#[tokio::test]
async fn second_submission_while_in_flight_is_rejected() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let backend = Arc::new(FakeBackend {
        gate: Some((entered.clone(), release.clone())),
        ..FakeBackend::default()
    });
    let reader = seed_reader(&backend, BookFormat::Audio, 0);
    let submitter = Arc::new(SessionSubmitter::new(backend.clone(), SubmissionRules::default()));

    let input = ActiveSessionInput {
        duration_seconds: 300,
        ..ActiveSessionInput::default()
    };
    let first = {
        let submitter = submitter.clone();
        let ctx = reader.ctx;
        let input = input.clone();
        tokio::spawn(async move { submitter.submit_active(&ctx, input).await })
    };

    entered.notified().await;
    assert!(submitter.is_submitting(reader.ctx.user_id));
    let second = submitter.submit_active(&reader.ctx, input).await;
    assert!(matches!(second, Err(SubmissionError::AlreadySubmitting)));

    release.notify_one();
    let receipt = first.await.unwrap().unwrap();
    assert_eq!(receipt.reward.xp_gained, 25);
    assert_eq!(backend.read(|s| s.logged.len()), 1);
    assert!(!submitter.is_submitting(reader.ctx.user_id));
}

#[tokio::test]
async fn timer_flow_feeds_the_submitter() {
    let backend = Arc::new(FakeBackend::new());
    let reader = seed_reader(&backend, BookFormat::Audio, 12);
    let submitter = SessionSubmitter::new(backend.clone(), SubmissionRules::default());

    let mut flow = ReadingFlow::new();
    flow.start().unwrap();
    for _ in 0..600 {
        flow.tick();
    }
    flow.stop().unwrap();
    let seconds = flow.begin_submit().unwrap();

    let receipt = submitter
        .submit_active(
            &reader.ctx,
            ActiveSessionInput {
                duration_seconds: seconds as u32,
                reflection: "A long and thoughtful note about the dragon and the dwarves.".to_string(),
                finished: true,
                ..ActiveSessionInput::default()
            },
        )
        .await
        .unwrap();
    flow.submit_succeeded();

    assert_eq!(receipt.reward.ink_gained, 30);
    assert_eq!(receipt.reward.xp_gained, 50);
    assert_eq!(receipt.new_book_status, BookStatus::Finished);
    // Finishing completes the book's known length.
    assert_eq!(receipt.new_book_unit, 400);
}

#[tokio::test]
async fn time_only_paper_session_leaves_the_bookmark() {
    let backend = Arc::new(FakeBackend::new());
    let reader = seed_reader(&backend, BookFormat::Physical, 100);
    let submitter = SessionSubmitter::new(backend.clone(), SubmissionRules::default());

    let receipt = submitter
        .submit_active(
            &reader.ctx,
            ActiveSessionInput {
                duration_seconds: 1_800,
                ..ActiveSessionInput::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(receipt.reward.ink_gained, 30);
    assert_eq!(receipt.units_read, 0);
    let call = backend.read(|s| s.logged[0].clone());
    assert_eq!(call.new_book_unit, 100);
    assert_eq!(call.new_book_status, BookStatus::Active);
}
