mod common;

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use common::{book, profile, seed_reader, FakeBackend};
use inkkeeper_core::{
    ActiveSessionInput, BookDraft, BookFormat, BookSearch, BookStatus, CatalogBook, LibraryError,
    LibraryService, SessionContext, SessionSubmitter, StatsService, SubmissionRules,
};
use uuid::Uuid;

fn draft(title: &str) -> BookDraft {
    BookDraft {
        title: title.to_string(),
        author: Some("Ursula K. Le Guin".to_string()),
        cover_url: None,
        format: BookFormat::Physical,
        total_units: 250,
        status: None,
        allow_duplicate: false,
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fresh_user(backend: &FakeBackend) -> SessionContext {
    let user_id = Uuid::new_v4();
    backend.with(|s| {
        s.profiles.insert(user_id, profile(user_id));
    });
    SessionContext::new(user_id)
}

#[tokio::test]
async fn first_book_becomes_active_and_later_ones_go_to_wishlist() {
    let backend = Arc::new(FakeBackend::new());
    let ctx = fresh_user(&backend);
    let library = LibraryService::new(backend.clone());

    let first = library.add_book(&ctx, draft("A Wizard of Earthsea")).await.unwrap();
    assert_eq!(first.book.status, BookStatus::Active);
    assert!(first.became_active);

    let second = library.add_book(&ctx, draft("The Dispossessed")).await.unwrap();
    assert_eq!(second.book.status, BookStatus::Wishlist);
    assert!(!second.became_active);

    let profile = backend.read(|s| s.profiles[&ctx.user_id].clone());
    assert_eq!(profile.active_book_id, Some(first.book.id));
}

#[tokio::test]
async fn duplicate_titles_need_confirmation() {
    let backend = Arc::new(FakeBackend::new());
    let ctx = fresh_user(&backend);
    let library = LibraryService::new(backend.clone());

    library.add_book(&ctx, draft("Lathe of Heaven")).await.unwrap();
    let dup = library.add_book(&ctx, draft("  lathe of heaven ")).await;
    assert!(matches!(dup, Err(LibraryError::Duplicate(_))));

    let mut anyway = draft("Lathe of Heaven");
    anyway.allow_duplicate = true;
    assert!(library.add_book(&ctx, anyway).await.is_ok());
}

#[tokio::test]
async fn add_book_validates_input() {
    let backend = Arc::new(FakeBackend::new());
    let ctx = fresh_user(&backend);
    let library = LibraryService::new(backend.clone());

    assert!(matches!(library.add_book(&ctx, draft("   ")).await, Err(LibraryError::MissingTitle)));
    let mut zero = draft("Tehanu");
    zero.total_units = 0;
    assert!(matches!(library.add_book(&ctx, zero).await, Err(LibraryError::InvalidLength)));
}

#[tokio::test]
async fn failed_profile_update_still_adds_the_book() {
    let backend = Arc::new(FakeBackend::new());
    let ctx = fresh_user(&backend);
    backend.with(|s| s.fail_set_active = true);
    let library = LibraryService::new(backend.clone());

    let added = library.add_book(&ctx, draft("Always Coming Home")).await.unwrap();
    assert!(!added.became_active);
    assert_eq!(backend.read(|s| s.books.len()), 1);
}

#[tokio::test]
async fn listing_puts_the_active_book_first() {
    let backend = Arc::new(FakeBackend::new());
    let ctx = fresh_user(&backend);
    let base = Utc::now();
    let mut older = book(ctx.user_id, "Older", BookFormat::Physical, 0);
    older.created_at = Some(base - Duration::days(3));
    let mut newer = book(ctx.user_id, "Newer", BookFormat::Audio, 0);
    newer.created_at = Some(base);
    newer.status = BookStatus::Wishlist;
    let mut middle = book(ctx.user_id, "Middle", BookFormat::Physical, 0);
    middle.created_at = Some(base - Duration::days(1));
    middle.status = BookStatus::Finished;
    let older_id = older.id;
    backend.with(|s| {
        for b in [older, newer, middle] {
            s.books.insert(b.id, b);
        }
        s.profiles.get_mut(&ctx.user_id).unwrap().active_book_id = Some(older_id);
    });

    let view = LibraryService::new(backend.clone()).list(&ctx).await.unwrap();
    let titles: Vec<&str> = view.books.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, ["Older", "Newer", "Middle"]);
    assert_eq!(view.with_status(BookStatus::Wishlist).count(), 1);
    assert_eq!(view.with_status(BookStatus::Finished).count(), 1);
}

#[tokio::test]
async fn swapping_to_the_current_book_is_a_no_op() {
    let backend = Arc::new(FakeBackend::new());
    let reader = seed_reader(&backend, BookFormat::Physical, 0);
    let other = book(reader.ctx.user_id, "Next Up", BookFormat::Physical, 0);
    let other_id = other.id;
    backend.with(|s| {
        s.books.insert(other.id, other);
    });
    let library = LibraryService::new(backend.clone());

    assert!(!library.swap_active(&reader.ctx, reader.book_id).await.unwrap());
    assert!(library.swap_active(&reader.ctx, other_id).await.unwrap());
    let active = backend.read(|s| s.profiles[&reader.ctx.user_id].active_book_id);
    assert_eq!(active, Some(other_id));
}

#[tokio::test]
async fn shelves_need_a_name_and_a_book() {
    let backend = Arc::new(FakeBackend::new());
    let reader = seed_reader(&backend, BookFormat::Physical, 0);
    let library = LibraryService::new(backend.clone());

    assert!(matches!(
        library.assign_shelf(&reader.ctx, "  ", &[reader.book_id]).await,
        Err(LibraryError::MissingShelfName)
    ));
    assert!(matches!(
        library.assign_shelf(&reader.ctx, "Cozy", &[]).await,
        Err(LibraryError::EmptyShelf)
    ));
    library.assign_shelf(&reader.ctx, " Cozy ", &[reader.book_id]).await.unwrap();
    let shelf = backend.read(|s| s.books[&reader.book_id].shelf_name.clone());
    assert_eq!(shelf.as_deref(), Some("Cozy"));
}

#[tokio::test]
async fn summary_and_journal() {
    let backend = Arc::new(FakeBackend::new());
    let reader = seed_reader(&backend, BookFormat::Audio, 0);
    let at = |day: u32, hour: u32| Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap();
    backend.with(|s| {
        s.history.insert(
            reader.ctx.user_id,
            vec![(at(2, 8), 600, 12), (at(3, 7), 1_250, 0), (at(3, 21), 30, 3), (at(9, 12), 2_400, 20)],
        );
        s.profiles.get_mut(&reader.ctx.user_id).unwrap().current_streak = 12;
    });
    let stats = StatsService::new(backend.clone());

    let summary = stats.summary(&reader.ctx, day(2025, 3, 9)).await.unwrap();
    assert_eq!(summary.total_minutes, 71);
    assert_eq!(summary.hours(), 1);
    assert_eq!(summary.minutes_past_hour(), 11);
    assert_eq!(summary.total_units, 35);
    assert_eq!(summary.total_sessions, 4);
    assert_eq!(summary.current_streak, 12);
    assert_eq!(summary.most_sessions_in_a_day, 2);
    assert_eq!(summary.best_day, Some(day(2025, 3, 3)));

    let week = stats
        .summary_between(&reader.ctx, day(2025, 3, 3), day(2025, 3, 8))
        .await
        .unwrap();
    assert_eq!(week.total_sessions, 2);
    assert_eq!(week.total_minutes, 21);

    let backwards = stats
        .summary_between(&reader.ctx, day(2025, 3, 8), day(2025, 3, 3))
        .await
        .unwrap();
    assert_eq!(backwards.total_sessions, 0);
    assert_eq!(backwards.best_day, None);

    let submitter = SessionSubmitter::new(backend.clone(), SubmissionRules::default());
    for minutes in [5, 7] {
        submitter
            .submit_active(
                &reader.ctx,
                ActiveSessionInput {
                    duration_seconds: minutes * 60,
                    reflection: format!("{minutes} minutes"),
                    ..ActiveSessionInput::default()
                },
            )
            .await
            .unwrap();
    }
    let journal = stats.journal(&reader.ctx).await.unwrap();
    assert_eq!(journal.len(), 2);
    assert_eq!(journal[0].duration_seconds, 420);
    assert_eq!(journal[0].book_title.as_deref(), Some("The Hobbit"));
}

#[tokio::test]
async fn account_deletion_goes_to_the_backend() {
    let backend = Arc::new(FakeBackend::new());
    let reader = seed_reader(&backend, BookFormat::Audio, 0);
    StatsService::new(backend.clone()).delete_account(&reader.ctx).await.unwrap();
    assert_eq!(backend.read(|s| s.deleted.clone()), vec![reader.ctx.user_id]);
}

#[tokio::test]
async fn duplicate_check_folds_non_ascii_case() {
    let backend = Arc::new(FakeBackend::new());
    let ctx = fresh_user(&backend);
    let library = LibraryService::new(backend.clone());

    library.add_book(&ctx, draft("Über die Liebe")).await.unwrap();
    let dup = library.add_book(&ctx, draft("über die liebe")).await;
    assert!(matches!(dup, Err(LibraryError::Duplicate(_))));

    library.add_book(&ctx, draft("ÉTUDES")).await.unwrap();
    let dup = library.add_book(&ctx, draft("études")).await;
    assert!(matches!(dup, Err(LibraryError::Duplicate(_))));
}

#[tokio::test]
async fn catalog_search_trims_and_skips_untitled_hits() {
    let backend = Arc::new(FakeBackend::new());
    backend.with(|s| {
        s.catalog = vec![
            CatalogBook {
                title: "Piranesi".to_string(),
                authors: vec!["Susanna Clarke".to_string()],
                cover_url: Some("https://books.example/piranesi.jpg".to_string()),
                page_count: Some(272),
            },
            CatalogBook {
                title: "   ".to_string(),
                ..CatalogBook::default()
            },
        ];
    });
    let search = BookSearch::new(backend.clone());

    let hits = search.search("  piranesi ").await.unwrap();
    assert_eq!(backend.read(|s| s.catalog_queries.clone()), vec!["piranesi".to_string()]);
    assert_eq!(hits.len(), 1);
    let draft = hits[0].to_draft();
    assert_eq!(draft.author.as_deref(), Some("Susanna Clarke"));
    assert_eq!(draft.total_units, 272);

    // An empty query never reaches the catalog.
    assert!(matches!(search.search("   ").await, Err(LibraryError::MissingQuery)));
    assert_eq!(backend.read(|s| s.catalog_queries.len()), 1);
}
