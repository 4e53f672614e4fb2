//! In-memory `BackendService` used by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use inkkeeper_core::{
    BackendService, BookCatalog, Book, BookFormat, BookStatus, CatalogBook, Companion,
    CompanionStatus, FreezeOutcome, JournalEntry, LogSessionRequest, NewBook, PortError,
    PortResult, Profile, SessionContext, SessionTotals,
};
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Default)]
pub struct FakeState {
    pub profiles: HashMap<Uuid, Profile>,
    pub books: HashMap<Uuid, Book>,
    pub companions: HashMap<Uuid, Companion>,
    pub logged: Vec<LogSessionRequest>,
    /// Logged sessions per user: when, seconds, units.
    pub history: HashMap<Uuid, Vec<(DateTime<Utc>, u32, u32)>>,
    pub book_error: Option<String>,
    pub catalog: Vec<CatalogBook>,
    pub catalog_queries: Vec<String>,
    pub freeze_calls: u32,
    pub reset_calls: u32,
    pub deleted: Vec<Uuid>,
    pub log_error: Option<String>,
    pub freeze_error: Option<String>,
    pub fail_set_active: bool,
}

#[derive(Default)]
pub struct FakeBackend {
    pub state: Mutex<FakeState>,
    /// When set, `log_session_atomic` signals `entered` and waits on `release`.
    pub gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn read<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }
}

pub fn profile(user_id: Uuid) -> Profile {
    Profile {
        user_id,
        ink_drops: 0,
        active_book_id: None,
        active_companion_id: None,
        current_streak: 0,
        streak_freezes_available: 0,
        last_session_at: None,
        daily_goal_amount: Some(20),
        preferred_format: None,
        timezone: Some("UTC".to_string()),
    }
}

pub fn book(user_id: Uuid, title: &str, format: BookFormat, current_unit: u32) -> Book {
    Book {
        id: Uuid::new_v4(),
        user_id,
        title: title.to_string(),
        author: None,
        format,
        current_unit,
        total_units: Some(400),
        status: BookStatus::Active,
        shelf_name: None,
        cover_url: None,
        created_at: None,
    }
}

pub fn fox(user_id: Uuid, xp: u32) -> Companion {
    Companion {
        id: Uuid::new_v4(),
        user_id,
        nickname: Some("Rusty".to_string()),
        species: "fox".to_string(),
        xp,
        status: CompanionStatus::Active,
    }
}

/// A user with an active book and an active companion.
pub struct Reader {
    pub ctx: SessionContext,
    pub book_id: Uuid,
    pub companion_id: Uuid,
}

pub fn seed_reader(backend: &FakeBackend, format: BookFormat, current_unit: u32) -> Reader {
    let user_id = Uuid::new_v4();
    let b = book(user_id, "The Hobbit", format, current_unit);
    let c = fox(user_id, 0);
    let reader = Reader {
        ctx: SessionContext::new(user_id),
        book_id: b.id,
        companion_id: c.id,
    };
    backend.with(|s| {
        let mut p = profile(user_id);
        p.active_book_id = Some(b.id);
        p.active_companion_id = Some(c.id);
        s.profiles.insert(user_id, p);
        s.books.insert(b.id, b);
        s.companions.insert(c.id, c);
    });
    reader
}

fn not_found(what: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{what} {id} not found"))
}

#[async_trait]
impl BackendService for FakeBackend {
    async fn validate_auth_session(&self, _session_id: &str) -> PortResult<Uuid> {
        Err(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, _session_id: &str) -> PortResult<()> {
        Ok(())
    }

    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        self.read(|s| s.profiles.get(&user_id).cloned())
            .ok_or_else(|| not_found("Profile", user_id))
    }

    async fn fetch_book(&self, book_id: Uuid) -> PortResult<Book> {
        if let Some(message) = self.read(|s| s.book_error.clone()) {
            return Err(PortError::Backend(message));
        }
        self.read(|s| s.books.get(&book_id).cloned())
            .ok_or_else(|| not_found("Book", book_id))
    }

    async fn fetch_companion(&self, companion_id: Uuid) -> PortResult<Companion> {
        self.read(|s| s.companions.get(&companion_id).cloned())
            .ok_or_else(|| not_found("Companion", companion_id))
    }

    async fn log_session_atomic(&self, request: LogSessionRequest) -> PortResult<()> {
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        let mut s = self.state.lock().unwrap();
        if let Some(message) = s.log_error.clone() {
            return Err(PortError::Backend(message));
        }
        s.history
            .entry(request.user_id)
            .or_default()
            .push((Utc::now(), request.duration_seconds, request.units_read));
        s.logged.push(request);
        Ok(())
    }

    async fn use_streak_freeze(&self, user_id: Uuid) -> PortResult<FreezeOutcome> {
        let mut s = self.state.lock().unwrap();
        s.freeze_calls += 1;
        if let Some(message) = s.freeze_error.clone() {
            return Err(PortError::Backend(message));
        }
        let p = s.profiles.get_mut(&user_id).ok_or_else(|| not_found("Profile", user_id))?;
        if p.streak_freezes_available == 0 {
            return Ok(FreezeOutcome { success: false, freezes_remaining: 0 });
        }
        p.streak_freezes_available -= 1;
        Ok(FreezeOutcome {
            success: true,
            freezes_remaining: p.streak_freezes_available,
        })
    }

    async fn reset_broken_streak(&self, user_id: Uuid) -> PortResult<()> {
        let mut s = self.state.lock().unwrap();
        s.reset_calls += 1;
        if let Some(p) = s.profiles.get_mut(&user_id) {
            p.current_streak = 0;
        }
        Ok(())
    }

    async fn list_books(&self, user_id: Uuid) -> PortResult<Vec<Book>> {
        Ok(self.read(|s| {
            let mut books: Vec<Book> =
                s.books.values().filter(|b| b.user_id == user_id).cloned().collect();
            books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            books
        }))
    }

    async fn create_book(&self, new: NewBook) -> PortResult<Book> {
        let book = Book {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title: new.title,
            author: new.author,
            format: new.format,
            current_unit: 0,
            total_units: Some(new.total_units),
            status: new.status,
            shelf_name: None,
            cover_url: new.cover_url,
            created_at: Some(Utc::now()),
        };
        self.with(|s| {
            s.books.insert(book.id, book.clone());
        });
        Ok(book)
    }

    async fn set_active_book(&self, user_id: Uuid, book_id: Uuid) -> PortResult<()> {
        let mut s = self.state.lock().unwrap();
        if s.fail_set_active {
            return Err(PortError::Backend("profile update rejected".to_string()));
        }
        let p = s.profiles.get_mut(&user_id).ok_or_else(|| not_found("Profile", user_id))?;
        p.active_book_id = Some(book_id);
        Ok(())
    }

    async fn assign_shelf(&self, user_id: Uuid, shelf_name: &str, book_ids: &[Uuid]) -> PortResult<()> {
        let mut s = self.state.lock().unwrap();
        for id in book_ids {
            if let Some(b) = s.books.get_mut(id).filter(|b| b.user_id == user_id) {
                b.shelf_name = Some(shelf_name.to_string());
            }
        }
        Ok(())
    }

    async fn reading_summary(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<SessionTotals> {
        Ok(self.read(|s| {
            let sessions: Vec<_> = s
                .history
                .get(&user_id)
                .into_iter()
                .flatten()
                .filter(|(at, _, _)| (start..=end).contains(&at.date_naive()))
                .collect();
            let mut per_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
            for (at, _, _) in &sessions {
                *per_day.entry(at.date_naive()).or_default() += 1;
            }
            // Earliest day wins a tie.
            let best = per_day
                .iter()
                .fold(None::<(NaiveDate, u32)>, |best, (&day, &n)| match best {
                    Some((_, m)) if m >= n => best,
                    _ => Some((day, n)),
                });
            let seconds: u64 = sessions.iter().map(|(_, d, _)| u64::from(*d)).sum();
            SessionTotals {
                total_minutes: seconds / 60,
                total_units: sessions.iter().map(|(_, _, u)| u64::from(*u)).sum(),
                total_sessions: sessions.len() as u64,
                most_sessions_in_a_day: best.map(|(_, n)| n).unwrap_or(0),
                best_day: best.map(|(day, _)| day),
            }
        }))
    }

    async fn recent_sessions(&self, user_id: Uuid, limit: u32) -> PortResult<Vec<JournalEntry>> {
        Ok(self.read(|s| {
            s.logged
                .iter()
                .rev()
                .filter(|r| r.user_id == user_id)
                .take(limit as usize)
                .map(|r| JournalEntry {
                    session_id: Uuid::new_v4(),
                    created_at: Some(Utc::now()),
                    duration_seconds: r.duration_seconds,
                    book_title: s.books.get(&r.book_id).map(|b| b.title.clone()),
                    cover_url: None,
                    reflection: Some(r.reflection.clone()),
                })
                .collect()
        }))
    }

    async fn delete_account(&self, user_id: Uuid) -> PortResult<()> {
        self.with(|s| {
            s.profiles.remove(&user_id);
            s.deleted.push(user_id);
        });
        Ok(())
    }
}

pub fn hours_before(now: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    now - chrono::Duration::milliseconds((hours * 3_600_000.0) as i64)
}

#[async_trait]
impl BookCatalog for FakeBackend {
    async fn search(&self, query: &str) -> PortResult<Vec<CatalogBook>> {
        let mut s = self.state.lock().unwrap();
        s.catalog_queries.push(query.to_string());
        Ok(s.catalog.clone())
    }
}
