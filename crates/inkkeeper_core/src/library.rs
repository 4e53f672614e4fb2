//! crates/inkkeeper_core/src/library.rs
//!
//! Book collection operations: listing, adding, swapping the active read, shelving.
//! "At most one active book" is the backend's invariant; nothing here locks for it.

use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::{Book, BookFormat, BookStatus, SessionContext};
use crate::ports::{BackendService, BookCatalog, CatalogBook, NewBook, PortError};

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Please enter a title.")]
    MissingTitle,
    #[error("Please enter a valid number of pages/minutes.")]
    InvalidLength,
    #[error("Please give your shelf a name.")]
    MissingShelfName,
    #[error("A shelf needs at least one book.")]
    EmptyShelf,
    #[error("You already have \"{0}\" in your library.")]
    Duplicate(String),
    #[error("Unknown book status \"{0}\"; use active, wishlist or finished.")]
    UnknownStatus(String),
    #[error("Unknown book format \"{0}\"; use physical or audio.")]
    UnknownFormat(String),
    #[error("Please enter something to search for.")]
    MissingQuery,
    #[error(transparent)]
    Port(#[from] PortError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryView {
    pub active_book_id: Option<Uuid>,
    /// Newest first, with the active book pulled to the front.
    pub books: Vec<Book>,
}

impl LibraryView {
    pub fn with_status(&self, status: BookStatus) -> impl Iterator<Item = &Book> {
        self.books.iter().filter(move |b| b.status == status)
    }
}

/// A book the user wants to add.
#[derive(Debug, Clone)]
pub struct BookDraft {
    pub title: String,
    pub author: Option<String>,
    pub cover_url: Option<String>,
    pub format: BookFormat,
    pub total_units: u32,
    /// Left empty to let the library pick (`Active` unless one is already active).
    pub status: Option<BookStatus>,
    pub allow_duplicate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddedBook {
    pub book: Book,
    pub became_active: bool,
}

pub struct LibraryService {
    backend: Arc<dyn BackendService>,
}

impl LibraryService {
    pub fn new(backend: Arc<dyn BackendService>) -> Self {
        Self { backend }
    }

    pub async fn list(&self, ctx: &SessionContext) -> Result<LibraryView, LibraryError> {
        let profile = self.backend.fetch_profile(ctx.user_id).await?;
        let mut books = self.backend.list_books(ctx.user_id).await?;
        let active = profile.active_book_id;
        // Stable sort keeps the newest-first order for the rest.
        books.sort_by_key(|b| Some(b.id) != active);
        Ok(LibraryView {
            active_book_id: active,
            books,
        })
    }

    pub async fn add_book(&self, ctx: &SessionContext, draft: BookDraft) -> Result<AddedBook, LibraryError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(LibraryError::MissingTitle);
        }
        if draft.total_units == 0 {
            return Err(LibraryError::InvalidLength);
        }

        let profile = self.backend.fetch_profile(ctx.user_id).await?;
        if !draft.allow_duplicate {
            let existing = self.backend.list_books(ctx.user_id).await?;
            let wanted = title.to_lowercase();
            if existing.iter().any(|b| b.title.trim().to_lowercase() == wanted) {
                return Err(LibraryError::Duplicate(title.to_string()));
            }
        }

        let status = draft.status.unwrap_or(if profile.active_book_id.is_some() {
            BookStatus::Wishlist
        } else {
            BookStatus::Active
        });

        let book = self
            .backend
            .create_book(NewBook {
                user_id: ctx.user_id,
                title: title.to_string(),
                author: draft.author.filter(|a| !a.trim().is_empty()),
                cover_url: draft.cover_url,
                format: draft.format,
                total_units: draft.total_units,
                status,
            })
            .await?;
        info!("Book {} added for user {}", book.id, ctx.user_id);

        let mut became_active = false;
        if status == BookStatus::Active {
            match self.backend.set_active_book(ctx.user_id, book.id).await {
                Ok(()) => became_active = true,
                Err(e) => error!("Profile update failed for new book {}: {}", book.id, e),
            }
        }

        Ok(AddedBook { book, became_active })
    }

    /// Makes `book_id` the profile's active read. Returns false if it already was.
    pub async fn swap_active(&self, ctx: &SessionContext, book_id: Uuid) -> Result<bool, LibraryError> {
        let profile = self.backend.fetch_profile(ctx.user_id).await?;
        if profile.active_book_id == Some(book_id) {
            return Ok(false);
        }
        let book = self.backend.fetch_book(book_id).await?;
        if book.user_id != ctx.user_id {
            return Err(PortError::Unauthorized.into());
        }
        self.backend.set_active_book(ctx.user_id, book_id).await?;
        info!("User {} swapped active book to {}", ctx.user_id, book_id);
        Ok(true)
    }

    pub async fn assign_shelf(
        &self,
        ctx: &SessionContext,
        shelf_name: &str,
        book_ids: &[Uuid],
    ) -> Result<(), LibraryError> {
        let name = shelf_name.trim();
        if name.is_empty() {
            return Err(LibraryError::MissingShelfName);
        }
        if book_ids.is_empty() {
            return Err(LibraryError::EmptyShelf);
        }
        self.backend.assign_shelf(ctx.user_id, name, book_ids).await?;
        Ok(())
    }
}

/// Length used when the catalog does not know a book's page count.
pub const DEFAULT_TOTAL_UNITS: u32 = 300;

/// Most results a search returns.
pub const SEARCH_LIMIT: usize = 20;

impl CatalogBook {
    /// Pre-fills the add-book form from a search hit. Covers are upgraded to https.
    pub fn to_draft(&self) -> BookDraft {
        BookDraft {
            title: self.title.clone(),
            author: self.authors.first().cloned(),
            cover_url: self
                .cover_url
                .as_deref()
                .map(|url| match url.strip_prefix("http://") {
                    Some(rest) => format!("https://{}", rest),
                    None => url.to_string(),
                }),
            format: BookFormat::Physical,
            total_units: self.page_count.filter(|&p| p > 0).unwrap_or(DEFAULT_TOTAL_UNITS),
            status: None,
            allow_duplicate: false,
        }
    }
}

/// Title search against a public catalog.
pub struct BookSearch {
    catalog: Arc<dyn BookCatalog>,
}

impl BookSearch {
    pub fn new(catalog: Arc<dyn BookCatalog>) -> Self {
        Self { catalog }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<CatalogBook>, LibraryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LibraryError::MissingQuery);
        }
        let mut hits = self.catalog.search(query).await?;
        hits.retain(|b| !b.title.trim().is_empty());
        hits.truncate(SEARCH_LIMIT);
        debug!("Catalog search returned {} books", hits.len());
        Ok(hits)
    }
}
