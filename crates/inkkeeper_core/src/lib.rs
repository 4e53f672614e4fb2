pub mod companion;
pub mod domain;
pub mod flow;
pub mod home;
pub mod library;
pub mod ports;
pub mod rewards;
pub mod stats;
pub mod streak;
pub mod submission;
pub mod tracker;

pub use companion::{project_companion, CompanionView, StageTable};
pub use domain::{
    Book, BookFormat, BookStatus, Companion, CompanionStatus, JournalEntry, Profile, ReadingSession,
    Reflection, SessionContext,
};
pub use flow::{BackOutcome, FlowError, FlowStage, ReadingFlow};
pub use home::{HomeRules, HomeService, HomeSnapshot, StreakNotice};
pub use library::{BookDraft, BookSearch, LibraryError, LibraryService, LibraryView};
pub use ports::{
    BackendService, BookCatalog, CatalogBook, FreezeOutcome, LogSessionRequest, NewBook, PortError,
    PortResult, SessionTotals,
};
pub use rewards::{calculate_reward, Reward, RewardModel};
pub use stats::{ReadingSummary, StatsService};
pub use streak::{evaluate_streak, StreakAction, StreakDecision};
pub use submission::{
    ActiveSessionInput, SessionDraft, SessionSubmitter, SubmissionError, SubmissionReceipt,
    SubmissionRules,
};
pub use tracker::ElapsedTimeTracker;
