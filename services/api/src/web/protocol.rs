//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the mobile client and the API server
//! for a live reading session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens a session. This must be the first message sent on the connection.
    /// Without a `book_id` the profile's active book is used.
    Init {
        #[serde(default)]
        book_id: Option<Uuid>,
    },

    /// Starts (or continues) the timer.
    Start,

    /// Pauses the timer.
    Pause,

    /// The app went to the background. Wall-clock time is credited on `Resume`.
    Suspend,

    /// The app came back to the foreground.
    Resume,

    /// The reader is done; the timer stops and the reflection step opens.
    Stop,

    /// The back button. May be answered with `ConfirmDiscard`.
    Back,

    /// The reader confirmed throwing away the unsubmitted time.
    ConfirmDiscard,

    /// Submits the session from the reflection step.
    Submit {
        #[serde(default)]
        reflection: String,
        #[serde(default)]
        prompt: Option<String>,
        #[serde(default)]
        end_unit: Option<u32>,
        #[serde(default)]
        finished: bool,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session is ready and names the book being read.
    SessionInitialized {
        book_id: Uuid,
        title: String,
        current_unit: u32,
    },

    /// Elapsed reading seconds, sent once per second while running and after a resume.
    Tick { elapsed_seconds: u64 },

    TimerStarted,

    TimerPaused,

    /// The timer stopped; the client should show the reflection form.
    ReflectionStage { elapsed_seconds: u64 },

    /// Leaving would lose the elapsed time; the client should ask the reader.
    ConfirmDiscard { elapsed_seconds: u64 },

    /// The session was thrown away or the reader left; the connection will close.
    Discarded,

    /// The submission call is in flight; the submit button should stay disabled.
    Submitting,

    SessionRecorded { ink_gained: u32, xp_gained: u32 },

    /// No active book or companion; the client should open the library.
    RedirectToLibrary { message: String },

    /// Reports an error the reader can recover from by retrying.
    Error { message: String },
}
