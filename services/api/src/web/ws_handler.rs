//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a live reading session.
//! The server owns the timer; the client sends controls and renders ticks.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::{AppState, TimerSessionState},
    timer_task::timer_process,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use chrono::Utc;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use inkkeeper_core::domain::SessionContext;
use inkkeeper_core::flow::BackOutcome;
use inkkeeper_core::submission::{SessionDraft, SubmissionError};
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{error, info, warn};

/// The write half of a connection, shared between the control loop and the timer task.
pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Serializes and sends one message. Returns false if the client can no longer be reached.
pub async fn send_message(ws_sender: &WsSender, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return false;
        }
    };
    ws_sender.lock().await.send(Message::Text(json.into())).await.is_ok()
}

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, ctx))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, ctx: SessionContext) {
    info!("New WebSocket connection established for user: {}", ctx.user_id);

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase ---
    let session_state_lock = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => {
            match serde_json::from_str::<ClientMessage>(init_json.as_str()) {
                Ok(ClientMessage::Init { book_id }) => {
                    match TimerSessionState::new(app_state.clone(), ctx, book_id).await {
                        Ok(state) => {
                            info!("Reading session opened for book {}", state.book.id);
                            let init_msg = ServerMessage::SessionInitialized {
                                book_id: state.book.id,
                                title: state.book.title.clone(),
                                current_unit: state.book.current_unit,
                            };
                            if !send_message(&ws_sender, &init_msg).await {
                                error!("Failed to send session initialized message.");
                                return;
                            }
                            Arc::new(Mutex::new(state))
                        }
                        Err(SubmissionError::MissingPrerequisite(message)) => {
                            warn!("User {} has nothing to read: {}", ctx.user_id, message);
                            send_message(&ws_sender, &ServerMessage::RedirectToLibrary { message }).await;
                            return;
                        }
                        Err(e) => {
                            error!("Failed to initialize session state: {:?}", e);
                            let err_msg = ServerMessage::Error { message: e.to_string() };
                            send_message(&ws_sender, &err_msg).await;
                            return;
                        }
                    }
                }
                _ => {
                    error!("First message was not a valid Init message.");
                    return;
                }
            }
        }
        _ => {
            error!("Client disconnected before sending Init message.");
            return;
        }
    };

    // --- 2. Main Message Loop ---
    let mut timer_task_handle: Option<JoinHandle<()>> = None;

    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                let keep_open = handle_text_message(
                    text.as_str(),
                    &app_state,
                    &session_state_lock,
                    &ws_sender,
                    &mut timer_task_handle,
                )
                .await;
                if !keep_open {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
            None => {
                info!("Client disconnected.");
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    session_state_lock.lock().await.stop_ticking();
    if let Some(handle) = timer_task_handle {
        handle.abort();
    }
    let _ = ws_sender.lock().await.close().await;
    info!("WebSocket connection closed.");
}

/// Handles one client message. Returns false when the connection should close.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<TimerSessionState>>,
    ws_sender: &WsSender,
    timer_task_handle: &mut Option<JoinHandle<()>>,
) -> bool {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return true;
        }
    };

    match client_msg {
        ClientMessage::Start => {
            let mut session = session_state_lock.lock().await;
            if let Err(e) = session.flow.start() {
                drop(session);
                send_message(ws_sender, &ServerMessage::Error { message: e.to_string() }).await;
                return true;
            }
            // One ticking task per connection.
            session.stop_ticking();
            if let Some(handle) = timer_task_handle.take() {
                handle.abort();
            }
            let task = {
                let session_state_lock = session_state_lock.clone();
                let ws_sender = ws_sender.clone();
                let token = session.cancellation_token.clone();
                tokio::spawn(timer_process(session_state_lock, ws_sender, token))
            };
            *timer_task_handle = Some(task);
            drop(session);
            info!("Timer started.");
            send_message(ws_sender, &ServerMessage::TimerStarted).await;
        }
        ClientMessage::Pause => {
            let result = {
                let mut session = session_state_lock.lock().await;
                session.stop_ticking();
                session.flow.pause()
            };
            let reply = match result {
                Ok(()) => ServerMessage::TimerPaused,
                Err(e) => ServerMessage::Error { message: e.to_string() },
            };
            send_message(ws_sender, &reply).await;
        }
        ClientMessage::Suspend => {
            info!("App suspended.");
            session_state_lock.lock().await.flow.suspend(Utc::now());
        }
        ClientMessage::Resume => {
            let (credited, elapsed_seconds) = {
                let mut session = session_state_lock.lock().await;
                let credited = session.flow.resume(Utc::now());
                (credited, session.flow.elapsed_seconds())
            };
            info!("App resumed; credited {}s of background time.", credited);
            send_message(ws_sender, &ServerMessage::Tick { elapsed_seconds }).await;
        }
        ClientMessage::Stop => {
            let (result, elapsed_seconds) = {
                let mut session = session_state_lock.lock().await;
                session.stop_ticking();
                let result = session.flow.stop();
                (result, session.flow.elapsed_seconds())
            };
            let reply = match result {
                Ok(()) => ServerMessage::ReflectionStage { elapsed_seconds },
                Err(e) => ServerMessage::Error { message: e.to_string() },
            };
            send_message(ws_sender, &reply).await;
        }
        ClientMessage::Back => {
            let (outcome, elapsed_seconds) = {
                let mut session = session_state_lock.lock().await;
                let outcome = session.flow.back();
                (outcome, session.flow.elapsed_seconds())
            };
            match outcome {
                BackOutcome::ReturnToTimer => {
                    send_message(ws_sender, &ServerMessage::TimerPaused).await;
                }
                BackOutcome::ConfirmDiscard => {
                    send_message(ws_sender, &ServerMessage::ConfirmDiscard { elapsed_seconds }).await;
                }
                BackOutcome::Leave => {
                    session_state_lock.lock().await.stop_ticking();
                    send_message(ws_sender, &ServerMessage::Discarded).await;
                    return false;
                }
            }
        }
        ClientMessage::ConfirmDiscard => {
            let result = {
                let mut session = session_state_lock.lock().await;
                let result = session.flow.confirm_discard();
                if result.is_ok() {
                    session.stop_ticking();
                }
                result
            };
            match result {
                Ok(()) => {
                    info!("Session discarded by the reader.");
                    send_message(ws_sender, &ServerMessage::Discarded).await;
                    return false;
                }
                Err(e) => {
                    send_message(ws_sender, &ServerMessage::Error { message: e.to_string() }).await;
                }
            }
        }
        ClientMessage::Submit {
            reflection,
            prompt,
            end_unit,
            finished,
        } => {
            return submit(
                app_state,
                session_state_lock,
                ws_sender,
                reflection,
                prompt,
                end_unit,
                finished,
            )
            .await;
        }
        ClientMessage::Init { .. } => {
            warn!("Received subsequent Init message, which is ignored.");
        }
    }
    true
}

/// Sends the finished session to the backend. The flow stays locked until the call returns.
async fn submit(
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<TimerSessionState>>,
    ws_sender: &WsSender,
    reflection: String,
    prompt: Option<String>,
    end_unit: Option<u32>,
    finished: bool,
) -> bool {
    let (ctx, draft) = {
        let mut session = session_state_lock.lock().await;
        let seconds = match session.flow.begin_submit() {
            Ok(seconds) => seconds,
            Err(e) => {
                drop(session);
                send_message(ws_sender, &ServerMessage::Error { message: e.to_string() }).await;
                return true;
            }
        };
        let draft = SessionDraft {
            book: session.book.clone(),
            companion_id: session.companion_id,
            duration_seconds: u32::try_from(seconds).unwrap_or(u32::MAX),
            start_unit: None,
            end_unit,
            reflection,
            prompt,
            finished,
        };
        (session.ctx, draft)
    };

    send_message(ws_sender, &ServerMessage::Submitting).await;
    let result = app_state.submitter.submit(&ctx, draft).await;

    let mut session = session_state_lock.lock().await;
    match result {
        Ok(receipt) => {
            session.flow.submit_succeeded();
            drop(session);
            let msg = ServerMessage::SessionRecorded {
                ink_gained: receipt.reward.ink_gained,
                xp_gained: receipt.reward.xp_gained,
            };
            send_message(ws_sender, &msg).await;
            false
        }
        Err(e) => {
            session.flow.submit_failed();
            drop(session);
            let msg = match e {
                SubmissionError::MissingPrerequisite(message) => ServerMessage::RedirectToLibrary { message },
                other => ServerMessage::Error { message: other.to_string() },
            };
            send_message(ws_sender, &msg).await;
            true
        }
    }
}
