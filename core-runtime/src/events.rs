//! # Event Bus System
//!
//! Typed events broadcast between media core modules using `tokio::sync::broadcast`.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐    emit     ┌───────────┐
//! │ Auth Manager  ├────────────>│           │
//! └───────────────┘             │           │   subscribe   ┌────────────┐
//! ┌───────────────┐    emit     │ EventBus  ├──────────────>│ Host UI    │
//! │ Orchestrator  ├────────────>│ (broadcast│               └────────────┘
//! └───────────────┘             │  channel) │   subscribe   ┌────────────┐
//! ┌───────────────┐    emit     │           ├──────────────>│ Audit log  │
//! │ Media Library ├────────────>│           │               └────────────┘
//! └───────────────┘             └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, TransferEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Transfer(TransferEvent::Started {
//!         file_id: "abc123".to_string(),
//!         category: "gallery_image".to_string(),
//!     }))
//!     .ok();
//!
//! let received = subscriber.recv().await.unwrap();
//! assert_eq!(received.description(), "Transfer started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal.
//! - **`RecvError::Closed`**: all senders were dropped. Treat as shutdown.
//!
//! Emitting with no subscribers returns an error; producers ignore it with
//! `.ok()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Remote file provider credentials
    Auth(AuthEvent),
    /// Moving bytes from the remote provider into object storage
    Transfer(TransferEvent),
    /// Media catalog changes
    Media(MediaEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Transfer(e) => e.description(),
            CoreEvent::Media(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Transfer(TransferEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Transfer(TransferEvent::BatchCompleted { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Transfer(TransferEvent::CleanupCompleted { errors, .. }) if *errors > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Auth(AuthEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Transfer(TransferEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Transfer(TransferEvent::BatchCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Media(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events emitted while obtaining and refreshing remote provider credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// Stored credentials were removed.
    SignedOut { account: String },
    /// Consent flow started.
    SigningIn { account: String },
    /// Authorization code exchanged and tokens persisted.
    SignedIn { account: String },
    /// Access token is being refreshed.
    TokenRefreshing { account: String },
    /// Token refresh completed successfully.
    TokenRefreshed {
        account: String,
        /// Unix epoch seconds.
        expires_at: u64,
    },
    /// Authentication error occurred.
    AuthError {
        account: Option<String>,
        message: String,
        /// Whether a retry can succeed without user interaction.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SignedOut { .. } => "Signed out",
            AuthEvent::SigningIn { .. } => "Authentication in progress",
            AuthEvent::SignedIn { .. } => "Signed in successfully",
            AuthEvent::TokenRefreshing { .. } => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Transfer Events
// ============================================================================

/// Events emitted by the transfer orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TransferEvent {
    Started {
        /// Remote provider file id.
        file_id: String,
        category: String,
    },
    Progress {
        file_id: String,
        /// `downloading`, `uploading`, `processing` or `completed`.
        stage: String,
        percent: u8,
    },
    Completed {
        file_id: String,
        storage_path: String,
        bytes: u64,
    },
    Failed { file_id: String, message: String },
    /// A bulk transfer finished; individual failures are in `failed`.
    BatchCompleted { successful: usize, failed: usize },
    /// Inactive objects were removed to reclaim space.
    CleanupCompleted { cleaned: usize, errors: usize },
}

impl TransferEvent {
    fn description(&self) -> &str {
        match self {
            TransferEvent::Started { .. } => "Transfer started",
            TransferEvent::Progress { .. } => "Transfer progress",
            TransferEvent::Completed { .. } => "Transfer completed",
            TransferEvent::Failed { .. } => "Transfer failed",
            TransferEvent::BatchCompleted { .. } => "Bulk transfer finished",
            TransferEvent::CleanupCompleted { .. } => "Storage cleanup finished",
        }
    }
}

// ============================================================================
// Media Events
// ============================================================================

/// Events emitted when the media catalog changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MediaEvent {
    Registered {
        media_id: String,
        name: String,
        category: String,
    },
    SlotActivated { slot_id: String, category: String },
    SlotDeactivated { slot_id: String, category: String },
    Deleted { media_id: String },
    EventFolderProvisioned { event_id: String, folder_id: String },
}

impl MediaEvent {
    fn description(&self) -> &str {
        match self {
            MediaEvent::Registered { .. } => "Media registered",
            MediaEvent::SlotActivated { .. } => "Homepage slot activated",
            MediaEvent::SlotDeactivated { .. } => "Homepage slot deactivated",
            MediaEvent::Deleted { .. } => "Media deleted",
            MediaEvent::EventFolderProvisioned { .. } => "Event folder provisioned",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every `subscribe()` creates an
/// independent receiver that sees events emitted after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::default();
/// let transfers = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Transfer(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()` and `try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. Returns `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
