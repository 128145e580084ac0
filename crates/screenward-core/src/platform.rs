//! Platform seams for the application under test.
//!
//! The host runtime that owns the application's screens and UI thread is
//! reached only through the traits in this module. A backend implements
//! [`EventInjector`], [`LifecycleMonitor`] and [`Screen`]; the tracker and
//! scroller work against any backend without knowing its details.
//!
//! Injection methods may fail with [`InjectError::PermissionDenied`] when
//! the target window belongs to another process. Callers in this crate
//! swallow that error and carry on as if the event had no effect; use
//! [`allow_denied`] for the same behaviour.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Errors raised by the event injection layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectError {
    /// The platform refused to inject the event.
    #[error("Event injection not permitted")]
    PermissionDenied,

    /// The injection backend is not reachable.
    #[error("Injection backend unavailable: {0}")]
    Unavailable(String),

    /// The owner thread dropped a task before it produced a result.
    #[error("Owner thread dropped the task before completing it")]
    OwnerTaskDropped,
}

/// Errors raised by screens and the lifecycle monitor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Registering with the lifecycle event source failed.
    #[error("Failed to subscribe to lifecycle events: {0}")]
    SubscribeFailed(String),

    /// Releasing a lifecycle subscription failed.
    #[error("Failed to unsubscribe from lifecycle events: {0}")]
    UnsubscribeFailed(String),

    /// A screen refused or failed to close.
    #[error("Failed to finish screen: {0}")]
    FinishFailed(String),
}

/// Hardware keys the injector can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Back,
}

/// Phase of a synthesized pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerAction {
    Down,
    Move,
    Up,
}

/// One synthesized pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub x: f32,
    pub y: f32,
    /// When the gesture's down event was produced; shared by every event
    /// of one gesture.
    pub down_time: DateTime<Utc>,
    /// When this event was produced.
    pub event_time: DateTime<Utc>,
}

impl PointerEvent {
    pub fn new(action: PointerAction, x: f32, y: f32, down_time: DateTime<Utc>) -> Self {
        Self {
            action,
            x,
            y,
            down_time,
            event_time: Utc::now(),
        }
    }
}

/// A unit of work that must run on the thread owning the UI.
pub type OwnerTask = Box<dyn FnOnce() + Send + 'static>;

/// Injects input into the application and marshals work onto its UI thread.
#[async_trait]
pub trait EventInjector: Send + Sync {
    /// Press and release a key, waiting until the application has handled it.
    async fn send_key(&self, key: Key) -> Result<(), InjectError>;

    /// Deliver a pointer event, waiting until the application has handled it.
    async fn send_pointer(&self, event: PointerEvent) -> Result<(), InjectError>;

    /// Run `task` on the UI owner thread and resolve once it has completed.
    async fn run_on_owner(&self, task: OwnerTask) -> Result<(), InjectError>;

    /// Width and height of the default display in pixels.
    fn display_size(&self) -> (u32, u32);
}

/// Runs `f` on the owner thread and returns its result.
///
/// The result travels back through a oneshot channel, so the caller gets
/// the value from the same call that scheduled the work.
pub async fn run_on_owner_with<T, F>(injector: &dyn EventInjector, f: F) -> Result<T, InjectError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    injector
        .run_on_owner(Box::new(move || {
            let _ = tx.send(f());
        }))
        .await?;
    rx.await.map_err(|_| InjectError::OwnerTaskDropped)
}

/// Turns [`InjectError::PermissionDenied`] into success, logging it.
///
/// Any other error is passed through.
pub fn allow_denied(result: Result<(), InjectError>, what: &str) -> Result<(), InjectError> {
    match result {
        Err(InjectError::PermissionDenied) => {
            debug!(event = what, "injection not permitted, ignoring");
            Ok(())
        }
        other => other,
    }
}

/// One top-level application screen.
///
/// The platform owns screens; the tracker only ever holds them weakly.
pub trait Screen: Send + Sync {
    /// The platform's string identity for this screen instance. Two
    /// handles with the same identity denote the same screen.
    fn identity(&self) -> String;

    /// The simple type name of the screen, e.g. `"Checkout"`.
    fn type_name(&self) -> String;

    /// Whether the screen is already closing.
    fn is_finishing(&self) -> bool;

    /// Ask the screen to close.
    fn finish(&self) -> Result<(), PlatformError>;
}

impl std::fmt::Debug for dyn Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("identity", &self.identity())
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// Handle for one registration with a [`LifecycleMonitor`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
}

impl Subscription {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Source of screen lifecycle events.
#[async_trait]
pub trait LifecycleMonitor: Send + Sync {
    /// Register for lifecycle events.
    async fn subscribe(&self) -> Result<Subscription, PlatformError>;

    /// Release a registration obtained from [`subscribe`](Self::subscribe).
    async fn unsubscribe(&self, subscription: Subscription) -> Result<(), PlatformError>;

    /// Wait for the next screen to become active.
    ///
    /// Resolves to `None` only when the event source has closed for good.
    async fn next_active_screen(&self, subscription: &Subscription) -> Option<Arc<dyn Screen>>;

    /// The most recent screen reported active to `subscription`, if any.
    fn last_known_active_screen(&self, subscription: &Subscription) -> Option<Arc<dyn Screen>>;
}
