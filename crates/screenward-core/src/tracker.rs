//! Tracking of the frontmost application screen.
//!
//! [`ScreenTracker`] keeps a [`ScreenStack`] of the screens the application
//! has shown, newest on top. A background listener task consumes
//! activations from the platform's [`LifecycleMonitor`] and is the only
//! regular writer; queries take a snapshot under a read lock.
//!
//! # Lifetime
//!
//! [`ScreenTracker::start`] subscribes to the monitor and spawns the
//! listener. [`ScreenTracker::finish_all_open_screens`] is the explicit
//! teardown: it stops the listener, closes every tracked screen and
//! releases the subscription. Calling it is the caller's obligation;
//! dropping the tracker only cancels the listener.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use screenward_core::config::ScreenwardConfig;
//! use screenward_core::platform::{EventInjector, LifecycleMonitor};
//! use screenward_core::tracker::ScreenTracker;
//!
//! async fn run(monitor: Arc<dyn LifecycleMonitor>, injector: Arc<dyn EventInjector>) {
//!     let tracker = ScreenTracker::start(ScreenwardConfig::load(), monitor, injector, None).await;
//!
//!     if let Ok(Some(screen)) = tracker.current_screen().await {
//!         println!("frontmost: {}", screen.type_name());
//!     }
//!
//!     tracker.finish_all_open_screens().await;
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info, info_span, warn, Instrument};

use crate::config::ScreenwardConfig;
use crate::platform::{allow_denied, EventInjector, InjectError, Key, LifecycleMonitor, Screen, Subscription};
use crate::sleeper::Sleeper;
use crate::stack::{ScreenStack, StackEvent};

/// Pause between closing consecutive screens and between paired back presses.
const FINISH_PACING_MS: u64 = 100;

/// Capacity of the stack event broadcast channel.
const EVENT_CAPACITY: usize = 100;

/// Errors returned by [`ScreenTracker`] operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// No open screen has the requested type name.
    #[error("No screen named '{name}' has been opened (open: [{}])", .opened.join(", "))]
    NotFound {
        name: String,
        /// Type names of the screens open at the time, oldest first.
        opened: Vec<String>,
    },

    /// A bounded wait expired.
    #[error("Gave up waiting for a screen after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// Injecting an event failed for a reason other than permission.
    #[error("Event injection failed: {0}")]
    Inject(#[from] InjectError),
}

struct ListenerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Tracks the application's screens as it navigates between them.
pub struct ScreenTracker {
    config: ScreenwardConfig,
    monitor: Arc<dyn LifecycleMonitor>,
    injector: Arc<dyn EventInjector>,
    sleeper: Sleeper,
    stack: Arc<RwLock<ScreenStack>>,
    subscription: Mutex<Option<Subscription>>,
    /// Whether activations should be registered on the stack.
    registering: AtomicBool,
    listener: Mutex<Option<ListenerHandle>>,
    /// The seed screen when tracking is disabled.
    untracked_screen: Mutex<Option<Arc<dyn Screen>>>,
    /// Last screen handed out by `current_screen`, reported when the stack is empty.
    last_current: Mutex<Option<Weak<dyn Screen>>>,
    event_tx: broadcast::Sender<StackEvent>,
}

impl ScreenTracker {
    /// Creates a tracker and, when tracking is enabled, subscribes to the
    /// monitor and spawns the listener.
    ///
    /// `seed` is the screen the application was started on. With tracking
    /// enabled it becomes the bottom of the stack; with tracking disabled it
    /// is the only screen the tracker ever reports.
    ///
    /// A failed subscription is logged and retried the next time a caller
    /// waits for a screen.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(
        config: ScreenwardConfig,
        monitor: Arc<dyn LifecycleMonitor>,
        injector: Arc<dyn EventInjector>,
        seed: Option<Arc<dyn Screen>>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let mut stack = ScreenStack::new();
        let mut untracked_screen = None;
        if let Some(seed) = seed {
            if config.track_screens {
                stack.push(&seed);
            } else {
                untracked_screen = Some(seed);
            }
        }

        let tracker = Self {
            sleeper: Sleeper::new(config.timing),
            registering: AtomicBool::new(config.track_screens),
            config,
            monitor,
            injector,
            stack: Arc::new(RwLock::new(stack)),
            subscription: Mutex::new(None),
            listener: Mutex::new(None),
            untracked_screen: Mutex::new(untracked_screen),
            last_current: Mutex::new(None),
            event_tx,
        };

        if tracker.config.track_screens && tracker.ensure_subscribed().await.is_some() {
            tracker.start_listener().await;
        }
        info!(tracking = tracker.config.track_screens, "screen tracker started");
        tracker
    }

    /// Subscribes to stack changes.
    ///
    /// Receivers may miss events if they lag too far behind.
    pub fn subscribe(&self) -> broadcast::Receiver<StackEvent> {
        self.event_tx.subscribe()
    }

    /// The current monitor subscription, if any.
    pub async fn subscription(&self) -> Option<Subscription> {
        self.subscription.lock().await.clone()
    }

    /// Whether activations are being registered on the stack.
    pub fn should_register_screens(&self) -> bool {
        self.registering.load(Ordering::SeqCst)
    }

    /// Starts or stops registering activations.
    ///
    /// Stopping cancels the listener, including a wait already in flight.
    /// Starting respawns it when a subscription exists.
    pub async fn set_register_screens(&self, register: bool) {
        self.registering.store(register, Ordering::SeqCst);
        if register {
            if self.subscription.lock().await.is_some() {
                self.start_listener().await;
            }
        } else {
            self.stop_listener().await;
        }
    }

    /// All live screens on the stack, oldest activation first.
    pub async fn all_open_screens(&self) -> Vec<Arc<dyn Screen>> {
        self.stack.read().await.live_screens()
    }

    /// Identity of the most recently activated screen, or an empty string
    /// when nothing has been recorded.
    pub async fn current_screen_name(&self) -> String {
        self.stack
            .read()
            .await
            .top_identity()
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// True when no live screen is on the stack.
    pub async fn is_stack_empty(&self) -> bool {
        self.stack.read().await.is_empty()
    }

    /// The frontmost screen after a default pause, waiting for one to
    /// become available.
    ///
    /// Equivalent to `current_screen_with(true, true)`.
    pub async fn current_screen(&self) -> Result<Option<Arc<dyn Screen>>, TrackerError> {
        self.current_screen_with(true, true).await
    }

    /// The frontmost screen.
    ///
    /// With `pause_first` a default pause runs before anything else. With
    /// tracking disabled the seed screen is returned. With
    /// `wait_for_screen` the call waits until the stack's top screen is
    /// alive, polling the monitor for its last known active screen; that
    /// wait is unbounded unless `screen_wait_timeout_ms` is configured.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::Timeout`] if a configured wait bound expires
    pub async fn current_screen_with(
        &self,
        pause_first: bool,
        wait_for_screen: bool,
    ) -> Result<Option<Arc<dyn Screen>>, TrackerError> {
        let span = debug_span!("current_screen", wait_for_screen);
        self.current_screen_inner(pause_first, wait_for_screen, Instant::now())
            .instrument(span)
            .await
    }

    /// `started` is when the caller's bounded wait began.
    async fn current_screen_inner(
        &self,
        pause_first: bool,
        wait_for_screen: bool,
        started: Instant,
    ) -> Result<Option<Arc<dyn Screen>>, TrackerError> {
        if pause_first {
            self.sleeper.pause().await;
        }
        if !self.config.track_screens {
            return Ok(self.untracked_screen.lock().await.clone());
        }
        if wait_for_screen {
            self.wait_for_screen(started).await?;
        }
        Ok(self.top_or_last_current().await)
    }

    /// Presses back until the frontmost screen's type name is `name`.
    ///
    /// Back presses the platform refuses are ignored. The loop is unbounded
    /// unless `screen_wait_timeout_ms` is configured.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::NotFound`] if no open screen has type name `name`
    /// - [`TrackerError::Timeout`] if a configured bound expires
    /// - [`TrackerError::Inject`] if a back press fails for another reason
    pub async fn navigate_back_to(&self, name: &str) -> Result<(), TrackerError> {
        let span = info_span!("navigate_back_to", target_screen = name);
        self.navigate_back_to_inner(name).instrument(span).await
    }

    async fn navigate_back_to_inner(&self, name: &str) -> Result<(), TrackerError> {
        let opened: Vec<String> = self
            .all_open_screens()
            .await
            .iter()
            .map(|s| s.type_name())
            .collect();

        if !opened.iter().any(|n| n == name) {
            for screen in &opened {
                debug!(screen = %screen, "screen previously opened");
            }
            return Err(TrackerError::NotFound {
                name: name.to_string(),
                opened,
            });
        }

        let started = Instant::now();
        loop {
            self.check_timeout(started)?;
            let current = self.current_screen_inner(true, true, started).await?;
            if current.is_some_and(|s| s.type_name() == name) {
                return Ok(());
            }
            allow_denied(self.injector.send_key(Key::Back).await, "back")?;
        }
    }

    /// Closes every tracked screen and releases the monitor.
    ///
    /// Stops the listener first. With tracking disabled this only presses
    /// back. Otherwise open screens are finished newest first, then the
    /// current screen, then the subscription is released, registration is
    /// disabled and the stack is cleared. Safe to call more than once.
    pub async fn finish_all_open_screens(&self) {
        async {
            self.stop_listener().await;
            if !self.config.track_screens {
                self.press_back(3).await;
                return;
            }

            let opened = self.all_open_screens().await;
            info!(count = opened.len(), "finishing open screens");
            for screen in opened.iter().rev() {
                self.sleeper.pause_for(FINISH_PACING_MS).await;
                finish_screen(screen);
            }
            drop(opened);

            self.sleeper.pause_for(FINISH_PACING_MS).await;
            self.sleeper.pause().await;
            if let Some(current) = self.top_or_last_current().await {
                finish_screen(&current);
            }

            self.release_subscription().await;
            self.registering.store(false, Ordering::SeqCst);
            *self.last_current.lock().await = None;
            self.sleeper.short_pause().await;
            self.press_back(1).await;

            let event = self.stack.write().await.clear();
            let _ = self.event_tx.send(event);
        }
        .instrument(info_span!("finish_all_open_screens"))
        .await
    }

    /// Returns the top screen if anything is recorded, else the last screen
    /// handed out.
    async fn top_or_last_current(&self) -> Option<Arc<dyn Screen>> {
        let top = {
            let stack = self.stack.read().await;
            if stack.len() == 0 {
                None
            } else {
                Some(stack.top())
            }
        };
        let mut last_current = self.last_current.lock().await;
        match top {
            Some(top) => {
                *last_current = top.as_ref().map(Arc::downgrade);
                top
            }
            None => last_current.as_ref().and_then(Weak::upgrade),
        }
    }

    /// Waits until the stack's top screen is alive.
    async fn wait_for_screen(&self, started: Instant) -> Result<(), TrackerError> {
        loop {
            if self.stack.read().await.has_live_top() {
                return Ok(());
            }

            if let Some(subscription) = self.ensure_subscribed().await {
                if self.should_register_screens() {
                    self.start_listener().await;
                }
                loop {
                    let live = {
                        let mut stack = self.stack.write().await;
                        if let Some(screen) = self.monitor.last_known_active_screen(&subscription) {
                            debug!(screen = %screen.identity(), "picked up last known active screen");
                            publish(&self.event_tx, stack.record_activation(&screen));
                        }
                        // A finishing screen is not recorded, so the top may still be missing
                        stack.has_live_top()
                    };
                    if live {
                        return Ok(());
                    }
                    self.check_timeout(started)?;
                    self.sleeper.short_pause().await;
                }
            }

            self.check_timeout(started)?;
            self.sleeper.short_pause().await;
        }
    }

    fn check_timeout(&self, started: Instant) -> Result<(), TrackerError> {
        match self.config.screen_wait_timeout() {
            Some(limit) if started.elapsed() >= limit => Err(TrackerError::Timeout {
                waited_ms: started.elapsed().as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }

    /// Returns the subscription, subscribing first if there is none.
    async fn ensure_subscribed(&self) -> Option<Subscription> {
        let mut subscription = self.subscription.lock().await;
        if subscription.is_none() {
            match self.monitor.subscribe().await {
                Ok(sub) => {
                    debug!(subscription = sub.id(), "subscribed to lifecycle monitor");
                    *subscription = Some(sub);
                }
                Err(e) => warn!(error = %e, "lifecycle monitor subscription failed"),
            }
        }
        subscription.clone()
    }

    async fn release_subscription(&self) {
        let taken = self.subscription.lock().await.take();
        if let Some(sub) = taken {
            let id = sub.id();
            match self.monitor.unsubscribe(sub).await {
                Ok(()) => debug!(subscription = id, "unsubscribed from lifecycle monitor"),
                Err(e) => warn!(subscription = id, error = %e, "failed to unsubscribe"),
            }
        }
    }

    /// Spawns the listener unless one is already running.
    async fn start_listener(&self) {
        let Some(subscription) = self.subscription.lock().await.clone() else {
            return;
        };
        let mut listener = self.listener.lock().await;
        if listener.as_ref().is_some_and(|l| !l.join.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let join = tokio::spawn(
            run_listener(
                self.stack.clone(),
                self.monitor.clone(),
                subscription,
                cancel.clone(),
                self.event_tx.clone(),
            )
            .instrument(debug_span!("screen_listener")),
        );
        *listener = Some(ListenerHandle { cancel, join });
    }

    /// Cancels the listener and waits for it to exit.
    async fn stop_listener(&self) {
        let taken = self.listener.lock().await.take();
        if let Some(handle) = taken {
            handle.cancel.cancel();
            let _ = handle.join.await;
        }
    }

    /// Presses back `times` times, each press being two back events
    /// separated by a short pause. Every failure is ignored.
    async fn press_back(&self, times: u32) {
        for _ in 0..times {
            let pressed: Result<(), InjectError> = async {
                self.injector.send_key(Key::Back).await?;
                self.sleeper.pause_for(FINISH_PACING_MS).await;
                self.injector.send_key(Key::Back).await
            }
            .await;
            if let Err(e) = pressed {
                debug!(error = %e, "back press failed, ignoring");
            }
        }
    }
}

impl Drop for ScreenTracker {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for ScreenTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenTracker")
            .field("config", &self.config)
            .field("registering", &self.should_register_screens())
            .field("stack", &"<RwLock<ScreenStack>>")
            .field("event_tx", &"<broadcast::Sender>")
            .finish()
    }
}

async fn run_listener(
    stack: Arc<RwLock<ScreenStack>>,
    monitor: Arc<dyn LifecycleMonitor>,
    subscription: Subscription,
    cancel: CancellationToken,
    event_tx: broadcast::Sender<StackEvent>,
) {
    debug!(subscription = subscription.id(), "listener running");
    loop {
        let screen = tokio::select! {
            _ = cancel.cancelled() => break,
            screen = monitor.next_active_screen(&subscription) => screen,
        };
        let Some(screen) = screen else {
            debug!("lifecycle event source closed");
            break;
        };
        let events = stack.write().await.record_activation(&screen);
        publish(&event_tx, events);
    }
    debug!("listener stopped");
}

fn publish(event_tx: &broadcast::Sender<StackEvent>, events: Vec<StackEvent>) {
    for event in events {
        debug!(?event, "stack updated");
        // No subscribers is expected
        let _ = event_tx.send(event);
    }
}

fn finish_screen(screen: &Arc<dyn Screen>) {
    if let Err(e) = screen.finish() {
        warn!(screen = %screen.identity(), error = %e, "screen failed to finish");
    }
}
