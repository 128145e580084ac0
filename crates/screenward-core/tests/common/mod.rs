//! Shared test helpers for screenward-core integration tests.
//!
//! This module provides a scriptable mock platform: an application with its
//! own back stack that reports activations like a real lifecycle monitor,
//! records injected input, and runs owner-thread tasks inline. It also
//! provides mock scrollable widgets and a view fetcher.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use screenward_core::config::{ScreenwardConfig, Timing};
use screenward_core::platform::{
    EventInjector, InjectError, Key, LifecycleMonitor, OwnerTask, PlatformError, PointerEvent,
    Screen, Subscription,
};
use screenward_core::stack::StackEvent;
use screenward_core::view::{ListView, ScrollView, Scrollable, View, ViewFetcher, WebContent};

/// Upper bound for any single wait in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Config with millisecond pauses so tests run quickly.
pub fn test_config() -> ScreenwardConfig {
    ScreenwardConfig {
        timing: Timing {
            pause_ms: 1,
            mini_pause_ms: 1,
        },
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Screens
// ---------------------------------------------------------------------------

/// A screen that records when it is asked to finish.
pub struct MockScreen {
    type_name: String,
    identity: String,
    finishing: AtomicBool,
    finish_log: Arc<Mutex<Vec<String>>>,
}

impl MockScreen {
    pub fn new(type_name: &str, instance: u32, finish_log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            type_name: type_name.to_string(),
            identity: format!("com.example.{}@{:x}", type_name, instance),
            finishing: AtomicBool::new(false),
            finish_log,
        })
    }

    /// Marks the screen as closing without logging a finish call.
    pub fn mark_finishing(&self) {
        self.finishing.store(true, Ordering::SeqCst);
    }
}

impl Screen for MockScreen {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn is_finishing(&self) -> bool {
        self.finishing.load(Ordering::SeqCst)
    }

    fn finish(&self) -> Result<(), PlatformError> {
        self.finishing.store(true, Ordering::SeqCst);
        self.finish_log.lock().unwrap().push(self.type_name.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Programmable mock application
// ---------------------------------------------------------------------------

/// A mock application implementing both the lifecycle monitor and the
/// event injector.
pub struct MockApp {
    back_stack: Mutex<Vec<Arc<MockScreen>>>,
    events_tx: mpsc::UnboundedSender<Arc<MockScreen>>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Arc<MockScreen>>>,
    last_active: Mutex<Option<Arc<MockScreen>>>,
    next_subscription: AtomicU64,
    failing_subscribes: AtomicU32,
    pub subscribe_calls: AtomicU32,
    pub unsubscribed: Mutex<Vec<u64>>,
    pub keys: Mutex<Vec<Key>>,
    pub pointers: Mutex<Vec<PointerEvent>>,
    pub owner_tasks: AtomicU32,
    deny_injection: AtomicBool,
    back_navigates: AtomicBool,
    display: (u32, u32),
    pub finish_log: Arc<Mutex<Vec<String>>>,
    next_instance: AtomicU32,
}

impl MockApp {
    pub fn new() -> Arc<Self> {
        Self::with_display(1080, 1920)
    }

    pub fn with_display(width: u32, height: u32) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            back_stack: Mutex::new(Vec::new()),
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
            last_active: Mutex::new(None),
            next_subscription: AtomicU64::new(1),
            failing_subscribes: AtomicU32::new(0),
            subscribe_calls: AtomicU32::new(0),
            unsubscribed: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
            pointers: Mutex::new(Vec::new()),
            owner_tasks: AtomicU32::new(0),
            deny_injection: AtomicBool::new(false),
            back_navigates: AtomicBool::new(false),
            display: (width, height),
            finish_log: Arc::new(Mutex::new(Vec::new())),
            next_instance: AtomicU32::new(1),
        })
    }

    /// Creates a screen of the given type with a fresh identity.
    pub fn screen(&self, type_name: &str) -> Arc<MockScreen> {
        let instance = self.next_instance.fetch_add(1, Ordering::SeqCst);
        MockScreen::new(type_name, 0x1000 + instance, self.finish_log.clone())
    }

    /// Opens `screen` on top of the app's back stack and reports it active.
    pub fn launch(&self, screen: &Arc<MockScreen>) {
        self.back_stack.lock().unwrap().push(screen.clone());
        self.report_active(screen);
    }

    /// Reports `screen` active without touching the back stack.
    pub fn report_active(&self, screen: &Arc<MockScreen>) {
        *self.last_active.lock().unwrap() = Some(screen.clone());
        let _ = self.events_tx.send(screen.clone());
    }

    /// Sets the last known active screen without emitting an event.
    pub fn set_last_active(&self, screen: &Arc<MockScreen>) {
        *self.last_active.lock().unwrap() = Some(screen.clone());
    }

    /// Makes the next `count` subscribe calls fail.
    pub fn fail_next_subscribes(&self, count: u32) {
        self.failing_subscribes.store(count, Ordering::SeqCst);
    }

    /// Refuse every injected event and owner task with a permission error.
    pub fn deny_injection(&self, deny: bool) {
        self.deny_injection.store(deny, Ordering::SeqCst);
    }

    /// Make back presses close the top screen and activate the one below.
    pub fn set_back_navigates(&self, navigates: bool) {
        self.back_navigates.store(navigates, Ordering::SeqCst);
    }

    pub fn back_presses(&self) -> usize {
        self.keys.lock().unwrap().iter().filter(|k| **k == Key::Back).count()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finish_log.lock().unwrap().clone()
    }

    fn denied(&self) -> bool {
        self.deny_injection.load(Ordering::SeqCst)
    }

    fn navigate_back(&self) {
        let revealed = {
            let mut stack = self.back_stack.lock().unwrap();
            if let Some(closed) = stack.pop() {
                let _ = closed.finish();
            }
            stack.last().cloned()
        };
        if let Some(screen) = revealed {
            self.report_active(&screen);
        }
    }
}

#[async_trait]
impl LifecycleMonitor for MockApp {
    async fn subscribe(&self) -> Result<Subscription, PlatformError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_subscribes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_subscribes.store(failing - 1, Ordering::SeqCst);
            return Err(PlatformError::SubscribeFailed("monitor busy".to_string()));
        }
        Ok(Subscription::new(self.next_subscription.fetch_add(1, Ordering::SeqCst)))
    }

    async fn unsubscribe(&self, subscription: Subscription) -> Result<(), PlatformError> {
        self.unsubscribed.lock().unwrap().push(subscription.id());
        Ok(())
    }

    async fn next_active_screen(&self, _subscription: &Subscription) -> Option<Arc<dyn Screen>> {
        let screen = self.events_rx.lock().await.recv().await?;
        Some(screen as Arc<dyn Screen>)
    }

    fn last_known_active_screen(&self, _subscription: &Subscription) -> Option<Arc<dyn Screen>> {
        self.last_active
            .lock()
            .unwrap()
            .clone()
            .map(|s| s as Arc<dyn Screen>)
    }
}

#[async_trait]
impl EventInjector for MockApp {
    async fn send_key(&self, key: Key) -> Result<(), InjectError> {
        self.keys.lock().unwrap().push(key);
        if self.denied() {
            return Err(InjectError::PermissionDenied);
        }
        if key == Key::Back && self.back_navigates.load(Ordering::SeqCst) {
            self.navigate_back();
        }
        Ok(())
    }

    async fn send_pointer(&self, event: PointerEvent) -> Result<(), InjectError> {
        self.pointers.lock().unwrap().push(event);
        if self.denied() {
            return Err(InjectError::PermissionDenied);
        }
        Ok(())
    }

    async fn run_on_owner(&self, task: OwnerTask) -> Result<(), InjectError> {
        self.owner_tasks.fetch_add(1, Ordering::SeqCst);
        if self.denied() {
            return Err(InjectError::PermissionDenied);
        }
        task();
        Ok(())
    }

    fn display_size(&self) -> (u32, u32) {
        self.display
    }
}

/// Waits until the tracker publishes a push of `identity`.
pub async fn expect_pushed(rx: &mut broadcast::Receiver<StackEvent>, identity: &str) {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(StackEvent::Pushed { identity: pushed, .. }) if pushed == identity => return,
                Ok(_) => continue,
                Err(e) => panic!("stack event channel failed: {e}"),
            }
        }
    };
    tokio::time::timeout(TEST_TIMEOUT, wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {identity} to be pushed"));
}

/// Waits until the tracker publishes a removal of `identity`.
pub async fn expect_removed(rx: &mut broadcast::Receiver<StackEvent>, identity: &str) {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(StackEvent::Removed { identity: removed, .. }) if removed == identity => return,
                Ok(_) => continue,
                Err(e) => panic!("stack event channel failed: {e}"),
            }
        }
    };
    tokio::time::timeout(TEST_TIMEOUT, wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {identity} to be removed"));
}

// ---------------------------------------------------------------------------
// Scrollable widgets
// ---------------------------------------------------------------------------

/// A pixel-offset scroll container.
pub struct MockScrollView {
    pub location: (i32, i32),
    pub width: i32,
    pub height: i32,
    content_height: i32,
    scroll_y: AtomicI32,
    /// Flip between two offsets on every scroll, never settling.
    oscillate: bool,
}

impl MockScrollView {
    pub fn new(height: i32, content_height: i32) -> Arc<Self> {
        Arc::new(Self {
            location: (0, 0),
            width: 1080,
            height,
            content_height,
            scroll_y: AtomicI32::new(0),
            oscillate: false,
        })
    }

    pub fn oscillating(height: i32) -> Arc<Self> {
        Arc::new(Self {
            location: (0, 0),
            width: 1080,
            height,
            content_height: height * 10,
            scroll_y: AtomicI32::new(0),
            oscillate: true,
        })
    }

    pub fn max_scroll(&self) -> i32 {
        (self.content_height - self.height).max(0)
    }

    pub fn set_scroll_y(&self, y: i32) {
        self.scroll_y.store(y, Ordering::SeqCst);
    }
}

impl View for MockScrollView {
    fn location_on_screen(&self) -> (i32, i32) {
        self.location
    }

    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }
}

impl ScrollView for MockScrollView {
    fn scroll_y(&self) -> i32 {
        self.scroll_y.load(Ordering::SeqCst)
    }

    fn scroll_by(&self, _dx: i32, dy: i32) {
        let current = self.scroll_y.load(Ordering::SeqCst);
        let next = if self.oscillate {
            if current == 0 { 1 } else { 0 }
        } else {
            (current + dy).clamp(0, self.max_scroll())
        };
        self.scroll_y.store(next, Ordering::SeqCst);
    }
}

/// A line-based list or grid.
pub struct MockListView {
    count: i32,
    visible: i32,
    first: AtomicI32,
    grid: bool,
    pub selections: Mutex<Vec<i32>>,
}

impl MockListView {
    pub fn new(count: i32, visible: i32) -> Arc<Self> {
        Self::build(count, visible, false)
    }

    pub fn grid(count: i32, visible: i32) -> Arc<Self> {
        Self::build(count, visible, true)
    }

    fn build(count: i32, visible: i32, grid: bool) -> Arc<Self> {
        Arc::new(Self {
            count,
            visible,
            first: AtomicI32::new(0),
            grid,
            selections: Mutex::new(Vec::new()),
        })
    }

    pub fn show_from(&self, first: i32) {
        self.first.store(first, Ordering::SeqCst);
    }

    pub fn selections(&self) -> Vec<i32> {
        self.selections.lock().unwrap().clone()
    }
}

impl View for MockListView {
    fn location_on_screen(&self) -> (i32, i32) {
        (0, 0)
    }

    fn width(&self) -> i32 {
        1080
    }

    fn height(&self) -> i32 {
        1600
    }
}

impl ListView for MockListView {
    fn count(&self) -> i32 {
        self.count
    }

    fn first_visible_position(&self) -> i32 {
        self.first.load(Ordering::SeqCst)
    }

    fn last_visible_position(&self) -> i32 {
        (self.first_visible_position() + self.visible - 1).min(self.count - 1)
    }

    fn set_selection(&self, line: i32) {
        self.selections.lock().unwrap().push(line);
        let first = line.min(self.count - self.visible).max(0);
        self.first.store(first, Ordering::SeqCst);
    }

    fn is_grid(&self) -> bool {
        self.grid
    }
}

/// Web content with a fixed number of pages.
pub struct MockWebView {
    pages: i32,
    page: AtomicI32,
}

impl MockWebView {
    pub fn new(pages: i32) -> Arc<Self> {
        Arc::new(Self {
            pages,
            page: AtomicI32::new(0),
        })
    }

    pub fn page(&self) -> i32 {
        self.page.load(Ordering::SeqCst)
    }
}

impl View for MockWebView {
    fn location_on_screen(&self) -> (i32, i32) {
        (0, 0)
    }

    fn width(&self) -> i32 {
        1080
    }

    fn height(&self) -> i32 {
        1600
    }
}

impl WebContent for MockWebView {
    fn page_down(&self, bottom: bool) -> bool {
        let page = self.page();
        if page >= self.pages - 1 {
            return false;
        }
        let next = if bottom { self.pages - 1 } else { page + 1 };
        self.page.store(next, Ordering::SeqCst);
        true
    }

    fn page_up(&self, top: bool) -> bool {
        let page = self.page();
        if page == 0 {
            return false;
        }
        let next = if top { 0 } else { page - 1 };
        self.page.store(next, Ordering::SeqCst);
        true
    }
}

/// Fetcher that treats the last view of any slice as the freshest.
pub struct MockFetcher {
    pub scrollables: Vec<Scrollable>,
    pub recyclers: Vec<Scrollable>,
}

impl MockFetcher {
    pub fn new(scrollables: Vec<Scrollable>, recyclers: Vec<Scrollable>) -> Arc<Self> {
        Arc::new(Self {
            scrollables,
            recyclers,
        })
    }
}

impl ViewFetcher for MockFetcher {
    fn scrollable_views(&self) -> Vec<Scrollable> {
        self.scrollables.clone()
    }

    fn recycler_views(&self) -> Vec<Scrollable> {
        self.recyclers.clone()
    }

    fn freshest_view(&self, views: &[Scrollable]) -> Option<Scrollable> {
        views.last().cloned()
    }
}
