//! # screenward-core
//!
//! Core library for UI test automation of an application running inside a
//! host runtime.
//!
//! This crate tracks which application screen is frontmost as a test drives
//! the app through transitions, and simulates scroll and drag gestures
//! against scrollable widgets.
//!
//! ## Modules
//!
//! - [`platform`] - Traits for the host runtime: event injection, lifecycle monitoring, screens
//! - [`view`] - Scrollable widget kinds and the candidate view source
//! - [`stack`] - Ordered, weakly-held navigation history of screens
//! - [`tracker`] - Background screen tracking and screen-level navigation
//! - [`scroll`] - Scroll strategies and drag gestures
//! - [`sleeper`] - Configurable pauses
//! - [`config`] - Persistent configuration
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use screenward_core::config::ScreenwardConfig;
//! use screenward_core::platform::{EventInjector, LifecycleMonitor};
//! use screenward_core::scroll::Scroller;
//! use screenward_core::tracker::ScreenTracker;
//! use screenward_core::view::ViewFetcher;
//!
//! async fn checkout_flow(
//!     monitor: Arc<dyn LifecycleMonitor>,
//!     injector: Arc<dyn EventInjector>,
//!     fetcher: Arc<dyn ViewFetcher>,
//! ) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScreenwardConfig::load();
//!     let tracker = ScreenTracker::start(config.clone(), monitor, injector.clone(), None).await;
//!     let scroller = Scroller::new(&config, injector, fetcher);
//!
//!     while scroller.scroll_down().await? {}
//!     tracker.navigate_back_to("Home").await?;
//!
//!     tracker.finish_all_open_screens().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod platform;
pub mod scroll;
pub mod sleeper;
pub mod stack;
pub mod tracker;
pub mod view;
