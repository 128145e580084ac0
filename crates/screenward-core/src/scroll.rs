//! Scroll and drag gesture simulation.
//!
//! [`Scroller`] picks the scrollable widget the user touched last and
//! scrolls it with the strategy matching its [`Scrollable`] kind:
//!
//! - **List** widgets scroll by line through selection changes
//! - **Web** widgets scroll by page
//! - **Generic** widgets scroll by pixel offset, and report the end of
//!   their content when an offset change has no effect
//!
//! Mutations run on the UI owner thread through
//! [`EventInjector::run_on_owner`]; each call awaits their completion.
//! Horizontal paging is a synthesized [`drag`](Scroller::drag).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use screenward_core::config::ScreenwardConfig;
//! use screenward_core::platform::EventInjector;
//! use screenward_core::scroll::{Scroller, Side};
//! use screenward_core::view::ViewFetcher;
//!
//! async fn page(injector: Arc<dyn EventInjector>, fetcher: Arc<dyn ViewFetcher>) {
//!     let scroller = Scroller::new(&ScreenwardConfig::default(), injector, fetcher);
//!
//!     while scroller.scroll_down().await.unwrap_or(false) {}
//!     scroller.scroll_to_side(Side::Right, 0.75, 20).await.ok();
//! }
//! ```

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, debug_span, Instrument};

use crate::config::ScreenwardConfig;
use crate::platform::{
    allow_denied, run_on_owner_with, EventInjector, InjectError, PointerAction, PointerEvent,
};
use crate::sleeper::Sleeper;
use crate::view::{ListView, ScrollView, Scrollable, View, ViewFetcher, WebContent};

/// X coordinate a leftward screen swipe starts from, clear of the edge.
const SIDE_SWIPE_START_X: f32 = 70.0;

/// Vertical scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Move the viewport toward the end of the content.
    Down,
    /// Move the viewport toward the start of the content.
    Up,
}

/// Horizontal side to drag toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Errors returned by [`Scroller`] operations.
#[derive(Error, Debug)]
pub enum ScrollError {
    /// The view kept moving past the configured attempt bound.
    #[error("View still moving after {attempts} scroll attempts")]
    NeverSettled { attempts: u32 },

    /// Injecting an event failed for a reason other than permission.
    #[error("Event injection failed: {0}")]
    Inject(#[from] InjectError),
}

/// What one list scroll step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListScrollPlan {
    /// Line to select, if any.
    pub line: Option<i32>,
    /// Whether more scrolling may be possible afterwards.
    pub more: bool,
}

/// Plans one scroll step for a list of `count` lines showing lines
/// `first..=last`.
pub fn plan_list_scroll(
    count: i32,
    first: i32,
    last: i32,
    direction: Direction,
    all_the_way: bool,
) -> ListScrollPlan {
    match direction {
        Direction::Down => {
            if all_the_way {
                return ListScrollPlan { line: Some(count - 1), more: false };
            }
            if last >= count - 1 {
                let line = (last > 0).then_some(last);
                return ListScrollPlan { line, more: false };
            }
            let line = if first != last { last } else { first + 1 };
            ListScrollPlan { line: Some(line), more: true }
        }
        Direction::Up => {
            if all_the_way || first < 2 {
                return ListScrollPlan { line: Some(0), more: false };
            }
            let lines = last - first;
            let mut line = first - lines;
            if line == last {
                line -= 1;
            }
            ListScrollPlan { line: Some(line.max(0)), more: true }
        }
    }
}

/// Scrolls and drags widgets of the application under test.
pub struct Scroller {
    injector: Arc<dyn EventInjector>,
    fetcher: Arc<dyn ViewFetcher>,
    sleeper: Sleeper,
    should_scroll: bool,
    max_scroll_steps: Option<u32>,
}

impl Scroller {
    pub fn new(
        config: &ScreenwardConfig,
        injector: Arc<dyn EventInjector>,
        fetcher: Arc<dyn ViewFetcher>,
    ) -> Self {
        Self {
            injector,
            fetcher,
            sleeper: Sleeper::new(config.timing),
            should_scroll: config.should_scroll,
            max_scroll_steps: config.max_scroll_steps,
        }
    }

    /// Touches `(from_x, from_y)`, drags in `step_count` even steps and
    /// releases at `(to_x, to_y)`.
    ///
    /// Events the platform refuses to inject are skipped.
    pub async fn drag(
        &self,
        from_x: f32,
        to_x: f32,
        from_y: f32,
        to_y: f32,
        step_count: u32,
    ) -> Result<(), ScrollError> {
        let down_time = Utc::now();
        let (x_step, y_step) = if step_count == 0 {
            (0.0, 0.0)
        } else {
            (
                (to_x - from_x) / step_count as f32,
                (to_y - from_y) / step_count as f32,
            )
        };

        let down = PointerEvent::new(PointerAction::Down, from_x, from_y, down_time);
        allow_denied(self.injector.send_pointer(down).await, "pointer down")?;

        let (mut x, mut y) = (from_x, from_y);
        for _ in 0..step_count {
            x += x_step;
            y += y_step;
            let event = PointerEvent::new(PointerAction::Move, x, y, down_time);
            allow_denied(self.injector.send_pointer(event).await, "pointer move")?;
        }

        let up = PointerEvent::new(PointerAction::Up, to_x, to_y, down_time);
        allow_denied(self.injector.send_pointer(up).await, "pointer up")?;
        Ok(())
    }

    /// Scrolls `view` by one viewport height less one pixel.
    ///
    /// Returns `true` if the scroll offset changed, `false` if the view was
    /// already at the end in `direction`.
    pub async fn scroll_view(
        &self,
        view: &Arc<dyn ScrollView>,
        direction: Direction,
    ) -> Result<bool, ScrollError> {
        let height = view.height() - 1;
        let amount = match direction {
            Direction::Down => height,
            Direction::Up => -height,
        };
        let original_y = view.scroll_y();

        let target = view.clone();
        self.on_owner("scroll by", move || target.scroll_by(0, amount)).await?;

        Ok(view.scroll_y() != original_y)
    }

    /// Scrolls `view` until it stops moving.
    ///
    /// Unbounded unless `max_scroll_steps` is configured, in which case at
    /// most that many scrolls may move the view.
    ///
    /// # Errors
    ///
    /// - [`ScrollError::NeverSettled`] if the view keeps moving past the bound
    pub async fn scroll_view_all_the_way(
        &self,
        view: &Arc<dyn ScrollView>,
        direction: Direction,
    ) -> Result<(), ScrollError> {
        let mut attempts: u32 = 0;
        while self.scroll_view(view, direction).await? {
            attempts = attempts.saturating_add(1);
            if self.max_scroll_steps.is_some_and(|max| attempts >= max) {
                return Err(ScrollError::NeverSettled { attempts });
            }
        }
        debug!(attempts, ?direction, "view scrolled to its end");
        Ok(())
    }

    /// Scrolls the most recently touched scrollable widget.
    ///
    /// Returns `false` when there is nothing to scroll or the widget has
    /// reached its end; `true` when more scrolling may be possible. With
    /// `all_the_way` the widget is scrolled to its end and the result is
    /// always `false` except for web content, which reports its own outcome.
    pub async fn scroll(&self, direction: Direction, all_the_way: bool) -> Result<bool, ScrollError> {
        let span = debug_span!("scroll", ?direction, all_the_way);
        self.scroll_inner(direction, all_the_way).instrument(span).await
    }

    async fn scroll_inner(&self, direction: Direction, all_the_way: bool) -> Result<bool, ScrollError> {
        let candidates = self.fetcher.scrollable_views();
        let mut to_check: Vec<Scrollable> =
            self.fetcher.freshest_view(&candidates).into_iter().collect();
        to_check.extend(self.fetcher.recycler_views());

        let Some(view) = self.fetcher.freshest_view(&to_check) else {
            debug!("no scrollable view found");
            return Ok(false);
        };
        debug!(kind = view.kind(), "scrolling view");

        match view {
            Scrollable::List(list) => self.scroll_list(&list, direction, all_the_way).await,
            Scrollable::Web(web) => self.scroll_web_view(&web, direction, all_the_way).await,
            Scrollable::Generic(generic) => {
                if all_the_way {
                    self.scroll_view_all_the_way(&generic, direction).await?;
                    Ok(false)
                } else {
                    self.scroll_view(&generic, direction).await
                }
            }
        }
    }

    /// Scrolls down one page, unless scrolling is disabled in the config.
    pub async fn scroll_down(&self) -> Result<bool, ScrollError> {
        if !self.should_scroll {
            return Ok(false);
        }
        self.scroll(Direction::Down, false).await
    }

    /// Scrolls up one page.
    pub async fn scroll_up(&self) -> Result<bool, ScrollError> {
        self.scroll(Direction::Up, false).await
    }

    /// Pages web content up or down, or to its start or end with
    /// `all_the_way`. Returns whether the content moved.
    pub async fn scroll_web_view(
        &self,
        view: &Arc<dyn WebContent>,
        direction: Direction,
        all_the_way: bool,
    ) -> Result<bool, ScrollError> {
        let target = view.clone();
        let moved = self
            .on_owner("page", move || match direction {
                Direction::Down => target.page_down(all_the_way),
                Direction::Up => target.page_up(all_the_way),
            })
            .await?;
        Ok(moved.unwrap_or(false))
    }

    /// Scrolls a list by roughly one page of lines.
    ///
    /// Returns `false` once the first or last line has been reached, or
    /// after scrolling all the way.
    pub async fn scroll_list(
        &self,
        view: &Arc<dyn ListView>,
        direction: Direction,
        all_the_way: bool,
    ) -> Result<bool, ScrollError> {
        let plan = plan_list_scroll(
            view.count(),
            view.first_visible_position(),
            view.last_visible_position(),
            direction,
            all_the_way,
        );
        if let Some(line) = plan.line {
            self.scroll_list_to_line(view, line).await?;
        }
        if plan.more {
            self.sleeper.pause().await;
        }
        Ok(plan.more)
    }

    /// Selects `line` in a list. Grids select `line + 1` to step over
    /// their header row.
    pub async fn scroll_list_to_line(&self, view: &Arc<dyn ListView>, line: i32) -> Result<(), ScrollError> {
        let line = if view.is_grid() { line + 1 } else { line };
        let target = view.clone();
        self.on_owner("set selection", move || target.set_selection(line)).await?;
        Ok(())
    }

    /// Drags horizontally across the middle of the display.
    ///
    /// `scroll_position` is a fraction of the display width in `0.0..=1.0`.
    /// Left drags from near the left edge to that position; right drags
    /// from that position to the left edge.
    pub async fn scroll_to_side(
        &self,
        side: Side,
        scroll_position: f32,
        step_count: u32,
    ) -> Result<(), ScrollError> {
        let (width, height) = self.injector.display_size();
        let x = width as f32 * scroll_position;
        let y = height as f32 / 2.0;
        match side {
            Side::Left => self.drag(SIDE_SWIPE_START_X, x, y, y, step_count).await,
            Side::Right => self.drag(x, 0.0, y, y, step_count).await,
        }
    }

    /// Drags horizontally across the middle of `view`.
    ///
    /// `scroll_position` is a fraction of the view width in `0.0..=1.0`.
    pub async fn scroll_view_to_side(
        &self,
        view: &dyn View,
        side: Side,
        scroll_position: f32,
        step_count: u32,
    ) -> Result<(), ScrollError> {
        let (left, top) = view.location_on_screen();
        let left = left as f32;
        let x = left + view.width() as f32 * scroll_position;
        let y = top as f32 + view.height() as f32 / 2.0;
        match side {
            Side::Left => self.drag(left, x, y, y, step_count).await,
            Side::Right => self.drag(x, left, y, y, step_count).await,
        }
    }

    /// Runs `f` on the owner thread. A refused injection yields `None`.
    async fn on_owner<T, F>(&self, what: &str, f: F) -> Result<Option<T>, ScrollError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        match run_on_owner_with(self.injector.as_ref(), f).await {
            Ok(value) => Ok(Some(value)),
            Err(InjectError::PermissionDenied) => {
                debug!(task = what, "owner task not permitted, ignoring");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for Scroller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scroller")
            .field("sleeper", &self.sleeper)
            .field("should_scroll", &self.should_scroll)
            .field("max_scroll_steps", &self.max_scroll_steps)
            .finish()
    }
}
