//! Scrollable widget kinds consumed by the scroller.
//!
//! Widgets are classified once into a [`Scrollable`] variant, each carrying
//! the capability trait its scroll strategy needs. Reads (`scroll_y`,
//! visible positions, geometry) may be made from any thread; mutations
//! (`scroll_by`, `set_selection`, page up/down) are only ever called from a
//! task running on the UI owner thread.

use std::sync::Arc;

/// Geometry shared by every widget.
pub trait View: Send + Sync {
    /// Top-left corner in screen coordinates.
    fn location_on_screen(&self) -> (i32, i32);
    fn width(&self) -> i32;
    fn height(&self) -> i32;
}

/// A widget that scrolls by pixel offset.
pub trait ScrollView: View {
    /// Current vertical scroll offset in pixels.
    fn scroll_y(&self) -> i32;

    /// Scroll by the given pixel amounts, clamped by the widget.
    fn scroll_by(&self, dx: i32, dy: i32);
}

/// A widget that scrolls by line (list or grid).
pub trait ListView: View {
    /// Number of lines in the adapter.
    fn count(&self) -> i32;
    fn first_visible_position(&self) -> i32;
    fn last_visible_position(&self) -> i32;

    /// Select `line`, bringing it into view.
    fn set_selection(&self, line: i32);

    /// Grid widgets carry a header row that selection indices include.
    fn is_grid(&self) -> bool {
        false
    }
}

/// A widget rendering web content that scrolls by page.
pub trait WebContent: View {
    /// Scroll down one page, or to the bottom when `bottom` is set.
    /// Returns whether the content moved.
    fn page_down(&self, bottom: bool) -> bool;

    /// Scroll up one page, or to the top when `top` is set.
    /// Returns whether the content moved.
    fn page_up(&self, top: bool) -> bool;
}

/// A scrollable widget, classified by the strategy used to scroll it.
#[derive(Clone)]
pub enum Scrollable {
    /// Any pixel-offset container, including recycler-style widgets.
    Generic(Arc<dyn ScrollView>),
    List(Arc<dyn ListView>),
    Web(Arc<dyn WebContent>),
}

impl Scrollable {
    pub fn kind(&self) -> &'static str {
        match self {
            Scrollable::Generic(_) => "generic",
            Scrollable::List(_) => "list",
            Scrollable::Web(_) => "web",
        }
    }
}

impl View for Scrollable {
    fn location_on_screen(&self) -> (i32, i32) {
        match self {
            Scrollable::Generic(v) => v.location_on_screen(),
            Scrollable::List(v) => v.location_on_screen(),
            Scrollable::Web(v) => v.location_on_screen(),
        }
    }

    fn width(&self) -> i32 {
        match self {
            Scrollable::Generic(v) => v.width(),
            Scrollable::List(v) => v.width(),
            Scrollable::Web(v) => v.width(),
        }
    }

    fn height(&self) -> i32 {
        match self {
            Scrollable::Generic(v) => v.height(),
            Scrollable::List(v) => v.height(),
            Scrollable::Web(v) => v.height(),
        }
    }
}

impl std::fmt::Debug for Scrollable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scrollable")
            .field("kind", &self.kind())
            .field("location", &self.location_on_screen())
            .field("size", &(self.width(), self.height()))
            .finish()
    }
}

/// Supplies the scroller with already-filtered candidate widgets.
pub trait ViewFetcher: Send + Sync {
    /// Visible list, grid, scroll and web widgets on the current screen.
    fn scrollable_views(&self) -> Vec<Scrollable>;

    /// Visible recycler-style widgets on the current screen.
    fn recycler_views(&self) -> Vec<Scrollable>;

    /// The widget among `views` the user interacted with most recently.
    fn freshest_view(&self, views: &[Scrollable]) -> Option<Scrollable>;
}
