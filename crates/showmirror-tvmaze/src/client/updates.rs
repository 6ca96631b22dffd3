use chrono::{DateTime, Duration, Utc};

/// The `since` values `/updates/shows` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateWindow {
    Day,
    Week,
    Month,
}

impl UpdateWindow {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateWindow::Day => "day",
            UpdateWindow::Week => "week",
            UpdateWindow::Month => "month",
        }
    }

    /// Narrowest window that still reaches back to `since`.
    ///
    /// `None` means no window is wide enough and the unfiltered feed is needed.
    #[must_use]
    pub fn covering(since: DateTime<Utc>, now: DateTime<Utc>) -> Option<Self> {
        let elapsed = now.signed_duration_since(since);
        if elapsed <= Duration::days(1) {
            Some(UpdateWindow::Day)
        } else if elapsed <= Duration::weeks(1) {
            Some(UpdateWindow::Week)
        } else if elapsed <= Duration::days(30) {
            Some(UpdateWindow::Month)
        } else {
            None
        }
    }
}
