/// Fraction of the viewport below the navigation bar at which a heading counts
/// as "reached".
pub const MARKER_RATIO: f64 = 0.36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionId {
    Intro,
    Championship,
    Qualifying,
    Pace,
    PitStops,
    Overtakes,
}

pub const SECTIONS: [SectionId; 6] = [
    SectionId::Intro,
    SectionId::Championship,
    SectionId::Qualifying,
    SectionId::Pace,
    SectionId::PitStops,
    SectionId::Overtakes,
];

pub const CHAPTERS: [SectionId; 5] = [
    SectionId::Championship,
    SectionId::Qualifying,
    SectionId::Pace,
    SectionId::PitStops,
    SectionId::Overtakes,
];

impl SectionId {
    pub fn key(self) -> &'static str {
        match self {
            SectionId::Intro => "intro",
            SectionId::Championship => "championship",
            SectionId::Qualifying => "qualifying",
            SectionId::Pace => "pace",
            SectionId::PitStops => "pitstops",
            SectionId::Overtakes => "overtakes",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SectionId::Intro => "The 2025 Season in Data",
            SectionId::Championship => "1. The Championship Fight",
            SectionId::Qualifying => "2. Saturday Speed",
            SectionId::Pace => "3. Race Pace",
            SectionId::PitStops => "4. In the Pit Lane",
            SectionId::Overtakes => "5. Wheel to Wheel",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().trim_start_matches('#');
        SECTIONS
            .iter()
            .copied()
            .find(|s| s.key().eq_ignore_ascii_case(raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionState {
    pub active: SectionId,
    pub progress: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub offset: f64,
    pub viewport_height: f64,
    pub document_height: f64,
    pub nav_height: f64,
}

/// Index of the last anchor at or above the scroll marker. `None` when the
/// marker sits above every anchor.
pub fn active_index(
    offset: f64,
    nav_height: f64,
    viewport_height: f64,
    anchors: &[f64],
) -> Option<usize> {
    let marker = offset + nav_height + MARKER_RATIO * viewport_height;
    anchors.iter().rposition(|top| *top <= marker)
}

pub fn scroll_progress(offset: f64, viewport_height: f64, document_height: f64) -> f64 {
    let scrollable = document_height - viewport_height;
    if scrollable <= 0.0 || !scrollable.is_finite() || !offset.is_finite() {
        return 0.0;
    }
    (offset / scrollable).clamp(0.0, 1.0)
}

/// Lines moved by a page key: one line of overlap, never less than one.
pub fn page_step(viewport_lines: u16) -> isize {
    isize::try_from(viewport_lines.saturating_sub(1).max(1)).unwrap_or(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Single writer of [`SectionState`].
#[derive(Debug, Clone)]
pub struct SectionTracker {
    state: SectionState,
}

impl Default for SectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionTracker {
    pub fn new() -> Self {
        Self {
            state: SectionState {
                active: SectionId::Intro,
                progress: 0.0,
            },
        }
    }

    pub fn state(&self) -> SectionState {
        self.state
    }

    pub fn active(&self) -> SectionId {
        self.state.active
    }

    /// Apply one scroll/resize observation. `anchors` pairs each section with
    /// the document offset of its heading, in document order.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, anchors: &[(SectionId, f64)]) -> bool {
        let tops: Vec<f64> = anchors.iter().map(|(_, top)| *top).collect();
        let active = active_index(
            metrics.offset,
            metrics.nav_height,
            metrics.viewport_height,
            &tops,
        )
        .map(|idx| anchors[idx].0)
        .unwrap_or(SECTIONS[0]);
        let next = SectionState {
            active,
            progress: scroll_progress(
                metrics.offset,
                metrics.viewport_height,
                metrics.document_height,
            ),
        };
        let changed = next.active != self.state.active;
        self.state = next;
        changed
    }

    /// Neighbouring section in `SECTIONS` order. Nothing happens while an input
    /// has focus or past either end.
    pub fn neighbor(&self, direction: Direction, input_focused: bool) -> Option<SectionId> {
        if input_focused {
            return None;
        }
        let pos = SECTIONS.iter().position(|s| *s == self.state.active)?;
        match direction {
            Direction::Previous => pos.checked_sub(1).map(|p| SECTIONS[p]),
            Direction::Next => SECTIONS.get(pos + 1).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_hash_and_case() {
        assert_eq!(SectionId::parse("#Pace"), Some(SectionId::Pace));
        assert_eq!(SectionId::parse(" pitstops "), Some(SectionId::PitStops));
        assert_eq!(SectionId::parse("podium"), None);
    }

    #[test]
    fn anchor_on_marker_counts_as_reached() {
        // marker = 76 + 64 + 360
        assert_eq!(active_index(76.0, 64.0, 1000.0, &[0.0, 500.0, 1200.0]), Some(1));
        assert_eq!(active_index(75.0, 64.0, 1000.0, &[0.0, 500.0, 1200.0]), Some(0));
        assert_eq!(active_index(0.0, 0.0, 100.0, &[80.0]), None);
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(scroll_progress(50.0, 100.0, 300.0), 0.25);
        assert_eq!(scroll_progress(900.0, 100.0, 300.0), 1.0);
        assert_eq!(scroll_progress(-10.0, 100.0, 300.0), 0.0);
        assert_eq!(scroll_progress(10.0, 300.0, 300.0), 0.0);
    }

    #[test]
    fn page_step_keeps_one_line_of_overlap() {
        assert_eq!(page_step(40), 39);
        assert_eq!(page_step(2), 1);
        assert_eq!(page_step(0), 1);
        assert_eq!(page_step(u16::MAX), 65_534);
    }
}
