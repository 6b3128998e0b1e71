use f1_report::report::build_document;
use f1_report::section::{Direction, SECTIONS, ScrollMetrics, SectionId, SectionTracker};
use f1_report::state::AppState;

fn anchors() -> Vec<(SectionId, f64)> {
    vec![
        (SectionId::Intro, 0.0),
        (SectionId::Championship, 500.0),
        (SectionId::Qualifying, 1200.0),
        (SectionId::Pace, 2000.0),
        (SectionId::PitStops, 2600.0),
        (SectionId::Overtakes, 3300.0),
    ]
}

fn at(offset: f64) -> ScrollMetrics {
    ScrollMetrics {
        offset,
        viewport_height: 1000.0,
        document_height: 4000.0,
        nav_height: 64.0,
    }
}

#[test]
fn active_section_follows_marker() {
    let mut tracker = SectionTracker::new();
    assert!(!tracker.on_scroll(at(0.0), &anchors()));
    assert_eq!(tracker.active(), SectionId::Intro);

    // marker = offset + 64 + 360
    assert!(tracker.on_scroll(at(76.0), &anchors()));
    assert_eq!(tracker.active(), SectionId::Championship);
    assert!(!tracker.on_scroll(at(775.0), &anchors()));
    assert_eq!(tracker.active(), SectionId::Championship);
    assert!(tracker.on_scroll(at(776.0), &anchors()));
    assert_eq!(tracker.active(), SectionId::Qualifying);

    tracker.on_scroll(at(2900.0), &anchors());
    assert_eq!(tracker.active(), SectionId::Overtakes);
    assert_eq!(tracker.state().progress, 2900.0 / 3000.0);

    // Scrolling back up moves the other way.
    tracker.on_scroll(at(100.0), &anchors());
    assert_eq!(tracker.active(), SectionId::Championship);
}

#[test]
fn nothing_reached_falls_back_to_intro() {
    let mut tracker = SectionTracker::new();
    tracker.on_scroll(at(2900.0), &anchors());
    let late = vec![(SectionId::Championship, 600.0), (SectionId::Qualifying, 900.0)];
    tracker.on_scroll(at(0.0), &late);
    assert_eq!(tracker.active(), SectionId::Intro);
    tracker.on_scroll(at(0.0), &[]);
    assert_eq!(tracker.active(), SectionId::Intro);
}

#[test]
fn progress_is_zero_when_not_scrollable() {
    let mut tracker = SectionTracker::new();
    let metrics = ScrollMetrics {
        offset: 30.0,
        viewport_height: 1000.0,
        document_height: 800.0,
        nav_height: 64.0,
    };
    tracker.on_scroll(metrics, &anchors());
    assert_eq!(tracker.state().progress, 0.0);

    tracker.on_scroll(at(5000.0), &anchors());
    assert_eq!(tracker.state().progress, 1.0);
}

#[test]
fn neighbors_walk_sections_in_order() {
    let mut tracker = SectionTracker::new();
    assert_eq!(tracker.neighbor(Direction::Previous, false), None);
    assert_eq!(
        tracker.neighbor(Direction::Next, false),
        Some(SectionId::Championship)
    );

    tracker.on_scroll(at(2900.0), &anchors());
    assert_eq!(tracker.neighbor(Direction::Next, false), None);
    assert_eq!(
        tracker.neighbor(Direction::Previous, false),
        Some(SectionId::PitStops)
    );
}

#[test]
fn navigation_is_blocked_while_input_has_focus() {
    let mut state = AppState::new();
    state.on_scroll(at(1700.0), &anchors());
    assert_eq!(state.tracker.active(), SectionId::Pace);
    assert!(state.open_round_input());
    assert!(state.input_focused());
    assert_eq!(state.tracker.neighbor(Direction::Next, state.input_focused()), None);

    state.cancel_round_input();
    assert_eq!(
        state.tracker.neighbor(Direction::Next, state.input_focused()),
        Some(SectionId::PitStops)
    );

    // Chapters without a round picker never take focus.
    state.on_scroll(at(100.0), &anchors());
    assert!(!state.open_round_input());
    assert!(!state.input_focused());
}

#[test]
fn document_anchors_cover_every_section_in_order() {
    let state = AppState::new();
    let doc = build_document(&state, 120);
    let ids: Vec<SectionId> = doc.anchors.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, SECTIONS.to_vec());
    let lines: Vec<usize> = doc.anchors.iter().map(|(_, line)| *line).collect();
    assert!(lines.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(doc.anchor(SectionId::Intro), Some(0));

    let mut tracker = SectionTracker::new();
    let metrics = ScrollMetrics {
        offset: lines[2] as f64,
        viewport_height: 1.0,
        document_height: doc.lines.len() as f64,
        nav_height: 0.0,
    };
    tracker.on_scroll(metrics, &doc.anchor_offsets());
    assert_eq!(tracker.active(), SectionId::Qualifying);
}
