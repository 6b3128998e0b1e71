use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::media::{MediaKey, MediaSlot};
use crate::section::{CHAPTERS, SectionId};
use crate::selection::metric_label;
use crate::state::{AppState, Chapter, ChapterStatus};
use crate::views::{
    ChampionshipView, ChapterView, OvertakeView, PaceView, PitView, QualifyingView, RoundOption,
    scale,
};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SHADES: [char; 5] = ['·', '░', '▒', '▓', '█'];

/// The whole report as scrollable lines plus the line offset of each section
/// heading.
#[derive(Debug, Clone, Default)]
pub struct ReportDocument {
    pub lines: Vec<Line<'static>>,
    pub anchors: Vec<(SectionId, usize)>,
}

impl ReportDocument {
    pub fn anchor(&self, section: SectionId) -> Option<usize> {
        self.anchors
            .iter()
            .find(|(id, _)| *id == section)
            .map(|(_, line)| *line)
    }

    pub fn anchor_offsets(&self) -> Vec<(SectionId, f64)> {
        self.anchors
            .iter()
            .map(|(id, line)| (*id, *line as f64))
            .collect()
    }

    fn heading(&mut self, section: SectionId) {
        if !self.lines.is_empty() {
            self.blank();
            self.blank();
        }
        self.anchors.push((section, self.lines.len()));
        self.lines.push(Line::from(Span::styled(
            section.title().to_string(),
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        )));
        self.blank();
    }

    fn text(&mut self, text: impl Into<String>) {
        self.lines.push(Line::from(text.into()));
    }

    fn muted(&mut self, text: impl Into<String>) {
        self.lines.push(Line::from(Span::styled(
            text.into(),
            Style::default().fg(Color::DarkGray),
        )));
    }

    fn subheading(&mut self, text: impl Into<String>) {
        self.blank();
        self.lines.push(Line::from(Span::styled(
            text.into(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }

    fn blank(&mut self) {
        self.lines.push(Line::default());
    }
}

pub fn build_document(state: &AppState, width: u16) -> ReportDocument {
    let bar_width = usize::from(width / 3).clamp(8, 40);
    let mut doc = ReportDocument::default();

    doc.heading(SectionId::Intro);
    doc.text("Five chapters on the 2025 Formula 1 season, built from per-round exports.");
    doc.muted("Scroll with j/k, jump between chapters with n/p, press ? for all keys.");
    doc.blank();
    for id in CHAPTERS {
        let badge = state
            .chapter(id)
            .map(|c| status_badge(&c.status))
            .unwrap_or("-");
        doc.text(format!("  {:<28} {badge}", id.title()));
    }

    for chapter in &state.chapters {
        doc.heading(chapter.id);
        render_media(&mut doc, state, chapter.id);
        render_chapter(&mut doc, chapter, bar_width);
    }
    doc.blank();
    doc.muted("End of report.");
    doc
}

fn status_badge<V>(status: &ChapterStatus<V>) -> &'static str {
    match status {
        ChapterStatus::Idle => "waiting",
        ChapterStatus::Loading => "loading",
        ChapterStatus::Failed(_) => "unavailable",
        ChapterStatus::Empty => "missing data",
        ChapterStatus::Ready(_) => "ready",
    }
}

fn render_media(doc: &mut ReportDocument, state: &AppState, section: SectionId) {
    let slots = [
        (MediaSlot::DriverPortrait, "Driver"),
        (MediaSlot::TeamLogo, "Team"),
        (MediaSlot::Car, "Car"),
    ];
    let mut spans = Vec::new();
    for (slot, label) in slots {
        let Some(res) = state.media.get(&MediaKey { section, slot }) else {
            continue;
        };
        let shown = match res.display() {
            Some(value) if res.resolved.is_some() => value.to_string(),
            Some(value) => format!("[{value}]"),
            None => "…".to_string(),
        };
        if !spans.is_empty() {
            spans.push(Span::raw("   "));
        }
        spans.push(Span::styled(
            format!("{label}: "),
            Style::default().fg(Color::DarkGray),
        ));
        spans.push(Span::styled(shown, Style::default().fg(Color::Cyan)));
    }
    if !spans.is_empty() {
        doc.lines.push(Line::from(spans));
        doc.blank();
    }
}

fn render_chapter(doc: &mut ReportDocument, chapter: &Chapter, bar_width: usize) {
    match &chapter.status {
        ChapterStatus::Idle => doc.muted("Waiting to load…"),
        ChapterStatus::Loading => doc.muted("Loading chapter data…"),
        ChapterStatus::Failed(err) => {
            doc.lines.push(Line::from(Span::styled(
                format!("This chapter could not be loaded: {err}"),
                Style::default().fg(Color::Yellow),
            )));
        }
        ChapterStatus::Empty => {
            doc.lines.push(Line::from(Span::styled(
                "Data loaded, but the fields this chapter needs are missing.".to_string(),
                Style::default().fg(Color::Yellow),
            )));
        }
        ChapterStatus::Ready(view) => match view.as_ref() {
            ChapterView::Championship(v) => render_championship(doc, v, bar_width),
            ChapterView::Qualifying(v) => render_qualifying(doc, v, bar_width),
            ChapterView::Pace(v) => render_pace(doc, v),
            ChapterView::PitStops(v) => render_pitstops(doc, v, bar_width),
            ChapterView::Overtakes(v) => render_overtakes(doc, v, bar_width),
        },
    }
}

fn bar(value: f64, max: f64, width: usize) -> String {
    let filled = scale(value, 0.0, max, 0.0, width as f64).round() as usize;
    "█".repeat(filled)
}

fn spark(value: f64, max: f64) -> char {
    let idx = scale(value, 0.0, max, 0.0, (SPARK.len() - 1) as f64).round() as usize;
    SPARK[idx.min(SPARK.len() - 1)]
}

fn shade(intensity: f64) -> char {
    let idx = scale(intensity, 0.0, 1.0, 0.0, (SHADES.len() - 1) as f64).round() as usize;
    SHADES[idx.min(SHADES.len() - 1)]
}

fn round_picker(doc: &mut ReportDocument, rounds: &[RoundOption], selected: u32) {
    let event = rounds
        .iter()
        .find(|r| r.round == selected)
        .map(|r| r.event.as_str())
        .unwrap_or("");
    doc.lines.push(Line::from(vec![
        Span::styled("Round ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("◀ R{selected} {event} ▶"),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("   ([ ] to step, g to type, {} rounds)", rounds.len()),
            Style::default().fg(Color::DarkGray),
        ),
    ]));
}

fn render_championship(doc: &mut ReportDocument, v: &ChampionshipView, bar_width: usize) {
    let last = v.rounds.last().map(|r| r.event.as_str()).unwrap_or("");
    doc.text(format!(
        "Standings after {} rounds (final: {last}).",
        v.rounds.len()
    ));
    doc.subheading("Top 10");
    let max = v.top_drivers.first().map(|d| d.points).unwrap_or(0.0);
    for d in &v.top_drivers {
        doc.text(format!(
            "{:>3}  {:<4} {:>6.0}  {}",
            d.rank,
            d.driver,
            d.points,
            bar(d.points, max, bar_width)
        ));
    }

    doc.subheading("Points progression");
    let max_line = v
        .line_data
        .iter()
        .flat_map(|p| p.values.iter().map(|(_, val)| *val))
        .fold(0.0_f64, f64::max);
    for driver in &v.line_drivers {
        let line: String = v
            .line_data
            .iter()
            .map(|p| spark(p.value(driver).unwrap_or(0.0), max_line))
            .collect();
        let latest = v
            .line_data
            .last()
            .and_then(|p| p.value(driver))
            .unwrap_or(0.0);
        doc.text(format!("  {driver:<4} {line} {latest:.0}"));
    }

    doc.subheading("Points per round");
    for row in &v.heatmap_rows {
        let cells: String = row.cells.iter().map(|c| shade(c.intensity)).collect();
        doc.text(format!("  {:<4} {cells}", row.driver));
    }
}

fn render_qualifying(doc: &mut ReportDocument, v: &QualifyingView, bar_width: usize) {
    round_picker(doc, &v.rounds, v.selected_round);
    doc.subheading("Q3 gap to pole");
    for (idx, r) in v.rows.iter().enumerate() {
        let gap = if r.gap_to_pole_sec <= 0.0 {
            match r.pole_time {
                Some(t) => format!("POLE {t:.3}s"),
                None => "POLE".to_string(),
            }
        } else {
            format!("+{:.3}s", r.gap_to_pole_sec)
        };
        doc.text(format!("{:>3}  {:<4} {:<18} {gap}", idx + 1, r.driver, r.team));
    }

    doc.subheading("Pole-to-win conversion");
    for r in &v.conversion_rows {
        doc.text(format!(
            "  {:<4} {:>2} poles {:>2} wins {:>4.0}%  {}",
            r.driver,
            r.poles,
            r.wins_from_pole,
            r.conversion_rate * 100.0,
            bar(r.conversion_rate, 1.0, bar_width)
        ));
    }
    if !v.rounds_used.is_empty() {
        doc.muted(format!(
            "  Based on {} rounds with both qualifying and race results.",
            v.rounds_used.len()
        ));
        for r in &v.rounds_used {
            let mark = if r.pole_sitter == r.race_winner { "converted" } else { "lost" };
            doc.muted(format!(
                "    R{:<3} {:<24} pole {:<4} won {:<4} {mark}",
                r.round, r.event_name, r.pole_sitter, r.race_winner
            ));
        }
    }
}

fn render_pace(doc: &mut ReportDocument, v: &PaceView) {
    round_picker(doc, &v.rounds, v.selected_round);
    doc.muted(format!("Sorted by {} (m to switch)", metric_label(v.metric)));
    doc.subheading("Representative race pace");
    for (idx, r) in v.rows.iter().enumerate() {
        let p10 = r.p10_lap_s.map(|t| format!("  p10 {t:>8.3}s")).unwrap_or_default();
        doc.text(format!(
            "{:>3}  {:<4} {:<18} avg {:>8.3}s  Δ {:>6.3}s  σ {:>5.3}s{p10}",
            idx + 1,
            r.driver,
            r.team,
            r.avg_lap_s,
            r.pace_delta_to_best_avg_s,
            r.consistency_s
        ));
    }
}

fn render_pitstops(doc: &mut ReportDocument, v: &PitView, bar_width: usize) {
    doc.subheading("Season pit crews (avg stationary time)");
    for r in &v.team_season {
        let mut extra = match (r.best_pit_s, r.n_stops) {
            (Some(best), Some(n)) => format!("  best {best:.2}s over {n} stops"),
            _ => String::new(),
        };
        if let Some(rate) = r.undercut_success {
            extra.push_str(&format!("  undercut {:.0}%", rate * 100.0));
        }
        doc.text(format!(
            "  {:<18} {:>5.2}s ± {:.2}s{extra}",
            r.team, r.avg_pit_s, r.consistency_s
        ));
    }

    doc.blank();
    match v.selected_round {
        Some(round) => {
            round_picker(doc, &v.rounds, round);
            doc.muted(format!("Sorted by {} (m to switch)", metric_label(v.metric)));
        }
        None => doc.muted("No per-round pit data in this export."),
    }
    for (idx, r) in v.rows.iter().enumerate() {
        doc.text(format!(
            "{:>3}  {:<18} median {:>5.2}s  best {:>5.2}s",
            idx + 1,
            r.team,
            r.p50_pit_s,
            r.best_pit_s
        ));
    }

    doc.subheading("Stops per race");
    for r in &v.race_summary {
        let mut fastest = format!(" fastest {:.2}s", r.fastest_pit_s);
        match (r.fastest_team.as_deref(), r.fastest_driver.as_deref()) {
            (Some(team), Some(driver)) => fastest.push_str(&format!(" {team} ({driver})")),
            (Some(name), None) | (None, Some(name)) => fastest.push_str(&format!(" {name}")),
            (None, None) => {}
        }
        if let Some(median) = r.median_pit_s {
            fastest.push_str(&format!(", median {median:.2}s"));
        }
        doc.text(format!(
            "  R{:<3} {:<22} {:>3} {}{fastest}",
            r.round,
            r.event,
            r.total_stops,
            bar(r.bar, 1.0, bar_width)
        ));
    }
    for (key, note) in &v.notes {
        doc.muted(format!("  {key}: {note}"));
    }
}

fn render_overtakes(doc: &mut ReportDocument, v: &OvertakeView, bar_width: usize) {
    doc.subheading("Overtakes per race");
    for dot in &v.race_dots {
        let size = dot.radius.round().max(1.0) as usize;
        let level = (scale(dot.opacity, 0.35, 1.0, 90.0, 255.0)) as u8;
        doc.lines.push(Line::from(vec![
            Span::raw(format!("  R{:<3} {:<22} ", dot.round, dot.event)),
            Span::styled("●".repeat(size), Style::default().fg(Color::Rgb(level, 40, 40))),
            Span::raw(format!(
                " {:.0} passes, {:.3}/lap{}",
                dot.total_overtakes,
                dot.pass_rate,
                dot.drs_share
                    .map(|share| format!(", {:.0}% DRS", share * 100.0))
                    .unwrap_or_default()
            )),
        ]));
    }

    doc.subheading("Most processional circuits");
    for r in v.circuit_rows.iter().take(5) {
        doc.text(format!(
            "  {:<22} index {:>3.0}  {}",
            r.event,
            r.processional_index,
            bar(r.processional_index, 100.0, bar_width)
        ));
    }

    doc.subheading("Who made the passes");
    for (idx, r) in v.passing_rows.iter().enumerate() {
        doc.text(format!(
            "{:>3}  {:<4} {:<18} {:>3} passes  net {:+}",
            idx + 1,
            r.driver,
            r.team,
            r.passes_made,
            r.positions_gained_net
        ));
    }
    for (key, note) in &v.notes {
        doc.muted(format!("  {key}: {note}"));
    }
}
