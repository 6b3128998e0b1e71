use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Local;
use serde_json::Value;

use crate::cancel::{Scope, ScopeToken};
use crate::media::{self, MediaBoard, MediaKey, Resolution};
use crate::section::{CHAPTERS, ScrollMetrics, SectionId, SectionTracker};
use crate::selection::{self, SelectionState};
use crate::source::{DataSource, DatasetError};
use crate::views::{self, ChapterBase, ChapterView, Memo};

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetId {
    Standings,
    PointsHeatmap,
    Q3Gaps,
    PoleToWin,
    Pace,
    PitStops,
    Overtakes,
}

impl DatasetId {
    pub fn file_name(self) -> &'static str {
        match self {
            DatasetId::Standings => "standings_progression.json",
            DatasetId::PointsHeatmap => "points_heatmap.json",
            DatasetId::Q3Gaps => "q3_gaps.json",
            DatasetId::PoleToWin => "pole_to_win.json",
            DatasetId::Pace => "ch3_pace.json",
            DatasetId::PitStops => "ch4_pitstops.json",
            DatasetId::Overtakes => "ch5_overtakes.json",
        }
    }
}

/// Datasets a chapter needs, in declaration order (earlier errors win).
pub fn chapter_datasets(chapter: SectionId) -> &'static [DatasetId] {
    match chapter {
        SectionId::Intro => &[],
        SectionId::Championship => &[DatasetId::Standings, DatasetId::PointsHeatmap],
        SectionId::Qualifying => &[DatasetId::Q3Gaps, DatasetId::PoleToWin],
        SectionId::Pace => &[DatasetId::Pace],
        SectionId::PitStops => &[DatasetId::PitStops],
        SectionId::Overtakes => &[DatasetId::Overtakes],
    }
}

fn chapter_selection(chapter: SectionId) -> Option<SelectionState> {
    match chapter {
        SectionId::Qualifying => Some(SelectionState::new(selection::QUALIFYING_METRICS)),
        SectionId::Pace => Some(SelectionState::new(selection::PACE_METRICS)),
        SectionId::PitStops => Some(SelectionState::new(selection::PIT_METRICS)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DatasetState {
    Idle,
    Loading,
    Loaded(Arc<Value>),
    Failed(DatasetError),
}

#[derive(Debug, Clone)]
pub struct DatasetSlot {
    pub id: DatasetId,
    pub url: Option<String>,
    pub revision: u64,
    pub state: DatasetState,
}

impl DatasetSlot {
    fn new(id: DatasetId) -> Self {
        Self {
            id,
            url: None,
            revision: 0,
            state: DatasetState::Idle,
        }
    }

    /// Whether asking for `url` requires a fetch.
    pub fn needs_fetch(&self, url: &str) -> bool {
        self.url.as_deref() != Some(url)
            || matches!(self.state, DatasetState::Idle | DatasetState::Loading)
    }

    fn begin(&mut self, url: String) {
        self.url = Some(url);
        self.state = DatasetState::Loading;
    }

    fn finish(&mut self, result: Result<Value, DatasetError>) {
        self.revision += 1;
        self.state = match result {
            Ok(value) => DatasetState::Loaded(Arc::new(value)),
            Err(err) => DatasetState::Failed(err),
        };
    }

    pub fn loading(&self) -> bool {
        matches!(self.state, DatasetState::Loading)
    }

    pub fn error(&self) -> Option<&DatasetError> {
        match &self.state {
            DatasetState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&Arc<Value>> {
        match &self.state {
            DatasetState::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChapterStatus<V> {
    Idle,
    Loading,
    Failed(String),
    Empty,
    Ready(V),
}

impl<V> ChapterStatus<V> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ChapterStatus::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ChapterStatus::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ChapterStatus::Empty)
    }

    pub fn ready(&self) -> Option<&V> {
        match self {
            ChapterStatus::Ready(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetRequest {
    pub id: DatasetId,
    pub location: String,
}

type ViewKey = (Vec<u64>, Option<SelectionState>);

#[derive(Debug)]
pub struct Chapter {
    pub id: SectionId,
    pub datasets: Vec<DatasetSlot>,
    pub selection: Option<SelectionState>,
    pub status: ChapterStatus<Arc<ChapterView>>,
    scope: Scope,
    base: Memo<Vec<u64>, Option<Arc<ChapterBase>>>,
    view: Memo<ViewKey, Option<Arc<ChapterView>>>,
}

impl Chapter {
    pub fn new(id: SectionId) -> Self {
        Self {
            id,
            datasets: chapter_datasets(id)
                .iter()
                .copied()
                .map(DatasetSlot::new)
                .collect(),
            selection: chapter_selection(id),
            status: ChapterStatus::Idle,
            scope: Scope::new(),
            base: Memo::default(),
            view: Memo::default(),
        }
    }

    /// Mark the datasets that need fetching as loading and hand out a token for
    /// them. `force` refetches everything. Returns `None` when nothing changed.
    pub fn begin_load(
        &mut self,
        source: &DataSource,
        force: bool,
    ) -> Option<(ScopeToken, Vec<DatasetRequest>)> {
        let mut requests = Vec::new();
        for slot in &mut self.datasets {
            let location = source.resolve(slot.id.file_name());
            if force || slot.needs_fetch(&location) {
                slot.begin(location.clone());
                requests.push(DatasetRequest {
                    id: slot.id,
                    location,
                });
            }
        }
        if requests.is_empty() {
            return None;
        }
        let token = self.scope.issue();
        self.refresh();
        Some((token, requests))
    }

    /// Commit fetch results. Results carrying a superseded token are dropped.
    pub fn apply_results(
        &mut self,
        token: &ScopeToken,
        results: Vec<(DatasetId, Result<Value, DatasetError>)>,
    ) -> bool {
        if !self.scope.owns(token) || !token.is_live() {
            return false;
        }
        for (id, result) in results {
            if let Some(slot) = self.datasets.iter_mut().find(|s| s.id == id) {
                slot.finish(result);
            }
        }
        self.refresh();
        true
    }

    /// Teardown: any result still in flight is ignored from now on.
    pub fn cancel(&self) {
        self.scope.cancel();
    }

    pub fn refresh(&mut self) {
        if self.datasets.iter().any(DatasetSlot::loading) {
            self.status = ChapterStatus::Loading;
            return;
        }
        if let Some(err) = self.datasets.iter().find_map(DatasetSlot::error) {
            self.status = ChapterStatus::Failed(err.to_string());
            return;
        }
        let payloads: Vec<Arc<Value>> = self
            .datasets
            .iter()
            .filter_map(|slot| slot.data().cloned())
            .collect();
        if payloads.len() != self.datasets.len() {
            self.status = ChapterStatus::Idle;
            return;
        }

        let revisions: Vec<u64> = self.datasets.iter().map(|s| s.revision).collect();
        let id = self.id;
        let base = self
            .base
            .get_or_compute(revisions.clone(), || {
                views::derive_base(id, &payloads).map(Arc::new)
            })
            .clone();
        let Some(base) = base else {
            if let Some(sel) = self.selection.as_mut() {
                sel.reconcile(&[]);
            }
            self.status = ChapterStatus::Empty;
            return;
        };
        if let Some(sel) = self.selection.as_mut() {
            sel.reconcile(&base.valid_rounds());
        }

        let key = (revisions, self.selection.clone());
        let selection = self.selection.as_ref();
        let view = self
            .view
            .get_or_compute(key, || base.view(selection).map(Arc::new))
            .clone();
        self.status = match view {
            Some(view) => ChapterStatus::Ready(view),
            None => ChapterStatus::Empty,
        };
    }

    pub fn valid_rounds(&self) -> Vec<u32> {
        self.base
            .get()
            .and_then(|b| b.as_ref())
            .map(|b| b.valid_rounds())
            .unwrap_or_default()
    }

    pub fn step_round(&mut self, forward: bool) -> bool {
        let valid = self.valid_rounds();
        let changed = self
            .selection
            .as_mut()
            .map(|sel| sel.step_round(&valid, forward))
            .unwrap_or(false);
        if changed {
            self.refresh();
        }
        changed
    }

    pub fn select_round(&mut self, round: u32) -> bool {
        let valid = self.valid_rounds();
        let changed = self
            .selection
            .as_mut()
            .map(|sel| sel.select_round(&valid, round))
            .unwrap_or(false);
        if changed {
            self.refresh();
        }
        changed
    }

    pub fn cycle_metric(&mut self) -> bool {
        let changed = self
            .selection
            .as_mut()
            .map(SelectionState::cycle_metric)
            .unwrap_or(false);
        if changed {
            self.refresh();
        }
        changed
    }

    /// Number of times the selection-dependent view has been rebuilt.
    pub fn view_computes(&self) -> u64 {
        self.view.computes()
    }

    pub fn base_computes(&self) -> u64 {
        self.base.computes()
    }
}

#[derive(Debug, Clone)]
pub enum Delta {
    ChapterLoaded {
        chapter: SectionId,
        token: ScopeToken,
        results: Vec<(DatasetId, Result<Value, DatasetError>)>,
    },
    MediaResolved {
        key: MediaKey,
        token: ScopeToken,
        resolution: Resolution,
    },
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    LoadChapter {
        chapter: SectionId,
        token: ScopeToken,
        requests: Vec<DatasetRequest>,
    },
    ResolveMedia {
        key: MediaKey,
        token: ScopeToken,
        candidates: Vec<String>,
    },
}

#[derive(Debug)]
pub struct AppState {
    pub chapters: Vec<Chapter>,
    pub tracker: SectionTracker,
    pub media: MediaBoard,
    pub scroll: usize,
    pub round_input: Option<String>,
    pub console_open: bool,
    pub help_overlay: bool,
    pub logs: VecDeque<String>,
    pub stale_results: u64,
    media_dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            chapters: CHAPTERS.iter().copied().map(Chapter::new).collect(),
            tracker: SectionTracker::new(),
            media: MediaBoard::new(),
            scroll: 0,
            round_input: None,
            console_open: false,
            help_overlay: false,
            logs: VecDeque::with_capacity(MAX_LOGS),
            stale_results: 0,
            media_dirty: false,
        }
    }

    pub fn chapter(&self, id: SectionId) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    pub fn chapter_mut(&mut self, id: SectionId) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|c| c.id == id)
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        let line = format!("{} {}", Local::now().format("%H:%M:%S"), msg.into());
        self.logs.push_back(line);
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn input_focused(&self) -> bool {
        self.round_input.is_some()
    }

    /// Issue loads for every chapter. Without `force` only datasets whose url
    /// changed (or that never loaded) are fetched.
    pub fn begin_loads(&mut self, source: &DataSource, force: bool) -> Vec<ProviderCommand> {
        let mut commands = Vec::new();
        for chapter in &mut self.chapters {
            if let Some((token, requests)) = chapter.begin_load(source, force) {
                commands.push(ProviderCommand::LoadChapter {
                    chapter: chapter.id,
                    token,
                    requests,
                });
            }
        }
        if !commands.is_empty() {
            self.push_log(format!("[INFO] Loading {} chapter(s)", commands.len()));
            self.media_dirty = true;
        }
        commands
    }

    /// Sync media slots with each chapter's current spotlight and return the
    /// lookups that need issuing. Cheap no-op unless something changed.
    pub fn media_commands(&mut self) -> Vec<ProviderCommand> {
        if !self.media_dirty {
            return Vec::new();
        }
        self.media_dirty = false;

        let mut commands = Vec::new();
        for chapter in &self.chapters {
            let requests = chapter
                .status
                .ready()
                .map(|view| media::requests_for(chapter.id, &view.spotlight()))
                .unwrap_or_default();
            let wanted: HashSet<MediaKey> = requests.iter().map(|r| r.key).collect();
            for key in self.media.keys_for(chapter.id) {
                if !wanted.contains(&key) {
                    self.media.remove(&key);
                }
            }
            for request in requests {
                if let Some(token) = self.media.request(&request) {
                    commands.push(ProviderCommand::ResolveMedia {
                        key: request.key,
                        token,
                        candidates: request.candidates,
                    });
                }
            }
        }
        commands
    }

    fn active_chapter_mut(&mut self) -> Option<&mut Chapter> {
        let active = self.tracker.active();
        self.chapter_mut(active)
    }

    pub fn step_round(&mut self, forward: bool) -> bool {
        let changed = self
            .active_chapter_mut()
            .map(|c| c.step_round(forward))
            .unwrap_or(false);
        self.media_dirty |= changed;
        changed
    }

    pub fn cycle_metric(&mut self) -> bool {
        let changed = self
            .active_chapter_mut()
            .map(Chapter::cycle_metric)
            .unwrap_or(false);
        self.media_dirty |= changed;
        changed
    }

    pub fn open_round_input(&mut self) -> bool {
        let has_picker = self
            .chapter(self.tracker.active())
            .is_some_and(|c| c.selection.is_some());
        if has_picker {
            self.round_input = Some(String::new());
        }
        has_picker
    }

    pub fn push_round_digit(&mut self, digit: char) {
        if let Some(input) = self.round_input.as_mut()
            && digit.is_ascii_digit()
            && input.len() < 3
        {
            input.push(digit);
        }
    }

    pub fn cancel_round_input(&mut self) {
        self.round_input = None;
    }

    /// Close the round input and select the typed round when valid.
    pub fn commit_round_input(&mut self) -> bool {
        let Some(raw) = self.round_input.take() else {
            return false;
        };
        let Ok(round) = raw.parse::<u32>() else {
            return false;
        };
        let changed = self
            .active_chapter_mut()
            .map(|c| c.select_round(round))
            .unwrap_or(false);
        if changed {
            self.media_dirty = true;
        } else {
            self.push_log(format!("[WARN] Round {round} not available here"));
        }
        changed
    }

    pub fn on_scroll(&mut self, metrics: ScrollMetrics, anchors: &[(SectionId, f64)]) -> bool {
        self.tracker.on_scroll(metrics, anchors)
    }

    /// Cancel everything in flight; late results are dropped afterwards.
    pub fn shutdown(&mut self) {
        for chapter in &self.chapters {
            chapter.cancel();
        }
        self.media.cancel_all();
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::ChapterLoaded {
            chapter,
            token,
            results,
        } => {
            let Some(target) = state.chapter_mut(chapter) else {
                return;
            };
            if !target.apply_results(&token, results) {
                state.stale_results += 1;
                state.push_log(format!("[INFO] Dropped stale load for {}", chapter.key()));
                return;
            }
            let msg = match &target.status {
                ChapterStatus::Failed(err) => format!("[WARN] {}: {err}", chapter.key()),
                ChapterStatus::Empty => format!("[WARN] {}: data loaded but unusable", chapter.key()),
                _ => format!("[INFO] {} ready", chapter.key()),
            };
            state.media_dirty = true;
            state.push_log(msg);
        }
        Delta::MediaResolved {
            key,
            token,
            resolution,
        } => {
            if !state.media.commit(key, &token, resolution) {
                state.stale_results += 1;
            }
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}
