//! Derived views: pure projections from parsed exports (plus the current
//! round/metric selection) into rows the report renders directly.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::payloads::{
    self, ConversionRound, DriverPassing, PacePayload, PitPayload, PoleRecord, Q3Record,
    RoundLabel, RoundTable, TeamRoundPit,
};
use crate::section::SectionId;
use crate::selection::{Metric, SelectionState};

pub const TOP_DRIVERS: usize = 10;
pub const LINE_DRIVERS: usize = 6;
pub const TABLE_CAP: usize = 12;
pub const HEATMAP_FLOOR: f64 = 0.08;

/// Linear map of `value` from `[from_min, from_max]` onto `[to_min, to_max]`.
///
/// Output is clamped to the target range. A degenerate domain or a non-finite
/// input yields `to_min`.
pub fn scale(value: f64, from_min: f64, from_max: f64, to_min: f64, to_max: f64) -> f64 {
    if !value.is_finite() || !from_min.is_finite() || !from_max.is_finite() {
        return to_min;
    }
    if from_max <= from_min {
        return to_min;
    }
    let t = (value - from_min) / (from_max - from_min);
    let out = to_min + t * (to_max - to_min);
    let (lo, hi) = if to_min <= to_max {
        (to_min, to_max)
    } else {
        (to_max, to_min)
    };
    out.clamp(lo, hi)
}

/// Caches one derived value and recomputes it only when its key changes.
#[derive(Debug, Clone)]
pub struct Memo<K, V> {
    key: Option<K>,
    value: Option<V>,
    computes: u64,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            key: None,
            value: None,
            computes: 0,
        }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce() -> V) -> &V {
        if self.key.as_ref() != Some(&key) {
            self.value = None;
            self.key = Some(key);
        }
        if self.value.is_none() {
            self.computes += 1;
        }
        self.value.get_or_insert_with(compute)
    }

    pub fn get(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn computes(&self) -> u64 {
        self.computes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopDriver {
    pub rank: usize,
    pub driver: String,
    pub points: f64,
}

/// First `n` drivers by value at the final round, descending. Equal values keep
/// source order.
pub fn top_drivers(table: &RoundTable, n: usize) -> Vec<TopDriver> {
    let Some(last) = table.final_round() else {
        return Vec::new();
    };
    let mut ranked: Vec<(&str, f64)> = table
        .rows
        .iter()
        .map(|row| (row.driver.as_str(), row.at(last)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(idx, (driver, points))| TopDriver {
            rank: idx + 1,
            driver: driver.to_string(),
            points,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinePoint {
    pub round: u32,
    pub event: String,
    pub values: Vec<(String, f64)>,
}

impl LinePoint {
    pub fn value(&self, driver: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == driver)
            .map(|(_, v)| *v)
    }
}

/// One record per round with a value per requested driver (`0.0` when absent).
pub fn line_data(table: &RoundTable, drivers: &[String]) -> Vec<LinePoint> {
    let by_driver: BTreeMap<&str, &payloads::DriverRow> =
        table.rows.iter().map(|r| (r.driver.as_str(), r)).collect();
    table
        .rounds
        .iter()
        .map(|label| LinePoint {
            round: label.round,
            event: label.event.clone(),
            values: drivers
                .iter()
                .map(|driver| {
                    let value = by_driver
                        .get(driver.as_str())
                        .map(|row| row.at(label.round))
                        .unwrap_or(0.0);
                    (driver.clone(), value)
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatCell {
    pub round: u32,
    pub points: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapRow {
    pub driver: String,
    pub cells: Vec<HeatCell>,
}

/// Heatmap rows for `drivers`, in that order. Intensity is `value / max` over the
/// whole table, floored at `floor`; every cell sits at the floor when max is 0.
pub fn heatmap_rows(table: &RoundTable, drivers: &[String], floor: f64) -> Vec<HeatmapRow> {
    let max = table
        .rows
        .iter()
        .flat_map(|row| table.rounds.iter().map(move |r| row.at(r.round)))
        .fold(0.0_f64, f64::max);
    drivers
        .iter()
        .filter_map(|driver| table.rows.iter().find(|row| &row.driver == driver))
        .map(|row| HeatmapRow {
            driver: row.driver.clone(),
            cells: table
                .rounds
                .iter()
                .map(|label| {
                    let points = row.at(label.round);
                    let intensity = if max > 0.0 {
                        (points / max).clamp(floor, 1.0)
                    } else {
                        floor
                    };
                    HeatCell {
                        round: label.round,
                        points,
                        intensity,
                    }
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOption {
    pub round: u32,
    pub event: String,
}

/// Distinct rounds in ascending order, first-seen event name wins.
pub fn distinct_rounds<T>(
    items: &[T],
    round_of: impl Fn(&T) -> u32,
    event_of: impl Fn(&T) -> Option<String>,
) -> Vec<RoundOption> {
    let mut seen: BTreeMap<u32, String> = BTreeMap::new();
    for item in items {
        seen.entry(round_of(item))
            .or_insert_with(|| event_of(item).unwrap_or_default());
    }
    seen.into_iter()
        .map(|(round, event)| RoundOption { round, event })
        .collect()
}

fn label_events(mut rounds: Vec<RoundOption>, labels: &[RoundLabel]) -> Vec<RoundOption> {
    for option in &mut rounds {
        if option.event.is_empty()
            && let Some(label) = labels.iter().find(|l| l.round == option.round)
        {
            option.event = label.event.clone();
        }
    }
    rounds
}

/// Rows of `items` belonging to `round`, ascending by `metric`, capped.
pub fn round_rows<T: Clone>(
    items: &[T],
    round: u32,
    round_of: impl Fn(&T) -> u32,
    metric: impl Fn(&T) -> f64,
    cap: usize,
) -> Vec<T> {
    let mut rows: Vec<T> = items
        .iter()
        .filter(|item| round_of(*item) == round)
        .cloned()
        .collect();
    rows.sort_by(|a, b| metric(a).total_cmp(&metric(b)));
    rows.truncate(cap);
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRow {
    pub driver: String,
    pub poles: u32,
    pub wins_from_pole: u32,
    pub conversion_rate: f64,
}

/// Pole-to-win leaderboard: rate desc, then poles desc, then source order.
pub fn conversion_rows(records: &[PoleRecord]) -> Vec<ConversionRow> {
    let mut rows: Vec<ConversionRow> = records
        .iter()
        .map(|r| ConversionRow {
            driver: r.driver.clone(),
            poles: r.poles,
            wins_from_pole: r.wins_from_pole,
            conversion_rate: r.conversion_rate.clamp(0.0, 1.0),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.conversion_rate
            .total_cmp(&a.conversion_rate)
            .then(b.poles.cmp(&a.poles))
    });
    rows
}

/// Passing leaderboard: passes desc, then net positions desc, capped.
pub fn passing_rows(records: &[DriverPassing], cap: usize) -> Vec<DriverPassing> {
    let mut rows = records.to_vec();
    rows.sort_by(|a, b| {
        b.passes_made
            .cmp(&a.passes_made)
            .then(b.positions_gained_net.cmp(&a.positions_gained_net))
    });
    rows.truncate(cap);
    rows
}

/// Identifiers whose media the chapter features.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spotlight {
    pub driver: Option<String>,
    pub team: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChampionshipView {
    pub rounds: Vec<RoundLabel>,
    pub top_drivers: Vec<TopDriver>,
    pub line_drivers: Vec<String>,
    pub line_data: Vec<LinePoint>,
    pub heatmap_rows: Vec<HeatmapRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualifyingView {
    pub rounds: Vec<RoundOption>,
    pub selected_round: u32,
    pub rows: Vec<Q3Record>,
    pub conversion_rows: Vec<ConversionRow>,
    pub rounds_used: Vec<ConversionRound>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaceView {
    pub rounds: Vec<RoundOption>,
    pub selected_round: u32,
    pub metric: Metric,
    pub rows: Vec<payloads::PaceRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceSummaryRow {
    pub round: u32,
    pub event: String,
    pub total_stops: u32,
    pub fastest_pit_s: f64,
    pub median_pit_s: Option<f64>,
    pub fastest_team: Option<String>,
    pub fastest_driver: Option<String>,
    pub bar: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PitView {
    pub rounds: Vec<RoundOption>,
    /// `None` when no per-round rows survived parsing; the season table and
    /// race summary still render.
    pub selected_round: Option<u32>,
    pub metric: Metric,
    pub team_season: Vec<payloads::TeamSeasonPit>,
    pub rows: Vec<TeamRoundPit>,
    pub race_summary: Vec<RaceSummaryRow>,
    pub notes: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceDot {
    pub round: u32,
    pub event: String,
    pub total_overtakes: f64,
    pub pass_rate: f64,
    pub drs_share: Option<f64>,
    pub radius: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OvertakeView {
    pub race_dots: Vec<RaceDot>,
    pub circuit_rows: Vec<payloads::CircuitIndex>,
    pub passing_rows: Vec<DriverPassing>,
    pub notes: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChapterView {
    Championship(ChampionshipView),
    Qualifying(QualifyingView),
    Pace(PaceView),
    PitStops(PitView),
    Overtakes(OvertakeView),
}

impl ChapterView {
    pub fn spotlight(&self) -> Spotlight {
        match self {
            ChapterView::Championship(v) => Spotlight {
                driver: v.top_drivers.first().map(|d| d.driver.clone()),
                team: None,
            },
            ChapterView::Qualifying(v) => Spotlight {
                driver: v.rows.first().map(|r| r.driver.clone()),
                team: v.rows.first().map(|r| r.team.clone()).filter(|t| !t.is_empty()),
            },
            ChapterView::Pace(v) => {
                // Fastest of the round regardless of the sort metric.
                let fastest = v
                    .rows
                    .iter()
                    .min_by(|a, b| a.pace_delta_to_best_avg_s.total_cmp(&b.pace_delta_to_best_avg_s));
                Spotlight {
                    driver: fastest.map(|r| r.driver.clone()),
                    team: fastest.map(|r| r.team.clone()).filter(|t| !t.is_empty()),
                }
            }
            ChapterView::PitStops(v) => Spotlight {
                driver: None,
                team: v.rows.first().map(|r| r.team.clone()),
            },
            ChapterView::Overtakes(v) => Spotlight {
                driver: v.passing_rows.first().map(|r| r.driver.clone()),
                team: v.passing_rows.first().map(|r| r.team.clone()).filter(|t| !t.is_empty()),
            },
        }
    }
}

/// Selection-independent part of a chapter, derived once per dataset revision.
#[derive(Debug, Clone, PartialEq)]
pub enum ChapterBase {
    Championship(ChampionshipView),
    Qualifying {
        records: Vec<Q3Record>,
        rounds: Vec<RoundOption>,
        conversion_rows: Vec<ConversionRow>,
        rounds_used: Vec<ConversionRound>,
    },
    Pace {
        payload: PacePayload,
        rounds: Vec<RoundOption>,
    },
    PitStops {
        payload: PitPayload,
        rounds: Vec<RoundOption>,
        team_season: Vec<payloads::TeamSeasonPit>,
        race_summary: Vec<RaceSummaryRow>,
    },
    Overtakes(OvertakeView),
}

/// Parse and derive the selection-independent views for `chapter`.
///
/// `None` means the payloads loaded but are structurally or semantically
/// unusable for this chapter.
pub fn derive_base(chapter: SectionId, sources: &[Arc<Value>]) -> Option<ChapterBase> {
    match chapter {
        SectionId::Intro => None,
        SectionId::Championship => {
            let standings = payloads::parse_round_table(sources.first()?)?;
            let heatmap = payloads::parse_round_table(sources.get(1)?)?;
            championship_view(&standings, &heatmap).map(ChapterBase::Championship)
        }
        SectionId::Qualifying => {
            let records = payloads::parse_q3_gaps(sources.first()?)?;
            let poles = payloads::parse_pole_to_win(sources.get(1)?)?;
            let rounds = distinct_rounds(&records, |r| r.round, |r| Some(r.event_name.clone()));
            if rounds.is_empty() {
                return None;
            }
            Some(ChapterBase::Qualifying {
                records,
                rounds,
                conversion_rows: conversion_rows(&poles.records),
                rounds_used: poles.rounds_used,
            })
        }
        SectionId::Pace => {
            let payload = payloads::parse_pace(sources.first()?)?;
            if payload.rows.is_empty() {
                return None;
            }
            let rounds = label_events(
                distinct_rounds(&payload.rows, |r| r.round, |_| None),
                &payload.rounds,
            );
            Some(ChapterBase::Pace { payload, rounds })
        }
        SectionId::PitStops => {
            let payload = payloads::parse_pitstops(sources.first()?)?;
            if payload.team_season.is_empty() && payload.team_by_round.is_empty() {
                return None;
            }
            let rounds = label_events(
                distinct_rounds(&payload.team_by_round, |r| r.round, |_| None),
                &payload.rounds,
            );
            let mut team_season = payload.team_season.clone();
            team_season.sort_by(|a, b| a.avg_pit_s.total_cmp(&b.avg_pit_s));
            let race_summary = race_summary_rows(&payload);
            Some(ChapterBase::PitStops {
                payload,
                rounds,
                team_season,
                race_summary,
            })
        }
        SectionId::Overtakes => {
            let payload = payloads::parse_overtakes(sources.first()?)?;
            overtake_view(payload).map(ChapterBase::Overtakes)
        }
    }
}

impl ChapterBase {
    /// Rounds the selector may point at, ascending. Empty for chapters without one.
    pub fn valid_rounds(&self) -> Vec<u32> {
        let rounds = match self {
            ChapterBase::Qualifying { rounds, .. }
            | ChapterBase::Pace { rounds, .. }
            | ChapterBase::PitStops { rounds, .. } => rounds,
            ChapterBase::Championship(_) | ChapterBase::Overtakes(_) => return Vec::new(),
        };
        rounds.iter().map(|r| r.round).collect()
    }

    /// Full view for the current selection. `None` when qualifying or pace
    /// have no round to show. Pit stops always produce a view here.
    pub fn view(&self, selection: Option<&SelectionState>) -> Option<ChapterView> {
        match self {
            ChapterBase::Championship(v) => Some(ChapterView::Championship(v.clone())),
            ChapterBase::Overtakes(v) => Some(ChapterView::Overtakes(v.clone())),
            ChapterBase::Qualifying {
                records,
                rounds,
                conversion_rows,
                rounds_used,
            } => {
                let round = selection?.selected_round?;
                Some(ChapterView::Qualifying(QualifyingView {
                    rounds: rounds.clone(),
                    selected_round: round,
                    rows: round_rows(records, round, |r| r.round, |r| r.gap_to_pole_sec, TABLE_CAP),
                    conversion_rows: conversion_rows.clone(),
                    rounds_used: rounds_used.clone(),
                }))
            }
            ChapterBase::Pace { payload, rounds } => {
                let selection = selection?;
                let round = selection.selected_round?;
                let metric = selection.metric;
                let rows = round_rows(
                    &payload.rows,
                    round,
                    |r| r.round,
                    |r| match metric {
                        Metric::PaceConsistency => r.consistency_s,
                        _ => r.pace_delta_to_best_avg_s,
                    },
                    TABLE_CAP,
                );
                Some(ChapterView::Pace(PaceView {
                    rounds: rounds.clone(),
                    selected_round: round,
                    metric,
                    rows,
                }))
            }
            ChapterBase::PitStops {
                payload,
                rounds,
                team_season,
                race_summary,
            } => {
                let round = selection.and_then(|s| s.selected_round);
                let metric = selection.map_or(Metric::PitMedian, |s| s.metric);
                let rows = match round {
                    Some(round) => round_rows(
                        &payload.team_by_round,
                        round,
                        |r| r.round,
                        |r| match metric {
                            Metric::PitBest => r.best_pit_s,
                            _ => r.p50_pit_s,
                        },
                        TABLE_CAP,
                    ),
                    None => Vec::new(),
                };
                Some(ChapterView::PitStops(PitView {
                    rounds: rounds.clone(),
                    selected_round: round,
                    metric,
                    team_season: team_season.clone(),
                    rows,
                    race_summary: race_summary.clone(),
                    notes: payload.notes.clone(),
                }))
            }
        }
    }
}

pub fn championship_view(standings: &RoundTable, heatmap: &RoundTable) -> Option<ChampionshipView> {
    if standings.rounds.is_empty()
        || standings.rows.is_empty()
        || heatmap.rounds.is_empty()
        || heatmap.rows.is_empty()
    {
        return None;
    }
    let top = top_drivers(standings, TOP_DRIVERS);
    let line_drivers: Vec<String> = top
        .iter()
        .take(LINE_DRIVERS)
        .map(|d| d.driver.clone())
        .collect();
    let heat_drivers: Vec<String> = top.iter().map(|d| d.driver.clone()).collect();
    Some(ChampionshipView {
        rounds: standings.rounds.clone(),
        line_data: line_data(standings, &line_drivers),
        heatmap_rows: heatmap_rows(heatmap, &heat_drivers, HEATMAP_FLOOR),
        top_drivers: top,
        line_drivers,
    })
}

fn race_summary_rows(payload: &PitPayload) -> Vec<RaceSummaryRow> {
    let max_stops = payload
        .race_summary
        .iter()
        .map(|r| r.total_stops as f64)
        .fold(0.0_f64, f64::max);
    let mut rows: Vec<RaceSummaryRow> = payload
        .race_summary
        .iter()
        .map(|r| RaceSummaryRow {
            round: r.round,
            event: payload
                .rounds
                .iter()
                .find(|l| l.round == r.round)
                .map(|l| l.event.clone())
                .unwrap_or_default(),
            total_stops: r.total_stops,
            fastest_pit_s: r.fastest_pit_s,
            median_pit_s: r.median_pit_s,
            fastest_team: r.fastest_team.clone(),
            fastest_driver: r.fastest_driver.clone(),
            bar: scale(r.total_stops as f64, 0.0, max_stops, 0.0, 1.0),
        })
        .collect();
    rows.sort_by_key(|r| r.round);
    rows
}

pub fn overtake_view(payload: payloads::OvertakePayload) -> Option<OvertakeView> {
    if payload.races.is_empty() {
        return None;
    }
    let (min_total, max_total) = min_max(payload.races.iter().map(|r| r.total_overtakes));
    let (min_rate, max_rate) = min_max(payload.races.iter().map(|r| r.pass_rate));
    let mut race_dots: Vec<RaceDot> = payload
        .races
        .iter()
        .map(|r| RaceDot {
            round: r.round,
            event: r.event.clone(),
            total_overtakes: r.total_overtakes,
            pass_rate: r.pass_rate,
            drs_share: r.drs_share,
            radius: scale(r.total_overtakes, min_total, max_total, 1.0, 8.0),
            opacity: scale(r.pass_rate, min_rate, max_rate, 0.35, 1.0),
        })
        .collect();
    race_dots.sort_by_key(|d| d.round);

    let mut circuit_rows = if payload.circuit_index.is_empty() {
        payload
            .races
            .iter()
            .map(|r| payloads::CircuitIndex {
                round: r.round,
                event: r.event.clone(),
                processional_index: r.processional_index,
                pass_rate: r.pass_rate,
            })
            .collect()
    } else {
        payload.circuit_index.clone()
    };
    circuit_rows.sort_by(|a, b| {
        b.processional_index
            .total_cmp(&a.processional_index)
            .then(a.round.cmp(&b.round))
    });

    Some(OvertakeView {
        race_dots,
        circuit_rows,
        passing_rows: passing_rows(&payload.driver_passing, TABLE_CAP),
        notes: payload.notes,
    })
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}
