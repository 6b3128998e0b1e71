//! Typed readers for the exported JSON resources.
//!
//! Every reader returns `None` when the payload is structurally unusable (root is
//! not an object or a required array is missing / not an array). Individual
//! records whose required numeric fields are not finite numbers are skipped.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct RoundLabel {
    pub round: u32,
    pub event: String,
}

/// One driver's per-round values keyed by round number.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverRow {
    pub driver: String,
    pub values: BTreeMap<u32, f64>,
}

impl DriverRow {
    /// Value at `round`, `0.0` when absent.
    pub fn at(&self, round: u32) -> f64 {
        self.values.get(&round).copied().unwrap_or(0.0)
    }
}

/// Shape shared by `standings_progression.json` and `points_heatmap.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTable {
    pub rounds: Vec<RoundLabel>,
    pub rows: Vec<DriverRow>,
}

impl RoundTable {
    pub fn final_round(&self) -> Option<u32> {
        self.rounds.iter().map(|r| r.round).max()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Q3Record {
    pub round: u32,
    pub event_name: String,
    pub driver: String,
    pub team: String,
    pub gap_to_pole_sec: f64,
    pub pole_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoleRecord {
    pub driver: String,
    pub poles: u32,
    pub wins_from_pole: u32,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRound {
    pub round: u32,
    pub event_name: String,
    pub pole_sitter: String,
    pub race_winner: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoleToWin {
    pub records: Vec<PoleRecord>,
    pub rounds_used: Vec<ConversionRound>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaceRow {
    pub round: u32,
    pub driver: String,
    pub team: String,
    pub avg_lap_s: f64,
    pub pace_delta_to_best_avg_s: f64,
    pub consistency_s: f64,
    pub p10_lap_s: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PacePayload {
    pub rounds: Vec<RoundLabel>,
    pub rows: Vec<PaceRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamSeasonPit {
    pub team: String,
    pub avg_pit_s: f64,
    pub consistency_s: f64,
    pub best_pit_s: Option<f64>,
    pub n_stops: Option<u32>,
    pub undercut_success: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamRoundPit {
    pub round: u32,
    pub team: String,
    pub p50_pit_s: f64,
    pub best_pit_s: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceSummary {
    pub round: u32,
    pub total_stops: u32,
    pub fastest_pit_s: f64,
    pub median_pit_s: Option<f64>,
    pub fastest_team: Option<String>,
    pub fastest_driver: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PitPayload {
    pub rounds: Vec<RoundLabel>,
    pub team_season: Vec<TeamSeasonPit>,
    pub team_by_round: Vec<TeamRoundPit>,
    pub race_summary: Vec<RaceSummary>,
    pub notes: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceOvertakes {
    pub round: u32,
    pub event: String,
    pub total_overtakes: f64,
    pub pass_rate: f64,
    pub processional_index: f64,
    pub drs_share: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitIndex {
    pub round: u32,
    pub event: String,
    pub processional_index: f64,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverPassing {
    pub driver: String,
    pub team: String,
    pub passes_made: i64,
    pub positions_gained_net: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OvertakePayload {
    pub races: Vec<RaceOvertakes>,
    pub circuit_index: Vec<CircuitIndex>,
    pub driver_passing: Vec<DriverPassing>,
    pub notes: Vec<(String, String)>,
}

/// Round header: `{RoundNumber, EventName}` in the championship tables,
/// `{round, event}` everywhere else.
#[derive(Debug, Deserialize)]
struct WireRound {
    #[serde(alias = "RoundNumber")]
    round: u32,
    #[serde(alias = "EventName", default)]
    event: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireConversionRound {
    round: u32,
    #[serde(default)]
    event_name: Option<String>,
    #[serde(default)]
    pole_sitter: Option<String>,
    #[serde(default)]
    race_winner: Option<String>,
}

fn parse_rounds(values: &[Value]) -> Vec<RoundLabel> {
    let mut rounds: Vec<RoundLabel> = values
        .iter()
        .filter_map(|v| WireRound::deserialize(v).ok())
        .map(|w| RoundLabel {
            round: w.round,
            event: trimmed(w.event),
        })
        .collect();
    rounds.sort_by_key(|r| r.round);
    rounds.dedup_by_key(|r| r.round);
    rounds
}

fn trimmed(text: Option<String>) -> String {
    text.map(|t| t.trim().to_string()).unwrap_or_default()
}

pub fn parse_round_table(root: &Value) -> Option<RoundTable> {
    let obj = root.as_object()?;
    let rounds = parse_rounds(required_array(obj, "rounds")?);
    let rows = required_array(obj, "rows")?
        .iter()
        .filter_map(parse_driver_row)
        .collect();
    Some(RoundTable { rounds, rows })
}

fn parse_driver_row(value: &Value) -> Option<DriverRow> {
    let obj = value.as_object()?;
    let driver = pick_string(value, "Driver")?;
    let values = obj
        .iter()
        .filter_map(|(key, v)| {
            let round = key.trim().parse::<u32>().ok()?;
            Some((round, finite(v)?))
        })
        .collect();
    Some(DriverRow { driver, values })
}

pub fn parse_q3_gaps(root: &Value) -> Option<Vec<Q3Record>> {
    let obj = root.as_object()?;
    let records = required_array(obj, "records")?
        .iter()
        .filter_map(|r| {
            Some(Q3Record {
                round: pick_u32(r, "round")?,
                event_name: pick_string(r, "event_name").unwrap_or_default(),
                driver: pick_string(r, "driver")?,
                team: pick_string(r, "team").unwrap_or_default(),
                gap_to_pole_sec: pick_f64(r, "gap_to_pole_sec")?,
                pole_time: pick_f64(r, "pole_time"),
            })
        })
        .collect();
    Some(records)
}

pub fn parse_pole_to_win(root: &Value) -> Option<PoleToWin> {
    let obj = root.as_object()?;
    let records = required_array(obj, "records")?
        .iter()
        .filter_map(|r| {
            Some(PoleRecord {
                driver: pick_string(r, "driver")?,
                poles: pick_u32(r, "poles")?,
                wins_from_pole: pick_u32(r, "wins_from_pole")?,
                conversion_rate: pick_f64(r, "conversion_rate")?,
            })
        })
        .collect();
    let rounds_used = optional_array(obj, "rounds_used_for_conversion")
        .iter()
        .filter_map(|r| WireConversionRound::deserialize(r).ok())
        .map(|w| ConversionRound {
            round: w.round,
            event_name: trimmed(w.event_name),
            pole_sitter: trimmed(w.pole_sitter),
            race_winner: trimmed(w.race_winner),
        })
        .collect();
    Some(PoleToWin {
        records,
        rounds_used,
    })
}

pub fn parse_pace(root: &Value) -> Option<PacePayload> {
    let obj = root.as_object()?;
    let rounds = parse_rounds(optional_array(obj, "rounds"));
    let rows = required_array(obj, "rows")?
        .iter()
        .filter_map(|r| {
            Some(PaceRow {
                round: pick_u32(r, "round")?,
                driver: pick_string(r, "driver")?,
                team: pick_string(r, "team").unwrap_or_default(),
                avg_lap_s: pick_f64(r, "avg_lap_s")?,
                pace_delta_to_best_avg_s: pick_f64(r, "pace_delta_to_best_avg_s")?,
                consistency_s: pick_f64(r, "consistency_s")?,
                p10_lap_s: pick_f64(r, "p10_lap_s"),
            })
        })
        .collect();
    Some(PacePayload { rounds, rows })
}

pub fn parse_pitstops(root: &Value) -> Option<PitPayload> {
    let obj = root.as_object()?;
    let rounds = parse_rounds(optional_array(obj, "rounds"));
    let team_season = required_array(obj, "team_season")?
        .iter()
        .filter_map(|r| {
            Some(TeamSeasonPit {
                team: pick_string(r, "team")?,
                avg_pit_s: pick_f64(r, "avg_pit_s")?,
                consistency_s: pick_f64(r, "consistency_s")?,
                best_pit_s: pick_f64(r, "best_pit_s"),
                n_stops: pick_u32(r, "n_stops"),
                undercut_success: pick_f64(r, "undercut_success"),
            })
        })
        .collect();
    let team_by_round = required_array(obj, "team_by_round")?
        .iter()
        .filter_map(|r| {
            Some(TeamRoundPit {
                round: pick_u32(r, "round")?,
                team: pick_string(r, "team")?,
                p50_pit_s: pick_f64(r, "p50_pit_s")?,
                best_pit_s: pick_f64(r, "best_pit_s")?,
            })
        })
        .collect();
    let race_summary = required_array(obj, "race_summary")?
        .iter()
        .filter_map(|r| {
            Some(RaceSummary {
                round: pick_u32(r, "round")?,
                total_stops: pick_u32(r, "total_stops")?,
                fastest_pit_s: pick_f64(r, "fastest_pit_s")?,
                median_pit_s: pick_f64(r, "median_pit_s"),
                fastest_team: pick_string(r, "fastest_team"),
                fastest_driver: pick_string(r, "fastest_driver"),
            })
        })
        .collect();
    Some(PitPayload {
        rounds,
        team_season,
        team_by_round,
        race_summary,
        notes: parse_notes(obj),
    })
}

pub fn parse_overtakes(root: &Value) -> Option<OvertakePayload> {
    let obj = root.as_object()?;
    let races = required_array(obj, "races")?
        .iter()
        .filter_map(|r| {
            Some(RaceOvertakes {
                round: pick_u32(r, "round")?,
                event: pick_string(r, "event").unwrap_or_default(),
                total_overtakes: pick_f64(r, "total_overtakes")?,
                pass_rate: pick_f64(r, "pass_rate")?,
                processional_index: pick_f64(r, "processional_index")?,
                drs_share: pick_f64(r, "drs_share"),
            })
        })
        .collect();
    let circuit_index = optional_array(obj, "circuit_index")
        .iter()
        .filter_map(|r| {
            Some(CircuitIndex {
                round: pick_u32(r, "round")?,
                event: pick_string(r, "event").unwrap_or_default(),
                processional_index: pick_f64(r, "processional_index")?,
                pass_rate: pick_f64(r, "pass_rate")?,
            })
        })
        .collect();
    let driver_passing = required_array(obj, "driver_passing")?
        .iter()
        .filter_map(|r| {
            Some(DriverPassing {
                driver: pick_string(r, "driver")?,
                team: pick_string(r, "team").unwrap_or_default(),
                passes_made: pick_f64(r, "passes_made")? as i64,
                positions_gained_net: pick_f64(r, "positions_gained_net")? as i64,
            })
        })
        .collect();
    Some(OvertakePayload {
        races,
        circuit_index,
        driver_passing,
        notes: parse_notes(obj),
    })
}

fn parse_notes(obj: &Map<String, Value>) -> Vec<(String, String)> {
    let Some(notes) = obj.get("notes").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut out: Vec<(String, String)> = notes
        .iter()
        .filter_map(|(k, v)| {
            let text = v.as_str()?.trim();
            (!text.is_empty()).then(|| (k.clone(), text.to_string()))
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn required_array<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Vec<Value>> {
    obj.get(key)?.as_array()
}

fn optional_array<'a>(obj: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    obj.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Finite number from a JSON number or numeric string.
pub fn finite(value: &Value) -> Option<f64> {
    let num = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    num.is_finite().then_some(num)
}

fn pick_f64(value: &Value, key: &str) -> Option<f64> {
    finite(value.get(key)?)
}

fn pick_u32(value: &Value, key: &str) -> Option<u32> {
    let num = pick_f64(value, key)?;
    if num < 0.0 || num.fract() != 0.0 || num > u32::MAX as f64 {
        return None;
    }
    Some(num as u32)
}

fn pick_string(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
