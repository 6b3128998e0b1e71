use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use serde_json::{Value, json};

use f1_report::provider::{ProviderConfig, handle_command};
use f1_report::section::{CHAPTERS, SectionId};
use f1_report::selection::Metric;
use f1_report::source::{DataSource, DatasetError};
use f1_report::state::{
    AppState, Chapter, ChapterStatus, DatasetId, Delta, ProviderCommand, apply_delta,
};
use f1_report::views::ChapterView;

fn fixture_dir(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    if !name.is_empty() {
        path.push(name);
    }
    path
}

fn read_fixture(name: &str) -> Value {
    let raw = fs::read_to_string(fixture_dir(name)).expect("fixture file should be readable");
    serde_json::from_str(&raw).expect("fixture should be valid json")
}

fn provider_config(data: DataSource) -> ProviderConfig {
    ProviderConfig {
        data,
        media: DataSource::Dir {
            root: fixture_dir("site"),
        },
        parallelism: 2,
        timeout: Duration::from_secs(2),
    }
}

fn run_commands(config: &ProviderConfig, commands: Vec<ProviderCommand>) -> Vec<Delta> {
    let (tx, rx) = mpsc::channel();
    for cmd in commands {
        handle_command(config, &tx, cmd);
    }
    drop(tx);
    rx.into_iter().collect()
}

fn loaded_state() -> AppState {
    let source = DataSource::Dir {
        root: fixture_dir(""),
    };
    let mut state = AppState::new();
    let commands = state.begin_loads(&source, false);
    for delta in run_commands(&provider_config(source), commands) {
        apply_delta(&mut state, delta);
    }
    state
}

fn document_text(state: &AppState) -> Vec<String> {
    let doc = f1_report::report::build_document(state, 100);
    doc.lines
        .iter()
        .map(|line| line.spans.iter().map(|s| s.content.to_string()).collect())
        .collect()
}

fn pace_rows(rounds: &[u32]) -> Value {
    let rows: Vec<Value> = rounds
        .iter()
        .map(|round| {
            json!({
                "round": round,
                "driver": "NOR",
                "team": "McLaren",
                "avg_lap_s": 90.0,
                "consistency_s": 0.3,
                "pace_delta_to_best_avg_s": 0.0
            })
        })
        .collect();
    json!({ "rounds": [], "rows": rows })
}

#[test]
fn every_chapter_reaches_ready_from_fixtures() {
    let state = loaded_state();
    for id in CHAPTERS {
        let chapter = state.chapter(id).expect("chapter exists");
        assert!(
            chapter.status.ready().is_some(),
            "{} should be ready, got {:?}",
            id.key(),
            chapter.status
        );
    }
    assert_eq!(state.stale_results, 0);
}

#[test]
fn begin_loads_marks_chapters_loading_and_skips_fresh_ones() {
    let source = DataSource::Dir {
        root: fixture_dir(""),
    };
    let mut state = AppState::new();
    let commands = state.begin_loads(&source, false);
    assert_eq!(commands.len(), CHAPTERS.len());
    assert!(state.chapters.iter().all(|c| c.status.is_loading()));

    let ProviderCommand::LoadChapter { requests, .. } = &commands[1] else {
        panic!("expected a chapter load");
    };
    let ids: Vec<DatasetId> = requests.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![DatasetId::Q3Gaps, DatasetId::PoleToWin]);

    for delta in run_commands(&provider_config(source.clone()), commands) {
        apply_delta(&mut state, delta);
    }
    assert!(state.begin_loads(&source, false).is_empty());
    assert_eq!(state.begin_loads(&source, true).len(), CHAPTERS.len());
}

#[test]
fn failure_in_one_chapter_leaves_others_untouched() {
    let source = DataSource::Dir {
        root: fixture_dir(""),
    };
    let mut state = AppState::new();
    let commands = state.begin_loads(&source, false);
    let config = provider_config(source);

    for cmd in commands {
        let ProviderCommand::LoadChapter {
            chapter,
            token,
            requests,
        } = cmd
        else {
            continue;
        };
        if chapter == SectionId::Qualifying {
            let results = requests
                .iter()
                .map(|req| match req.id {
                    DatasetId::PoleToWin => {
                        (req.id, Err(DatasetError::Transport("http 503".to_string())))
                    }
                    _ => (req.id, Ok(read_fixture(req.id.file_name()))),
                })
                .collect();
            apply_delta(
                &mut state,
                Delta::ChapterLoaded {
                    chapter,
                    token,
                    results,
                },
            );
        } else {
            let cmd = ProviderCommand::LoadChapter {
                chapter,
                token,
                requests,
            };
            for delta in run_commands(&config, vec![cmd]) {
                apply_delta(&mut state, delta);
            }
        }
    }

    let qualifying = state.chapter(SectionId::Qualifying).expect("chapter exists");
    assert_eq!(qualifying.status.error(), Some("transport error: http 503"));
    for id in [
        SectionId::Championship,
        SectionId::Pace,
        SectionId::PitStops,
        SectionId::Overtakes,
    ] {
        assert!(state.chapter(id).expect("chapter exists").status.ready().is_some());
    }
    assert!(state.logs.iter().any(|l| l.contains("[WARN] qualifying")));
}

#[test]
fn first_failing_dataset_wins() {
    let source = DataSource::Dir {
        root: fixture_dir("broken"),
    };
    let mut state = AppState::new();
    let commands = state.begin_loads(&source, false);
    for delta in run_commands(&provider_config(source), commands) {
        apply_delta(&mut state, delta);
    }
    // q3_gaps.json is truncated json, pole_to_win.json is absent.
    let status = &state.chapter(SectionId::Qualifying).expect("chapter exists").status;
    assert!(status.error().is_some_and(|e| e.starts_with("parse error")));
    let pace = &state.chapter(SectionId::Pace).expect("chapter exists").status;
    assert!(pace.error().is_some_and(|e| e.starts_with("transport error")));
}

#[test]
fn loaded_but_unusable_is_empty_not_failed() {
    let source = DataSource::Dir {
        root: fixture_dir(""),
    };
    let mut chapter = Chapter::new(SectionId::Overtakes);
    let (token, _) = chapter.begin_load(&source, false).expect("load issued");
    assert!(chapter.apply_results(
        &token,
        vec![(DatasetId::Overtakes, Ok(json!({"races": "not a list"})))],
    ));
    assert!(chapter.status.is_missing());
    assert_eq!(chapter.status.error(), None);
}

#[test]
fn pit_chapter_with_season_rows_only_is_ready() {
    let source = DataSource::Dir {
        root: fixture_dir(""),
    };
    let mut state = AppState::new();
    let chapter = state.chapter_mut(SectionId::PitStops).expect("chapter exists");
    let (token, _) = chapter.begin_load(&source, false).expect("load issued");
    assert!(chapter.apply_results(
        &token,
        vec![(
            DatasetId::PitStops,
            Ok(json!({
                "team_season": [{"team": "McLaren", "avg_pit_s": 2.4, "consistency_s": 0.2}],
                "team_by_round": [
                    {"round": 1, "team": "McLaren", "p50_pit_s": "n/a", "best_pit_s": 2.1}
                ],
                "race_summary": []
            })),
        )],
    ));
    let Some(ChapterView::PitStops(view)) = chapter.status.ready().map(|v| &**v) else {
        panic!("expected pit view, got {:?}", chapter.status);
    };
    assert_eq!(view.selected_round, None);
    assert!(view.rows.is_empty());
    assert_eq!(view.team_season[0].team, "McLaren");

    let text = document_text(&state);
    assert!(text.iter().any(|l| l == "No per-round pit data in this export."));
    assert!(text.iter().any(|l| l.trim_start().starts_with("McLaren") && l.contains("2.40s")));
}

#[test]
fn superseded_load_is_dropped() {
    let source = DataSource::Dir {
        root: fixture_dir(""),
    };
    let mut state = AppState::new();
    let first = state.begin_loads(&source, true);
    let second = state.begin_loads(&source, true);
    let config = provider_config(source);

    // Commands for a superseded token never produce a delta.
    let late = run_commands(&config, first.clone());
    assert!(late.is_empty());

    for cmd in first {
        let ProviderCommand::LoadChapter {
            chapter,
            token,
            requests,
        } = cmd
        else {
            continue;
        };
        let results = requests
            .iter()
            .map(|req| (req.id, Ok(read_fixture(req.id.file_name()))))
            .collect();
        apply_delta(
            &mut state,
            Delta::ChapterLoaded {
                chapter,
                token,
                results,
            },
        );
    }
    assert_eq!(state.stale_results, CHAPTERS.len() as u64);
    assert!(state.chapters.iter().all(|c| c.status.is_loading()));

    for delta in run_commands(&config, second) {
        apply_delta(&mut state, delta);
    }
    assert!(state.chapters.iter().all(|c| c.status.ready().is_some()));
}

#[test]
fn reload_keeps_valid_round_and_resets_stale_one() {
    let source = DataSource::Dir {
        root: fixture_dir(""),
    };
    let mut chapter = Chapter::new(SectionId::Pace);
    let (token, _) = chapter.begin_load(&source, false).expect("load issued");
    chapter.apply_results(&token, vec![(DatasetId::Pace, Ok(pace_rows(&[1, 2, 3])))]);
    let selected = |c: &Chapter| c.selection.as_ref().and_then(|s| s.selected_round);
    assert_eq!(selected(&chapter), Some(3));
    assert!(chapter.select_round(1));
    assert!(!chapter.select_round(9));

    let (token, _) = chapter.begin_load(&source, true).expect("load issued");
    chapter.apply_results(&token, vec![(DatasetId::Pace, Ok(pace_rows(&[1, 4])))]);
    assert_eq!(selected(&chapter), Some(1));

    let (token, _) = chapter.begin_load(&source, true).expect("load issued");
    chapter.apply_results(&token, vec![(DatasetId::Pace, Ok(pace_rows(&[5, 6])))]);
    assert_eq!(selected(&chapter), Some(6));
    let Some(ChapterView::Pace(view)) = chapter.status.ready().map(|v| &**v) else {
        panic!("expected pace view");
    };
    assert_eq!(view.selected_round, 6);
}

#[test]
fn views_recompute_only_when_inputs_change() {
    let mut state = loaded_state();
    let chapter = state.chapter_mut(SectionId::PitStops).expect("chapter exists");
    assert_eq!(chapter.base_computes(), 1);
    assert_eq!(chapter.view_computes(), 1);

    chapter.refresh();
    chapter.refresh();
    assert_eq!(chapter.base_computes(), 1);
    assert_eq!(chapter.view_computes(), 1);

    assert!(chapter.cycle_metric());
    assert_eq!(chapter.base_computes(), 1);
    assert_eq!(chapter.view_computes(), 2);
    let Some(ChapterView::PitStops(view)) = chapter.status.ready().map(|v| &**v) else {
        panic!("expected pit view");
    };
    assert_eq!(view.metric, Metric::PitBest);

    assert!(chapter.step_round(false));
    assert!(!chapter.step_round(false));
    assert_eq!(chapter.view_computes(), 3);
}

#[test]
fn shutdown_drops_results_still_in_flight() {
    let source = DataSource::Dir {
        root: fixture_dir(""),
    };
    let mut state = AppState::new();
    let commands = state.begin_loads(&source, false);
    let config = provider_config(source);
    let (tx, rx) = mpsc::channel();
    let tokens: Vec<_> = commands
        .iter()
        .filter_map(|cmd| match cmd {
            ProviderCommand::LoadChapter { chapter, token, .. } => Some((*chapter, token.clone())),
            _ => None,
        })
        .collect();

    state.shutdown();
    for cmd in commands {
        handle_command(&config, &tx, cmd);
    }
    drop(tx);
    assert_eq!(rx.into_iter().count(), 0);

    for (chapter, token) in tokens {
        apply_delta(
            &mut state,
            Delta::ChapterLoaded {
                chapter,
                token,
                results: Vec::new(),
            },
        );
    }
    assert!(
        state
            .chapters
            .iter()
            .all(|c| matches!(c.status, ChapterStatus::Loading))
    );
}

#[test]
fn log_buffer_is_bounded() {
    let mut state = AppState::new();
    for i in 0..250 {
        state.push_log(format!("[INFO] line {i}"));
    }
    assert_eq!(state.logs.len(), 200);
    assert!(state.logs.back().is_some_and(|l| l.ends_with("line 249")));
}

#[test]
fn report_shows_failure_and_gap_messages_per_chapter() {
    let source = DataSource::Dir {
        root: fixture_dir("broken"),
    };
    let mut state = AppState::new();
    let commands = state.begin_loads(&source, false);
    for delta in run_commands(&provider_config(source), commands) {
        apply_delta(&mut state, delta);
    }
    let chapter = state.chapter_mut(SectionId::Overtakes).expect("chapter exists");
    let (token, _) = chapter
        .begin_load(&DataSource::Dir { root: fixture_dir("") }, true)
        .expect("load issued");
    chapter.apply_results(&token, vec![(DatasetId::Overtakes, Ok(json!({})))]);

    let text = document_text(&state);
    let failed = text
        .iter()
        .filter(|l| l.starts_with("This chapter could not be loaded"))
        .count();
    assert_eq!(failed, 4);
    assert!(text.iter().any(|l| l == "Data loaded, but the fields this chapter needs are missing."));
}

#[test]
fn report_shows_secondary_fields_from_fixtures() {
    let state = loaded_state();
    let text = document_text(&state);

    let stops = text
        .iter()
        .find(|l| l.trim_start().starts_with("R1 ") && l.contains("fastest"))
        .expect("race summary line for round 1");
    assert!(stops.contains("fastest 2.10s McLaren (NOR)"));
    assert!(stops.ends_with("median 2.40s"));

    assert!(text.iter().any(|l| l.contains("PIA") && l.contains("p10   97.500s")));

    let converted: Vec<&String> = text
        .iter()
        .filter(|l| l.contains("pole ") && l.contains(" won "))
        .collect();
    assert_eq!(converted.len(), 2);
    assert!(converted[0].contains("pole VER  won PIA"));
    assert!(converted[0].ends_with("lost"));
}
