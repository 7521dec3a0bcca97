//! Integration tests for the clue display engine
//!
//! These drive the full path: byte stream -> ingest -> dispatcher ->
//! surface registry, then inspect the published deltas, the final
//! dispatcher state and the history file on disk.

use std::path::Path;

use cluedisplay_core::history::temp_path;
use cluedisplay_core::{
    dispatcher, ingest, ClueHistory, Dispatcher, DisplayConfig, DisplayMessage, IngestStats,
    Region, SurfaceRegistry,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Everything a scripted run produced
struct Run {
    dispatcher: Dispatcher,
    messages: Vec<DisplayMessage>,
    stats: IngestStats,
    suggestions: Vec<String>,
}

/// Every message except clock updates, which arrive on each tick
async fn collect(mut rx: mpsc::Receiver<DisplayMessage>) -> Vec<DisplayMessage> {
    let mut out = Vec::new();
    while let Some(message) = rx.recv().await {
        if !matches!(message, DisplayMessage::Timer(_)) {
            out.push(message);
        }
    }
    out
}

/// Feed `script` through a fresh engine; query suggestions before closing
async fn run_script(script: &str, history: ClueHistory, count: Option<usize>) -> Run {
    let surfaces = SurfaceRegistry::new();
    let (_id, surface_rx) = surfaces.subscribe("test-surface", 16);
    let surface = tokio::spawn(collect(surface_rx));

    let engine = Dispatcher::new(&DisplayConfig::default(), history, surfaces);
    let (handle, requests) = dispatcher::channel(16);
    let task = tokio::spawn(engine.run(requests));

    let stats = ingest(script.as_bytes(), &handle).await.unwrap();
    let suggestions = handle.suggestions(count).await.unwrap();
    drop(handle);

    Run {
        dispatcher: task.await.unwrap(),
        messages: surface.await.unwrap(),
        stats,
        suggestions,
    }
}

fn history_in(dir: &TempDir, capacity: usize) -> ClueHistory {
    ClueHistory::load(dir.path().join("clues.hist"), capacity).unwrap()
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Display state
// ============================================================================

#[tokio::test]
async fn test_snapshot_is_first_message() {
    let dir = TempDir::new().unwrap();
    let run = run_script("power on\n", history_in(&dir, 8), None).await;

    match &run.messages[0] {
        DisplayMessage::Snapshot { state, timer } => {
            assert!(!state.powered);
            assert_eq!(timer.display, "00:00:00");
        }
        other => panic!("expected snapshot, got {other:?}"),
    }
    assert_eq!(run.messages[1], DisplayMessage::Power { on: true });
}

#[tokio::test]
async fn test_invalid_layout_leaves_previous_layout() {
    let dir = TempDir::new().unwrap();
    let run = run_script("layout clue timer\nlayout badtoken\n", history_in(&dir, 8), None).await;

    assert_eq!(
        run.dispatcher.state().layout,
        vec![Region::Clue, Region::Timer]
    );
    assert_eq!(run.stats.rejected, 1);

    let layouts: Vec<_> = run
        .messages
        .iter()
        .filter(|m| matches!(m, DisplayMessage::Layout { .. }))
        .collect();
    assert_eq!(layouts.len(), 1);
}

#[tokio::test]
async fn test_partially_valid_layout_is_rejected_whole() {
    let dir = TempDir::new().unwrap();
    let run = run_script("layout clue timer\nlayout image bogus\n", history_in(&dir, 8), None).await;
    assert_eq!(
        run.dispatcher.state().layout,
        vec![Region::Clue, Region::Timer]
    );
}

#[tokio::test]
async fn test_power_cycle_keeps_clue() {
    let dir = TempDir::new().unwrap();
    let run = run_script("power off\nclue X\npower on\n", history_in(&dir, 8), None).await;

    assert_eq!(run.dispatcher.state().clue, "X");
    assert!(run.dispatcher.state().powered);
    assert_eq!(
        &run.messages[1..],
        &[
            DisplayMessage::Power { on: false },
            DisplayMessage::Clue { text: "X".into() },
            DisplayMessage::Power { on: true },
        ]
    );
}

#[tokio::test]
async fn test_escaped_newline_in_clue() {
    let dir = TempDir::new().unwrap();
    let run = run_script("clue hello\\nworld\n", history_in(&dir, 8), None).await;
    assert_eq!(run.dispatcher.state().clue, "hello\nworld");
}

#[tokio::test]
async fn test_bad_lines_do_not_stop_ingestion() {
    let dir = TempDir::new().unwrap();
    let script = "nonsense\ntimer fast\n\nalignment diagonal\npower on\n";
    let run = run_script(script, history_in(&dir, 8), None).await;

    assert_eq!(run.stats.rejected, 3);
    assert_eq!(run.stats.blank, 1);
    assert_eq!(run.stats.commands, 1);
    assert!(run.dispatcher.state().powered);
}

#[tokio::test]
async fn test_unknown_tokens_are_forwarded() {
    let dir = TempDir::new().unwrap();
    let run = run_script(
        "color ultraviolet\nimage vessel_gg\nbackground cave\n",
        history_in(&dir, 8),
        None,
    )
    .await;

    assert_eq!(
        &run.messages[1..],
        &[
            DisplayMessage::Color {
                token: "ultraviolet".into(),
                rgba: None,
            },
            DisplayMessage::Image {
                key: Some("vessel_gg".into()),
                path: None,
            },
            DisplayMessage::Background {
                key: "cave".into(),
                path: None,
            },
        ]
    );
    assert_eq!(run.dispatcher.state().background.as_deref(), Some("cave"));
}

// ============================================================================
// Clue history
// ============================================================================

#[tokio::test]
async fn test_suggestions_ranked_by_frequency() {
    let dir = TempDir::new().unwrap();
    let script = "clue A\nclue A\nclue A\nclue A\nclue A\nclue B\nclue B\nclue C\n";
    let run = run_script(script, history_in(&dir, 8), Some(2)).await;

    assert_eq!(run.suggestions, vec!["A".to_string(), "B".to_string()]);
}

#[tokio::test]
async fn test_suggestion_ties_prefer_recent() {
    let dir = TempDir::new().unwrap();
    let run = run_script("clue old\nclue new\n", history_in(&dir, 8), None).await;
    assert_eq!(run.suggestions, vec!["new".to_string(), "old".to_string()]);
}

#[tokio::test]
async fn test_history_cap_evicts_oldest() {
    let dir = TempDir::new().unwrap();
    let capacity = 8;
    let script: String = (0..capacity + 5).map(|i| format!("clue c{i}\n")).collect();
    let run = run_script(&script, history_in(&dir, capacity), Some(100)).await;

    let expected: Vec<String> = (5..capacity + 5).map(|i| format!("c{i}")).collect();
    let retained: Vec<String> = run.dispatcher.history().entries().map(str::to_string).collect();
    assert_eq!(retained, expected);

    for evicted in 0..5 {
        assert!(!run.suggestions.contains(&format!("c{evicted}")));
    }
    assert_eq!(run.suggestions.len(), capacity);

    // on disk: the same window, most recent at the tail
    assert_eq!(read_lines(run.dispatcher.history().path()), expected);
}

#[tokio::test]
async fn test_restart_after_interrupted_write() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clues.hist");
    std::fs::write(&path, "first\nsecond\n").unwrap();
    // a crash between write and rename leaves a half-written temp file
    std::fs::write(temp_path(&path), "fir").unwrap();

    let history = ClueHistory::load(&path, 8).unwrap();
    assert_eq!(history.len(), 2);

    let run = run_script("clue third\n", history, None).await;
    assert_eq!(read_lines(&path), vec!["first", "second", "third"]);
    assert!(!temp_path(&path).exists());
    assert_eq!(run.dispatcher.history().len(), 3);
}

#[tokio::test]
async fn test_restart_with_only_temp_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clues.hist");
    std::fs::write(temp_path(&path), "partial").unwrap();

    let history = ClueHistory::load(&path, 8).unwrap();
    assert!(history.is_empty());
    assert!(path.exists());
}

#[tokio::test]
async fn test_persistence_failure_keeps_memory() {
    let dir = TempDir::new().unwrap();
    let history = ClueHistory::empty(dir.path().join("missing").join("clues.hist"), 8);

    let run = run_script("clue kept\nclue kept\n", history, None).await;

    assert_eq!(run.dispatcher.history().len(), 2);
    assert_eq!(run.suggestions, vec!["kept".to_string()]);
    assert_eq!(run.dispatcher.state().clue, "kept");
}

// ============================================================================
// Timer
// ============================================================================

#[tokio::test]
async fn test_timer_line_sets_speed_and_time() {
    let dir = TempDir::new().unwrap();
    let run = run_script("timer 0 90\ntimer 0 -30\n", history_in(&dir, 8), None).await;

    assert_eq!(run.dispatcher.timer().speed(), 0.0);
    assert_eq!(run.dispatcher.timer().seconds(), 60.0);
    assert_eq!(run.dispatcher.timer().display(), "00:01:00");
}

#[tokio::test(start_paused = true)]
async fn test_countdown_reaches_zero_and_stops() {
    let dir = TempDir::new().unwrap();
    let surfaces = SurfaceRegistry::new();
    let (_id, mut surface) = surfaces.subscribe("clock", 256);
    let engine = Dispatcher::new(&DisplayConfig::default(), history_in(&dir, 8), surfaces);
    let (handle, requests) = dispatcher::channel(16);
    let task = tokio::spawn(engine.run(requests));

    ingest(&b"timer -1 2\n"[..], &handle).await.unwrap();

    let mut clocks = Vec::new();
    while let Some(message) = surface.recv().await {
        if let DisplayMessage::Timer(snapshot) = message {
            assert!(snapshot.seconds >= 0.0);
            let done = snapshot.display == "00:00:00" && clocks.len() > 1;
            clocks.push(snapshot.display);
            if done {
                break;
            }
        }
    }

    // clamped at zero: further ticks keep publishing zero
    tokio::time::advance(std::time::Duration::from_secs(5)).await;
    drop(handle);
    let finished = task.await.unwrap();
    assert_eq!(finished.timer().seconds(), 0.0);

    assert_eq!(clocks.first().map(String::as_str), Some("00:00:00"));
    assert_eq!(clocks.last().map(String::as_str), Some("00:00:00"));
    assert!(clocks.contains(&"00:00:02".to_string()));
    assert!(clocks.contains(&"00:00:01".to_string()));
}
