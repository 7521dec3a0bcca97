//! Command Dispatcher
//!
//! The single writer. The dispatcher owns the [`DisplayState`], the
//! [`TimerEngine`] and the [`ClueHistory`]; everything else talks to it by
//! posting [`DisplayRequest`]s through a [`DisplayHandle`].
//!
//! # Event Loop
//!
//! ```text
//!   DisplayHandle (ingest) ──┐
//!   DisplayHandle (suggest) ─┼──► mpsc ──┐
//!                            │           ▼
//!                            │    ┌────────────┐  broadcast  ┌──────────┐
//!                            │    │ Dispatcher │ ──────────► │ Surfaces │
//!                            │    └────────────┘             └──────────┘
//!        interval (100ms) ───┴──────────▲
//! ```
//!
//! Requests and ticks are multiplexed with `tokio::select!`, so neither can
//! starve the other, and requests from one handle are applied in the order
//! they were sent. The loop ends when every handle has been dropped.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::command::Command;
use crate::config::{AssetCatalog, DisplayConfig};
use crate::history::ClueHistory;
use crate::messages::DisplayMessage;
use crate::state::DisplayState;
use crate::surface_registry::SurfaceRegistry;
use crate::timer::{TimerEngine, TimerSnapshot};

/// Default capacity of the request channel
pub const DEFAULT_REQUEST_CAPACITY: usize = 256;

/// Requests accepted by the dispatcher loop
#[derive(Debug)]
pub enum DisplayRequest {
    /// Apply one parsed command
    Apply(Command),

    /// Rank the clue history
    Suggestions {
        /// How many clues to return (`None` = configured default)
        count: Option<usize>,
        /// Where to send the ranked list
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// The dispatcher loop has stopped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("display dispatcher is not running")]
pub struct DispatchClosed;

/// Cloneable sending side of the dispatcher channel
#[derive(Clone, Debug)]
pub struct DisplayHandle {
    tx: mpsc::Sender<DisplayRequest>,
}

impl DisplayHandle {
    /// Post a raw request
    ///
    /// # Errors
    ///
    /// Returns [`DispatchClosed`] if the dispatcher loop has ended.
    pub async fn send(&self, request: DisplayRequest) -> Result<(), DispatchClosed> {
        self.tx.send(request).await.map_err(|_| DispatchClosed)
    }

    /// Queue a command for application
    ///
    /// # Errors
    ///
    /// Returns [`DispatchClosed`] if the dispatcher loop has ended.
    pub async fn apply(&self, command: Command) -> Result<(), DispatchClosed> {
        self.send(DisplayRequest::Apply(command)).await
    }

    /// Ask for ranked clue suggestions
    ///
    /// The query is answered after every command queued before it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchClosed`] if the dispatcher loop has ended.
    pub async fn suggestions(&self, count: Option<usize>) -> Result<Vec<String>, DispatchClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(DisplayRequest::Suggestions { count, reply }).await?;
        rx.await.map_err(|_| DispatchClosed)
    }

    /// Whether the dispatcher loop has ended
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create the dispatcher channel
#[must_use]
pub fn channel(capacity: usize) -> (DisplayHandle, mpsc::Receiver<DisplayRequest>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DisplayHandle { tx }, rx)
}

/// Owner of the display, the clock and the clue history
pub struct Dispatcher {
    state: DisplayState,
    timer: TimerEngine,
    history: ClueHistory,
    catalog: AssetCatalog,
    surfaces: SurfaceRegistry,
    tick_interval: Duration,
    default_suggestions: usize,
}

impl Dispatcher {
    /// Build a dispatcher from configuration, starting the clock now
    #[must_use]
    pub fn new(config: &DisplayConfig, history: ClueHistory, surfaces: SurfaceRegistry) -> Self {
        Self::with_clock(config, history, surfaces, now())
    }

    /// Build a dispatcher whose clock was last sampled at `now`
    #[must_use]
    pub fn with_clock(
        config: &DisplayConfig,
        history: ClueHistory,
        surfaces: SurfaceRegistry,
        now: Instant,
    ) -> Self {
        let timer = TimerEngine::new(now);
        Self {
            state: DisplayState::from_initial(&config.initial),
            timer,
            history,
            catalog: config.catalog.clone(),
            surfaces,
            tick_interval: config.tick_interval,
            default_suggestions: config.default_suggestions,
        }
    }

    /// Current display fields
    #[must_use]
    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// The clock
    #[must_use]
    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    /// The clue history
    #[must_use]
    pub fn history(&self) -> &ClueHistory {
        &self.history
    }

    /// Registry that receives published messages
    #[must_use]
    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    /// Full state message for newly started surfaces
    #[must_use]
    pub fn snapshot(&self) -> DisplayMessage {
        DisplayMessage::Snapshot {
            state: self.state.clone(),
            timer: TimerSnapshot::from(&self.timer),
        }
    }

    /// Apply one command using the current instant
    pub fn apply(&mut self, command: Command) -> Option<DisplayMessage> {
        self.apply_at(command, now())
    }

    /// Apply one command as of `now`
    ///
    /// Returns the delta to publish, or `None` when the command changed
    /// nothing (an empty layout).
    pub fn apply_at(&mut self, command: Command, now: Instant) -> Option<DisplayMessage> {
        tracing::debug!(command = command.name(), "Applying command");

        match command {
            Command::SetTimerSpeed(speed) => {
                self.timer.set_speed(speed, now);
                return Some(self.clock_message());
            }
            Command::SetTimerTime(adjust) => {
                self.timer.set_time(adjust, now);
                return Some(self.clock_message());
            }
            _ => {}
        }

        if !self.state.apply_command(&command) {
            tracing::debug!(command = command.name(), "Command left the display unchanged");
            return None;
        }

        let message = match command {
            Command::SetLayout(_) => DisplayMessage::Layout {
                regions: self.state.layout.clone(),
            },
            Command::SetAlignment(alignment) => DisplayMessage::Alignment { alignment },
            Command::SetColor(token) => {
                let rgba = self.catalog.resolve_color(&token);
                if rgba.is_none() {
                    tracing::warn!(token = %token, "Color is not in the palette");
                }
                DisplayMessage::Color { token, rgba }
            }
            Command::SetClue(text) => {
                if let Err(e) = self.history.add(text.clone()) {
                    tracing::error!(
                        error = %e,
                        retained = self.history.len(),
                        "Clue history not persisted; keeping it in memory"
                    );
                }
                DisplayMessage::Clue { text }
            }
            Command::SetImage(key) => {
                let path = key.as_deref().and_then(|k| self.lookup_image(k));
                DisplayMessage::Image { key, path }
            }
            Command::SetBackground(key) => {
                let path = self.catalog.resolve_background(&key).map(PathBuf::from);
                if path.is_none() {
                    tracing::warn!(token = %key, "Background is not in the catalog");
                }
                DisplayMessage::Background { key, path }
            }
            Command::SetPower(on) => DisplayMessage::Power { on },
            Command::SetTimerSpeed(_) | Command::SetTimerTime(_) => return None,
        };

        Some(message)
    }

    /// Advance the clock to `now` and return the clock message to publish
    pub fn tick_at(&mut self, now: Instant) -> DisplayMessage {
        self.timer.tick(now);
        tracing::trace!(clock = %self.timer.display(), "Timer tick");
        self.clock_message()
    }

    /// Ranked clues, `count` defaulting to the configured value
    #[must_use]
    pub fn suggestions(&self, count: Option<usize>) -> Vec<String> {
        self.history
            .suggestions(count.unwrap_or(self.default_suggestions))
    }

    /// Run the event loop until every [`DisplayHandle`] is dropped
    ///
    /// Publishes a snapshot first, then a delta for every applied command and
    /// a clock message on every tick. On exit all surface channels are closed so
    /// renderers see end-of-stream. Returns the dispatcher for inspection.
    pub async fn run(mut self, mut requests: mpsc::Receiver<DisplayRequest>) -> Self {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            surfaces = self.surfaces.count(),
            tick_ms = self.tick_interval.as_millis() as u64,
            history = self.history.len(),
            "Dispatcher started"
        );
        let snapshot = self.snapshot();
        self.publish(&snapshot).await;

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
                _ = ticker.tick() => {
                    let message = self.tick_at(now());
                    self.publish(&message).await;
                }
            }
        }

        tracing::info!(clock = %self.timer.display(), "Input closed, dispatcher stopping");
        self.surfaces.clear();
        self
    }

    async fn handle_request(&mut self, request: DisplayRequest) {
        match request {
            DisplayRequest::Apply(command) => {
                if let Some(message) = self.apply(command) {
                    self.publish(&message).await;
                }
            }
            DisplayRequest::Suggestions { count, reply } => {
                if reply.send(self.suggestions(count)).is_err() {
                    tracing::debug!("Suggestion requester went away before the reply");
                }
            }
        }
    }

    async fn publish(&self, message: &DisplayMessage) {
        let result = self.surfaces.broadcast_async(message).await;
        for id in &result.failed_ids {
            self.surfaces.unregister(id);
        }
        tracing::trace!(
            kind = message.kind(),
            delivered = result.successful,
            "Published display message"
        );
    }

    fn clock_message(&self) -> DisplayMessage {
        DisplayMessage::Timer(TimerSnapshot::from(&self.timer))
    }

    fn lookup_image(&self, key: &str) -> Option<PathBuf> {
        let path = self.catalog.resolve_image(key).map(PathBuf::from);
        if path.is_none() {
            tracing::warn!(token = %key, "Image is not in the catalog");
        }
        path
    }
}

/// Current instant on the runtime clock (honours paused test time)
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{parse_line, Alignment, Region, TimeAdjust};
    use crate::config::Rgba;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn dispatcher(dir: &TempDir) -> (Dispatcher, Instant) {
        let history = ClueHistory::empty(dir.path().join("clues.hist"), 8);
        let start = Instant::now();
        let d = Dispatcher::with_clock(
            &DisplayConfig::default(),
            history,
            SurfaceRegistry::new(),
            start,
        );
        (d, start)
    }

    fn apply_line(d: &mut Dispatcher, line: &str, at: Instant) -> Vec<DisplayMessage> {
        parse_line(line)
            .unwrap()
            .into_iter()
            .filter_map(|cmd| d.apply_at(cmd, at))
            .collect()
    }

    #[test]
    fn test_clue_updates_state_and_history() {
        let dir = TempDir::new().unwrap();
        let (mut d, start) = dispatcher(&dir);

        let messages = apply_line(&mut d, r"clue hello\nworld", start);
        assert_eq!(
            messages,
            vec![DisplayMessage::Clue {
                text: "hello\nworld".into()
            }]
        );
        assert_eq!(d.state().clue, "hello\nworld");
        assert_eq!(d.history().len(), 1);
    }

    #[test]
    fn test_duplicate_and_empty_clues_recorded() {
        let dir = TempDir::new().unwrap();
        let (mut d, start) = dispatcher(&dir);
        d.apply_at(Command::SetClue("same".into()), start);
        d.apply_at(Command::SetClue("same".into()), start);
        d.apply_at(Command::SetClue(String::new()), start);
        assert_eq!(d.history().len(), 3);
    }

    #[test]
    fn test_rejected_layout_keeps_previous() {
        let dir = TempDir::new().unwrap();
        let (mut d, start) = dispatcher(&dir);

        apply_line(&mut d, "layout clue timer", start);
        assert!(parse_line("layout badtoken").is_err());
        assert_eq!(d.state().layout, vec![Region::Clue, Region::Timer]);
    }

    #[test]
    fn test_empty_layout_publishes_nothing() {
        let dir = TempDir::new().unwrap();
        let (mut d, start) = dispatcher(&dir);
        assert!(d.apply_at(Command::SetLayout(vec![]), start).is_none());
    }

    #[test]
    fn test_color_resolution() {
        let dir = TempDir::new().unwrap();
        let (mut d, start) = dispatcher(&dir);

        let known = d.apply_at(Command::SetColor("red".into()), start);
        assert_eq!(
            known,
            Some(DisplayMessage::Color {
                token: "red".into(),
                rgba: Some(Rgba::new(255, 0, 0, 180)),
            })
        );

        let unknown = d.apply_at(Command::SetColor("ultraviolet".into()), start);
        assert_eq!(
            unknown,
            Some(DisplayMessage::Color {
                token: "ultraviolet".into(),
                rgba: None,
            })
        );
        assert_eq!(d.state().color, "ultraviolet");
    }

    #[test]
    fn test_image_none_hides() {
        let dir = TempDir::new().unwrap();
        let (mut d, start) = dispatcher(&dir);

        apply_line(&mut d, "image vessel", start);
        assert_eq!(d.state().image.as_deref(), Some("vessel"));

        let messages = apply_line(&mut d, "image none", start);
        assert_eq!(messages, vec![DisplayMessage::Image { key: None, path: None }]);
        assert!(d.state().image.is_none());
    }

    #[test]
    fn test_alignment_and_power() {
        let dir = TempDir::new().unwrap();
        let (mut d, start) = dispatcher(&dir);

        let messages = apply_line(&mut d, "alignment left", start);
        assert_eq!(
            messages,
            vec![DisplayMessage::Alignment {
                alignment: Alignment::Left
            }]
        );

        apply_line(&mut d, "power off", start);
        apply_line(&mut d, "clue X", start);
        apply_line(&mut d, "power on", start);
        assert_eq!(d.state().clue, "X");
        assert!(d.state().powered);
    }

    #[test]
    fn test_timer_command_sets_speed_and_time() {
        let dir = TempDir::new().unwrap();
        let (mut d, start) = dispatcher(&dir);

        let messages = apply_line(&mut d, "timer -1 3600", start);
        assert_eq!(messages.len(), 2);
        assert_eq!(d.timer().speed(), -1.0);
        assert_eq!(d.timer().seconds(), 3600.0);
        assert_eq!(d.timer().last_sample(), start);

        let later = start + Duration::from_secs(10);
        apply_line(&mut d, "timer -1 +60", later);
        assert!((d.timer().seconds() - 3650.0).abs() < 1e-9);
        assert_eq!(d.timer().last_sample(), later);
    }

    fn clock(message: &DisplayMessage) -> &str {
        match message {
            DisplayMessage::Timer(snapshot) => &snapshot.display,
            other => panic!("expected timer message, got {other:?}"),
        }
    }

    #[test]
    fn test_every_tick_publishes_clock() {
        let dir = TempDir::new().unwrap();
        let (mut d, start) = dispatcher(&dir);

        assert_eq!(clock(&d.tick_at(start + Duration::from_secs(5))), "00:00:00");

        let base = start + Duration::from_secs(5);
        d.apply_at(Command::SetTimerSpeed(1.0), base);
        let clocks: Vec<String> = (1..=10)
            .map(|step| clock(&d.tick_at(base + Duration::from_millis(step * 100))).to_string())
            .collect();

        assert_eq!(clocks.len(), 10);
        assert!(clocks[..9].iter().all(|c| c == "00:00:00"));
        assert_eq!(clocks[9], "00:00:01");
    }

    #[test]
    fn test_countdown_clamps_at_zero() {
        let dir = TempDir::new().unwrap();
        let (mut d, start) = dispatcher(&dir);

        d.apply_at(Command::SetTimerSpeed(-2.0), start);
        d.apply_at(Command::SetTimerTime(TimeAdjust::Absolute(3.0)), start);
        d.tick_at(start + Duration::from_secs(10));
        assert_eq!(d.timer().seconds(), 0.0);
        assert_eq!(d.timer().display(), "00:00:00");
    }

    #[test]
    fn test_suggestions_default_count() {
        let dir = TempDir::new().unwrap();
        let (mut d, start) = dispatcher(&dir);
        for clue in ["a", "b", "a"] {
            d.apply_at(Command::SetClue(clue.into()), start);
        }
        assert_eq!(d.suggestions(None), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(d.suggestions(Some(1)), vec!["a".to_string()]);
        assert!(d.suggestions(Some(0)).is_empty());
    }

    /// Next message that is not a clock update
    async fn next_delta(rx: &mut mpsc::Receiver<DisplayMessage>) -> Option<DisplayMessage> {
        loop {
            match rx.recv().await {
                Some(DisplayMessage::Timer(_)) => continue,
                other => return other,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_publishes_snapshot_then_deltas() {
        let dir = TempDir::new().unwrap();
        let surfaces = SurfaceRegistry::new();
        let (_id, mut surface) = surfaces.subscribe("test", 64);
        let history = ClueHistory::empty(dir.path().join("clues.hist"), 8);
        let d = Dispatcher::new(&DisplayConfig::default(), history, surfaces);

        let (handle, rx) = channel(16);
        let task = tokio::spawn(d.run(rx));

        handle.apply(Command::SetClue("first".into())).await.unwrap();
        assert_eq!(handle.suggestions(None).await.unwrap(), vec!["first".to_string()]);
        drop(handle);

        let finished = task.await.unwrap();
        assert_eq!(finished.state().clue, "first");

        assert!(matches!(
            next_delta(&mut surface).await,
            Some(DisplayMessage::Snapshot { .. })
        ));
        assert_eq!(
            next_delta(&mut surface).await,
            Some(DisplayMessage::Clue {
                text: "first".into()
            })
        );
        assert_eq!(next_delta(&mut surface).await, None);
    }

    #[tokio::test]
    async fn test_closed_surface_is_dropped() {
        let dir = TempDir::new().unwrap();
        let surfaces = SurfaceRegistry::new();
        let (_live, mut live) = surfaces.subscribe("live", 16);
        let (_gone, gone) = surfaces.subscribe("gone", 16);
        drop(gone);
        let history = ClueHistory::empty(dir.path().join("clues.hist"), 8);
        let d = Dispatcher::new(&DisplayConfig::default(), history, surfaces.clone());

        let (handle, rx) = channel(16);
        let task = tokio::spawn(d.run(rx));
        // the reply comes after the snapshot went out
        handle.suggestions(None).await.unwrap();
        assert_eq!(surfaces.count(), 1);

        handle.apply(Command::SetPower(true)).await.unwrap();
        drop(handle);
        task.await.unwrap();

        assert!(matches!(
            next_delta(&mut live).await,
            Some(DisplayMessage::Snapshot { .. })
        ));
        assert_eq!(next_delta(&mut live).await, Some(DisplayMessage::Power { on: true }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_clock() {
        let dir = TempDir::new().unwrap();
        let surfaces = SurfaceRegistry::new();
        let (_id, mut surface) = surfaces.subscribe("test", 64);
        let history = ClueHistory::empty(dir.path().join("clues.hist"), 8);
        let d = Dispatcher::new(&DisplayConfig::default(), history, surfaces);

        let (handle, rx) = channel(16);
        let task = tokio::spawn(d.run(rx));
        handle.apply(Command::SetTimerSpeed(1.0)).await.unwrap();

        let mut clocks: Vec<String> = Vec::new();
        let mut ticks = 0;
        while let Some(message) = surface.recv().await {
            if let DisplayMessage::Timer(snapshot) = message {
                ticks += 1;
                if clocks.last() != Some(&snapshot.display) {
                    clocks.push(snapshot.display);
                }
                if clocks.last().map(String::as_str) == Some("00:00:03") {
                    break;
                }
            }
        }
        drop(handle);
        task.await.unwrap();

        assert_eq!(clocks, vec!["00:00:00", "00:00:01", "00:00:02", "00:00:03"]);
        // the speed change plus roughly ten ticks per second
        assert!(ticks >= 30, "only {ticks} clock messages");
    }

    #[tokio::test]
    async fn test_handle_reports_closed_dispatcher() {
        let (handle, rx) = channel(1);
        drop(rx);
        assert!(handle.is_closed());
        assert_eq!(
            handle.apply(Command::SetPower(true)).await,
            Err(DispatchClosed)
        );
        assert_eq!(handle.suggestions(None).await, Err(DispatchClosed));
    }
}
