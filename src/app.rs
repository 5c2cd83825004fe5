use std::io;
use std::sync::Arc;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use error_stack::{Report, ResultExt};
use futures::{Stream, StreamExt};
use ratatui::backend::Backend;
use ratatui::{DefaultTerminal, Terminal};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::countdown::{self, Countdown, Step};
use crate::cycle::{CycleOutcome, CyclePhase, CycleParams, run_cycle};
use crate::error::UiError;
use crate::model::{RefreshRate, normalize_ticker};
use crate::provider::MarketData;
use crate::report::Reporter;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Abandon the current countdown or fetch and start a new cycle now.
    Refresh,
    Quit,
}

/// Interactive session state. Each cycle's data lives only in `outcome`
/// and is replaced wholesale by the next cycle.
#[derive(Debug)]
pub struct App {
    params: CycleParams,
    phase: CyclePhase,
    outcome: Option<CycleOutcome>,
    countdown: Option<Countdown>,
    input: Option<String>,
}

impl App {
    pub fn new(params: CycleParams) -> Self {
        Self {
            params,
            phase: CyclePhase::Idle,
            outcome: None,
            countdown: None,
            input: None,
        }
    }

    pub fn params(&self) -> &CycleParams {
        &self.params
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn outcome(&self) -> Option<&CycleOutcome> {
        self.outcome.as_ref()
    }

    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    /// Ticker being typed, if the symbol prompt is open.
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn begin_cycle(&mut self) {
        self.phase = CyclePhase::Fetching;
        self.countdown = None;
    }

    /// Record a finished cycle and start counting down to the next one.
    /// Warnings and errors count down too, so the loop never stalls.
    pub fn finish_cycle(&mut self, outcome: CycleOutcome) {
        debug!(ticker = %self.params.ticker, ended_in = %outcome.phase(), "cycle finished");
        self.outcome = Some(outcome);
        self.phase = CyclePhase::CountingDown;
        self.countdown = Some(Countdown::start(self.params.refresh));
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> Action {
        let Some(countdown) = self.countdown.as_mut() else {
            return Action::None;
        };
        match countdown.tick() {
            Step::Show(_) => Action::None,
            Step::Elapsed => {
                self.countdown = None;
                self.phase = CyclePhase::Idle;
                Action::Refresh
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }
        if self.input.is_some() {
            return self.handle_input_key(key);
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('t') => {
                self.input = Some(String::new());
                Action::None
            }
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Char('+' | '=') => self.set_refresh(self.params.refresh.increment()),
            KeyCode::Char('-') => self.set_refresh(self.params.refresh.decrement()),
            _ => Action::None,
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Action {
        let Some(buffer) = self.input.as_mut() else {
            return Action::None;
        };
        match key.code {
            KeyCode::Char(c) => {
                buffer.push(c);
                Action::None
            }
            KeyCode::Backspace => {
                buffer.pop();
                Action::None
            }
            KeyCode::Esc => {
                self.input = None;
                Action::None
            }
            KeyCode::Enter => {
                let entered = self.input.take().and_then(|raw| normalize_ticker(&raw));
                match entered {
                    Some(ticker) if ticker != self.params.ticker => {
                        info!(from = %self.params.ticker, to = %ticker, "ticker changed");
                        self.params.ticker = ticker;
                        self.outcome = None;
                        Action::Refresh
                    }
                    _ => Action::None,
                }
            }
            _ => Action::None,
        }
    }

    fn set_refresh(&mut self, refresh: RefreshRate) -> Action {
        if refresh == self.params.refresh {
            return Action::None;
        }
        info!(from = %self.params.refresh, to = %refresh, "refresh rate changed");
        self.params.refresh = refresh;
        Action::Refresh
    }
}

/// Raw mode plus alternate screen. Also installs a panic hook that puts the
/// terminal back before the panic message is printed.
fn setup_terminal() -> Result<DefaultTerminal, Report<UiError>> {
    ratatui::try_init().change_context(UiError::Terminal)
}

fn restore_terminal(terminal: &mut DefaultTerminal) -> Result<(), Report<UiError>> {
    terminal.show_cursor().change_context(UiError::Terminal)?;
    ratatui::try_restore().change_context(UiError::Terminal)
}

/// Run the interactive dashboard until the user quits.
pub async fn run_tui(
    provider: Arc<dyn MarketData>,
    params: CycleParams,
) -> Result<(), Report<UiError>> {
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, EventStream::new(), provider, params).await;
    let restored = restore_terminal(&mut terminal);
    session_result(result, restored)
}

/// The event loop's own error wins; a restore failure behind it is logged.
fn session_result(
    result: Result<(), Report<UiError>>,
    restored: Result<(), Report<UiError>>,
) -> Result<(), Report<UiError>> {
    if let (Err(_), Err(e)) = (&result, &restored) {
        warn!(error = ?e, "failed to restore terminal");
    }
    result.and(restored)
}

fn spawn_cycle(provider: &Arc<dyn MarketData>, params: &CycleParams) -> JoinHandle<CycleOutcome> {
    let provider = Arc::clone(provider);
    let params = params.clone();
    tokio::spawn(async move { run_cycle(provider.as_ref(), &params).await })
}

async fn join_fetch(
    fetch: &mut Option<JoinHandle<CycleOutcome>>,
) -> Result<CycleOutcome, JoinError> {
    match fetch {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn event_loop<B, S>(
    terminal: &mut Terminal<B>,
    mut events: S,
    provider: Arc<dyn MarketData>,
    params: CycleParams,
) -> Result<(), Report<UiError>>
where
    B: Backend,
    S: Stream<Item = io::Result<Event>> + Unpin,
{
    let mut app = App::new(params);
    let mut ticker = interval(countdown::TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    app.begin_cycle();
    let mut fetch = Some(spawn_cycle(&provider, app.params()));

    loop {
        terminal
            .draw(|f| ui::draw(f, &app))
            .change_context(UiError::Draw)?;

        let action = tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Some(Ok(_)) => Action::None,
                Some(Err(e)) => return Err(Report::new(e).change_context(UiError::Input)),
                None => Action::Quit,
            },
            joined = join_fetch(&mut fetch) => {
                fetch = None;
                let outcome = joined.unwrap_or_else(|e| CycleOutcome::Failed {
                    message: format!("Error: {e}"),
                });
                app.finish_cycle(outcome);
                ticker.reset();
                Action::None
            }
            _ = ticker.tick(), if app.countdown().is_some() => app.tick(),
        };

        match action {
            Action::None => {}
            Action::Quit => break,
            Action::Refresh => {
                if let Some(stale) = fetch.take() {
                    debug!("abandoning in-flight fetch");
                    stale.abort();
                }
                app.begin_cycle();
                fetch = Some(spawn_cycle(&provider, app.params()));
            }
        }
    }

    if let Some(stale) = fetch.take() {
        stale.abort();
    }
    info!("dashboard closed");
    Ok(())
}

/// Run cycles without a screen, handing each result to `reporter`.
///
/// Stops after the first cycle when `once` is set, otherwise when `cancel` fires.
pub async fn run_headless(
    provider: &dyn MarketData,
    params: &CycleParams,
    reporter: &dyn Reporter,
    cancel: &CancellationToken,
    once: bool,
) {
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = run_cycle(provider, params) => outcome,
        };
        reporter.report(params, &outcome);
        if once {
            break;
        }
        let finished = countdown::run(params.refresh, cancel, |n| reporter.countdown(n)).await;
        if finished == countdown::Outcome::Cancelled {
            break;
        }
    }
    info!("headless run finished");
}
