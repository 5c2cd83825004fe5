use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::model::RefreshRate;

pub const TICK: Duration = Duration::from_secs(1);

pub fn label(remaining: u64) -> String {
    format!("⏳ Refreshing in {remaining} seconds...")
}

/// Values shown before a refresh: `rate, rate - 1, ..., 1`.
pub fn sequence(rate: RefreshRate) -> impl Iterator<Item = u64> {
    (1..=rate.secs()).rev()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Show this many seconds remaining.
    Show(u64),
    /// The last second has passed; run the next cycle.
    Elapsed,
}

/// Countdown state advanced once per second by the caller's timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u64,
}

impl Countdown {
    pub fn start(rate: RefreshRate) -> Self {
        Self {
            remaining: rate.secs(),
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn label(&self) -> String {
        label(self.remaining)
    }

    /// Consume one second.
    pub fn tick(&mut self) -> Step {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            Step::Elapsed
        } else {
            Step::Show(self.remaining)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Elapsed,
    Cancelled,
}

/// Show each countdown value one second apart without blocking the runtime,
/// then wait out the final second. Returns early if `cancel` fires.
pub async fn run(
    rate: RefreshRate,
    cancel: &CancellationToken,
    mut on_tick: impl FnMut(u64),
) -> Outcome {
    let mut ticker = interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for remaining in sequence(rate) {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Cancelled,
            _ = ticker.tick() => on_tick(remaining),
        }
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Outcome::Cancelled,
        _ = ticker.tick() => Outcome::Elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn rate(secs: u64) -> RefreshRate {
        RefreshRate::new(secs).unwrap()
    }

    #[test]
    fn sequence_counts_down_to_one() {
        assert_eq!(sequence(rate(5)).collect::<Vec<_>>(), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn state_steps_through_all_values() {
        let mut countdown = Countdown::start(rate(5));
        let mut shown = vec![countdown.remaining()];
        loop {
            match countdown.tick() {
                Step::Show(n) => shown.push(n),
                Step::Elapsed => break,
            }
        }
        assert_eq!(shown, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn label_text() {
        assert_eq!(label(3), "⏳ Refreshing in 3 seconds...");
    }

    #[tokio::test(start_paused = true)]
    async fn run_emits_one_value_per_second_then_elapses() {
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let mut seen = Vec::new();
        let outcome = run(rate(5), &cancel, |n| {
            seen.push((n, started.elapsed().as_secs()));
        })
        .await;
        assert_eq!(outcome, Outcome::Elapsed);
        assert_eq!(seen, vec![(5, 0), (4, 1), (3, 2), (2, 3), (1, 4)]);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            trigger.cancel();
        });
        let mut seen = Vec::new();
        let outcome = run(rate(10), &cancel, |n| seen.push(n)).await;
        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(seen, vec![10, 9, 8]);
    }
}
