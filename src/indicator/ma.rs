use std::num::NonZeroUsize;

use crate::indicator::Indicator;

/// Simple Moving Average.
pub struct Sma {
    period: NonZeroUsize,
}

impl Sma {
    pub const fn new(period: NonZeroUsize) -> Self {
        Self { period }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        "sma"
    }

    fn column(&self) -> String {
        format!("SMA{}", self.period)
    }

    fn calculate(&self, prices: &[f64]) -> Vec<Option<f64>> {
        let period = self.period.get();
        let mut output = vec![None; prices.len()];
        if prices.len() < period {
            return output;
        }
        for (end, window) in (period - 1..).zip(prices.windows(period)) {
            output[end] = Some(window.iter().sum::<f64>() / period as f64);
        }
        output
    }
}

/// Exponential Moving Average seeded with the first price, so every row
/// has a value (no warm-up gap).
pub struct Ema {
    period: NonZeroUsize,
}

impl Ema {
    pub const fn new(period: NonZeroUsize) -> Self {
        Self { period }
    }

    fn alpha(&self) -> f64 {
        2.0 / (self.period.get() as f64 + 1.0)
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        "ema"
    }

    fn column(&self) -> String {
        format!("EMA{}", self.period)
    }

    fn calculate(&self, prices: &[f64]) -> Vec<Option<f64>> {
        let k = self.alpha();
        let mut prev: Option<f64> = None;
        prices
            .iter()
            .map(|&price| {
                let ema = match prev {
                    None => price,
                    Some(p) => price * k + p * (1.0 - k),
                };
                prev = Some(ema);
                Some(ema)
            })
            .collect()
    }
}
