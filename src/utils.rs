use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Spreads `delay` by a random factor in `[1 - ratio, 1 + ratio]`. The result
/// never exceeds `max_delay` unless `delay` itself already did.
pub fn jittered(delay: Duration, ratio: f64, max_delay: Duration) -> Duration {
    if ratio <= 0.0 || delay.is_zero() {
        return delay;
    }

    let jitter = rand::random_range(-ratio..=ratio);
    let seconds = (delay.as_secs_f64() * (1.0 + jitter)).max(0.0);

    Duration::from_secs_f64(seconds).min(max_delay.max(delay))
}

pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_jitter_keeps_delay() {
        let delay = Duration::from_secs(7);
        assert_eq!(jittered(delay, 0.0, Duration::from_secs(60)), delay);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let delay = Duration::from_secs(10);
        for _ in 0..200 {
            let value = jittered(delay, 0.1, Duration::from_secs(60));
            assert!(value >= Duration::from_millis(8_999), "{:?} below bound", value);
            assert!(value <= Duration::from_millis(11_001), "{:?} above bound", value);
        }
    }

    #[test]
    fn jitter_respects_cap() {
        let delay = Duration::from_secs(60);
        for _ in 0..200 {
            assert!(jittered(delay, 0.5, Duration::from_secs(60)) <= Duration::from_secs(60));
        }
    }
}
