// Reconnect backoff for the Jetstream subscription.
//
// Exponential with jitter: delays start around one second and double
// after each consecutive failure up to the configured cap. A successful
// connection rebuilds the sequence from the start.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

const INITIAL_DELAY: Duration = Duration::from_secs(1);

pub struct Backoff {
    builder: ExponentialBuilder,
    iter: ExponentialBackoff,
    max_delay: Duration,
}

impl Backoff {
    pub fn new(max_delay: Duration) -> Self {
        let max_delay = max_delay.max(INITIAL_DELAY);
        let builder = ExponentialBuilder::default()
            .with_min_delay(INITIAL_DELAY)
            .with_max_delay(max_delay)
            .with_jitter()
            .without_max_times();

        Self {
            iter: builder.build(),
            builder,
            max_delay,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.iter.next().unwrap_or(self.max_delay)
    }

    /// Forget previous failures after a successful connect.
    pub fn reset(&mut self) {
        self.iter = self.builder.build();
    }
}
