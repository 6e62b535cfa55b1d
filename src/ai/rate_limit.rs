use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

/// Fixed-capacity token bucket refilled by whole tokens per elapsed minute.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    refill_per_minute: u32,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    /// Starts full.
    pub fn new(capacity: u32, refill_per_minute: u32) -> Self {
        Self::starting_at(capacity, refill_per_minute, Instant::now())
    }

    fn starting_at(capacity: u32, refill_per_minute: u32, now: Instant) -> Self {
        Self {
            capacity,
            refill_per_minute,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut state, now);
        if state.tokens == 0 {
            return false;
        }
        state.tokens -= 1;
        true
    }

    /// `tokens = min(capacity, tokens + floor(elapsed_minutes * rate))`.
    /// The refill clock only advances once a whole token has been added.
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        let earned = refill_amount(elapsed, self.refill_per_minute);
        if earned >= 1.0 {
            let room = f64::from(self.capacity - state.tokens.min(self.capacity));
            state.tokens += earned.min(room) as u32;
            state.last_refill = now;
        }
    }

    #[cfg(test)]
    fn available_at(&self, now: Instant) -> u32 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut state, now);
        state.tokens
    }
}

fn refill_amount(elapsed: Duration, per_minute: u32) -> f64 {
    (elapsed.as_secs_f64() / 60.0 * f64::from(per_minute)).floor()
}
