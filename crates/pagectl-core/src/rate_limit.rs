//! Throttle and debounce primitives.
//!
//! Every limiter is an explicit object owning its timer state. Time is passed
//! in by the host, which keeps the limiters deterministic under test and lets
//! one event loop drive all of them.
//!
//! `ThrottleGate` and `DebounceTimer` only decide *when* work may run, for
//! callers that need to run it with borrowed context. `Throttle` and
//! `Debounce` additionally own the wrapped function.

use std::time::Duration;

use web_time::Instant;

/// Leading-edge throttle window
#[derive(Debug, Clone)]
pub struct ThrottleGate {
    interval: Duration,
    last_run: Option<Instant>,
}

impl ThrottleGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a call at `now` falls inside the window of the last execution
    pub fn is_open(&self, now: Instant) -> bool {
        self.last_run
            .is_some_and(|last| now.saturating_duration_since(last) < self.interval)
    }

    /// Returns true when the caller may run now; opens a new window if so
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.is_open(now) {
            return false;
        }
        self.last_run = Some(now);
        true
    }

    /// Close the current window so the next call runs
    pub fn cancel(&mut self) {
        self.last_run = None;
    }
}

/// Trailing (or leading, with `immediate`) debounce timer carrying the
/// arguments of the most recent call.
///
/// Hosts must `poll` elapsed deadlines before delivering a new `call`.
#[derive(Debug, Clone)]
pub struct DebounceTimer<A> {
    wait: Duration,
    immediate: bool,
    deadline: Option<Instant>,
    pending: Option<A>,
}

impl<A> DebounceTimer<A> {
    pub fn new(wait: Duration, immediate: bool) -> Self {
        Self {
            wait,
            immediate,
            deadline: None,
            pending: None,
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// When the timer next needs a `poll`
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Register a call. Returns the arguments to run synchronously, which only
    /// happens in immediate mode on the first call of an idle period.
    pub fn call(&mut self, now: Instant, args: A) -> Option<A> {
        let idle = self.deadline.map_or(true, |deadline| now >= deadline);
        self.deadline = Some(now + self.wait);

        if self.immediate {
            self.pending = None;
            if idle {
                return Some(args);
            }
            None
        } else {
            self.pending = Some(args);
            None
        }
    }

    /// Fire the trailing execution once the quiet period has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<A> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Drop the pending execution and end the idle period
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = None;
    }

    /// Take the pending execution right away
    pub fn flush(&mut self) -> Option<A> {
        self.deadline = None;
        self.pending.take()
    }
}

/// `throttle(fn, interval)`: runs on the leading edge, then at most once per
/// window. Calls inside the window are dropped, not queued.
pub struct Throttle<F> {
    func: F,
    gate: ThrottleGate,
}

impl<F> Throttle<F> {
    pub fn new(func: F, interval: Duration) -> Self {
        Self {
            func,
            gate: ThrottleGate::new(interval),
        }
    }

    /// Returns true when the wrapped function ran
    pub fn call<A>(&mut self, now: Instant, args: A) -> bool
    where
        F: FnMut(A),
    {
        if !self.gate.try_acquire(now) {
            return false;
        }
        (self.func)(args);
        true
    }

    pub fn cancel(&mut self) {
        self.gate.cancel();
    }
}

pub fn throttle<F>(func: F, interval: Duration) -> Throttle<F> {
    Throttle::new(func, interval)
}

/// `debounce(fn, wait, immediate)`: runs once after `wait` of quiet with the
/// last call's arguments, or on the leading edge in immediate mode.
pub struct Debounce<F, A> {
    func: F,
    timer: DebounceTimer<A>,
}

impl<F, A> Debounce<F, A>
where
    F: FnMut(A),
{
    pub fn new(func: F, wait: Duration, immediate: bool) -> Self {
        Self {
            func,
            timer: DebounceTimer::new(wait, immediate),
        }
    }

    pub fn call(&mut self, now: Instant, args: A) {
        self.poll(now);
        if let Some(args) = self.timer.call(now, args) {
            (self.func)(args);
        }
    }

    /// Run the trailing execution if its deadline passed. Returns true if it ran.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.timer.poll(now) {
            Some(args) => {
                (self.func)(args);
                true
            }
            None => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    /// Run the pending execution now, if any
    pub fn flush(&mut self) -> bool {
        match self.timer.flush() {
            Some(args) => {
                (self.func)(args);
                true
            }
            None => false,
        }
    }
}

pub fn debounce<F, A>(func: F, wait: Duration, immediate: bool) -> Debounce<F, A>
where
    F: FnMut(A),
{
    Debounce::new(func, wait, immediate)
}
