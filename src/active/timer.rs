//! Time-event facility.
//!
//! Realises N independent logical countdown timers on one real periodic
//! tick: every registered [`TimeEvent`] with a nonzero countdown is
//! decremented once per tick, and on reaching zero its event is posted to
//! the owning active object. A nonzero reload value rearms the countdown
//! (periodic); zero leaves it disarmed (one-shot). The table scan is O(N)
//! per tick, acceptable because N is small and fixed.
//!
//! The slot table is a single bounded registry owned by the
//! [`TimerService`] and shared with the tick source; registration happens
//! once per time event during start-up, before the first arm. Countdown
//! and reload fields are written from both arming threads and the tick
//! source, so every access goes through the table mutex — the one lock in
//! the system.
//!
//! [`Periodic`] is the second, simpler timer kind: a fixed-rate ticker
//! that posts the same event every period while started, standing in for
//! the control-rate hardware timer the PID loop runs from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{trace, warn};

use crate::active::Mailbox;
use crate::error::PostError;

/// Capacity of the time-event table. Exceeding it at registration is a
/// programming error, not a runtime condition.
pub const MAX_TIME_EVENTS: usize = 10;

// ---------------------------------------------------------------------------
// Slot table
// ---------------------------------------------------------------------------

/// One registered time event. The post closure type-erases the owner's
/// event enum so a single table serves every active object in the system.
struct TimerSlot {
    /// Remaining ticks; 0 means disarmed.
    countdown: u32,
    /// Rearm value on expiry; 0 means one-shot.
    reload: u32,
    post: Box<dyn Fn() -> Result<(), PostError> + Send>,
}

struct TimerInner {
    slots: Mutex<heapless::Vec<TimerSlot, MAX_TIME_EVENTS>>,
    /// `None` for manually ticked services (tests, deterministic sims).
    tick_period: Option<Duration>,
    ticker_started: AtomicBool,
}

impl TimerInner {
    /// One tick: scan the table under the lock.
    fn tick(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        for (i, slot) in slots.iter_mut().enumerate() {
            if slot.countdown == 0 {
                continue;
            }
            slot.countdown -= 1;
            if slot.countdown == 0 {
                trace!("TIMER: slot {i} expired");
                match (slot.post)() {
                    Ok(()) => {}
                    Err(PostError::QueueFull) => {
                        warn!("TIMER: slot {i} expiry dropped, owner queue full");
                    }
                    Err(PostError::Closed) => {
                        warn!("TIMER: slot {i} expiry dropped, owner gone");
                    }
                }
                slot.countdown = slot.reload;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TimerService
// ---------------------------------------------------------------------------

/// Owner of the time-event table and the single tick source.
///
/// Constructed once at start-up and handed (by clone) to every module that
/// registers a time event.
#[derive(Clone)]
pub struct TimerService {
    inner: Arc<TimerInner>,
}

impl TimerService {
    /// Service whose tick source runs in a background thread at
    /// `tick_period`. The thread is started lazily on the first-ever arm
    /// across all time events.
    pub fn new(tick_period: Duration) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                slots: Mutex::new(heapless::Vec::new()),
                tick_period: Some(tick_period),
                ticker_started: AtomicBool::new(false),
            }),
        }
    }

    /// Service with no background tick source; the owner drives [`tick`]
    /// directly. Used by tests and the deterministic simulator.
    ///
    /// [`tick`]: TimerService::tick
    pub fn manual() -> Self {
        Self {
            inner: Arc::new(TimerInner {
                slots: Mutex::new(heapless::Vec::new()),
                tick_period: None,
                ticker_started: AtomicBool::new(false),
            }),
        }
    }

    /// Register a time event: `event` will be posted to `owner` whenever
    /// the countdown expires. The slot starts disarmed.
    ///
    /// Registration is meant to happen before multitasking starts (before
    /// any arm). A full table halts the system: the capacity is a
    /// compile-time sizing decision, never a runtime condition.
    pub fn register<E>(&self, event: E, owner: Mailbox<E>) -> TimeEvent
    where
        E: Clone + Send + 'static,
    {
        let mut slots = self.inner.slots.lock().unwrap_or_else(|e| e.into_inner());
        let index = slots.len();
        let slot = TimerSlot {
            countdown: 0,
            reload: 0,
            post: Box::new(move || owner.post(event.clone())),
        };
        assert!(
            slots.push(slot).is_ok(),
            "time-event table full ({MAX_TIME_EVENTS} slots)"
        );
        drop(slots);
        TimeEvent {
            inner: Arc::clone(&self.inner),
            index,
        }
    }

    /// Run one tick scan. Normally invoked by the background tick source;
    /// public so tests and the simulator can drive time deterministically.
    pub fn tick(&self) {
        self.inner.tick();
    }
}

// ---------------------------------------------------------------------------
// TimeEvent handle
// ---------------------------------------------------------------------------

/// Handle to one registered slot in the time-event table.
pub struct TimeEvent {
    inner: Arc<TimerInner>,
    index: usize,
}

impl TimeEvent {
    /// Arm the countdown: post after `timeout` ticks, then rearm every
    /// `reload` ticks (0 for one-shot).
    ///
    /// Starts the shared tick source if this is the first-ever arm.
    pub fn arm(&self, timeout: u32, reload: u32) {
        trace!(
            "TIMER: arming slot {} for {timeout} ticks ({})",
            self.index,
            if reload == 0 { "one-shot" } else { "periodic" }
        );
        {
            let mut slots = self.inner.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots[self.index].countdown = timeout;
            slots[self.index].reload = reload;
        }
        self.ensure_ticker();
    }

    /// Disarm: the countdown stops and no event is posted.
    pub fn disarm(&self) {
        trace!("TIMER: disarming slot {}", self.index);
        let mut slots = self.inner.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots[self.index].countdown = 0;
    }

    /// Whether the countdown is currently running.
    pub fn is_armed(&self) -> bool {
        let slots = self.inner.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots[self.index].countdown != 0
    }

    /// Lazily start the single background tick thread, shared by every
    /// time event in the program.
    fn ensure_ticker(&self) {
        let Some(period) = self.inner.tick_period else {
            return; // Manually ticked service.
        };
        if self.inner.ticker_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name("time-event-tick".into())
            .spawn(move || {
                loop {
                    thread::sleep(period);
                    inner.tick();
                }
            })
            .unwrap_or_else(|e| panic!("failed to spawn time-event tick thread: {e}"));
    }
}

// ---------------------------------------------------------------------------
// Periodic control-rate timer
// ---------------------------------------------------------------------------

/// Fixed-rate timer posting the same event to one owner every period while
/// started.
///
/// The backing thread is created once at construction; `start`/`stop` gate
/// it through an atomic flag, mirroring a hardware timer that is
/// enabled/disabled at will but allocated once.
pub struct Periodic {
    running: Arc<AtomicBool>,
}

impl Periodic {
    pub fn spawn<E>(name: &'static str, period: Duration, owner: Mailbox<E>, event: E) -> Self
    where
        E: Clone + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(false));
        let gate = Arc::clone(&running);
        thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                loop {
                    thread::sleep(period);
                    if !gate.load(Ordering::Relaxed) {
                        continue;
                    }
                    match owner.post(event.clone()) {
                        Ok(()) => {}
                        Err(PostError::QueueFull) => {
                            // The owner will see the next tick; dropping one
                            // is the documented queue-full policy.
                            warn!("TIMER: {name} tick dropped, owner queue full");
                        }
                        Err(PostError::Closed) => break,
                    }
                }
            })
            .unwrap_or_else(|e| panic!("failed to spawn periodic timer '{name}': {e}"));
        Self { running }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::queue;

    #[test]
    fn one_shot_posts_exactly_once() {
        let timers = TimerService::manual();
        let (mailbox, inbox) = queue::<u32>(4);
        let te = timers.register(42, mailbox);

        te.arm(5, 0);
        for _ in 0..4 {
            timers.tick();
        }
        assert_eq!(inbox.try_recv(), None, "must not fire before the fifth tick");

        timers.tick();
        assert_eq!(inbox.try_recv(), Some(42));
        assert!(!te.is_armed(), "one-shot stays disarmed after expiry");

        for _ in 0..10 {
            timers.tick();
        }
        assert_eq!(inbox.try_recv(), None, "one-shot must not fire again");
    }

    #[test]
    fn periodic_reload_fires_every_interval_until_disarmed() {
        let timers = TimerService::manual();
        let (mailbox, inbox) = queue::<u32>(8);
        let te = timers.register(7, mailbox);

        te.arm(3, 3);
        let mut fired = 0;
        for _ in 0..9 {
            timers.tick();
            while inbox.try_recv().is_some() {
                fired += 1;
            }
        }
        assert_eq!(fired, 3, "expected fires at ticks 3, 6 and 9");
        assert!(te.is_armed(), "periodic event stays armed");

        te.disarm();
        for _ in 0..9 {
            timers.tick();
        }
        assert_eq!(inbox.try_recv(), None, "disarmed event must not fire");
    }

    #[test]
    fn timers_count_down_independently() {
        let timers = TimerService::manual();
        let (mailbox_a, inbox_a) = queue::<&'static str>(4);
        let (mailbox_b, inbox_b) = queue::<&'static str>(4);
        let a = timers.register("a", mailbox_a);
        let b = timers.register("b", mailbox_b);

        a.arm(2, 0);
        b.arm(4, 0);

        timers.tick();
        timers.tick();
        assert_eq!(inbox_a.try_recv(), Some("a"));
        assert_eq!(inbox_b.try_recv(), None);

        timers.tick();
        timers.tick();
        assert_eq!(inbox_b.try_recv(), Some("b"));
    }

    #[test]
    fn rearm_overrides_previous_countdown() {
        let timers = TimerService::manual();
        let (mailbox, inbox) = queue::<u32>(4);
        let te = timers.register(1, mailbox);

        te.arm(10, 0);
        timers.tick();
        te.arm(2, 0); // Restart with a shorter timeout.
        timers.tick();
        timers.tick();
        assert_eq!(inbox.try_recv(), Some(1));
    }

    #[test]
    fn expiry_with_full_owner_queue_is_dropped_not_stuck() {
        let timers = TimerService::manual();
        let (mailbox, inbox) = queue::<u32>(1);
        let te = timers.register(9, mailbox.clone());

        mailbox.post(99).unwrap(); // Fill the queue.
        te.arm(1, 0);
        timers.tick(); // Expiry cannot be enqueued.

        assert_eq!(inbox.try_recv(), Some(99));
        assert_eq!(inbox.try_recv(), None, "dropped expiry must not appear later");
        assert!(!te.is_armed());
    }

    #[test]
    #[should_panic(expected = "time-event table full")]
    fn registration_beyond_capacity_is_fatal() {
        let timers = TimerService::manual();
        let (mailbox, _inbox) = queue::<u32>(1);
        for i in 0..=MAX_TIME_EVENTS as u32 {
            let _ = timers.register(i, mailbox.clone());
        }
    }

    #[test]
    fn periodic_timer_gates_on_start_stop() {
        let (mailbox, inbox) = queue::<u8>(64);
        let periodic = Periodic::spawn("test-periodic", Duration::from_millis(5), mailbox, 1);

        // Not started: nothing posts.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(inbox.try_recv(), None);
        assert!(!periodic.is_running());

        periodic.start();
        thread::sleep(Duration::from_millis(100));
        assert!(inbox.try_recv().is_some(), "started timer must tick");

        periodic.stop();
        thread::sleep(Duration::from_millis(20));
        while inbox.try_recv().is_some() {} // Drain in-flight ticks.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(inbox.try_recv(), None, "stopped timer must not tick");
    }
}
