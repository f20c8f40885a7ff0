use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

/// Identifies a repeating timer registered with [`Scheduler::set_interval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

type Task = Box<dyn FnOnce()>;
type TimerCallback = Rc<RefCell<dyn FnMut()>>;

struct TimerEntry {
    id: TimerId,
    period_ms: u64,
    callback: TimerCallback,
}

/// Cooperative single-threaded executor with a virtual clock.
///
/// Tasks run in FIFO order; timers fire in deadline order. The clock starts
/// at zero and only moves inside [`Scheduler::advance`], so a test decides
/// exactly how much time passes between deliveries.
///
/// Handles are cheap clones of one shared state; everything stays on the
/// current thread.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerState>>,
}

struct SchedulerState {
    now_ms: u64,
    tasks: VecDeque<Task>,
    // Keyed by (deadline, registration order) so simultaneous timers fire
    // in the order they were registered.
    timers: BTreeMap<(u64, u64), TimerEntry>,
    next_timer: u64,
}

impl Scheduler {
    /// Create a scheduler with an empty queue and the clock at zero.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerState {
                now_ms: 0,
                tasks: VecDeque::new(),
                timers: BTreeMap::new(),
                next_timer: 0,
            })),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        Duration::from_millis(self.inner.borrow().now_ms)
    }

    /// Queue a task to run on the next [`Scheduler::run_until_idle`] pass.
    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        self.inner.borrow_mut().tasks.push_back(Box::new(task));
    }

    /// Register a repeating timer. The first tick fires `period` after the
    /// current virtual time.
    pub fn set_interval(&self, period: Duration, callback: impl FnMut() + 'static) -> TimerId {
        let mut state = self.inner.borrow_mut();
        let seq = state.next_timer;
        state.next_timer += 1;
        let id = TimerId(seq);
        // A zero period would pin `advance` at the same deadline forever.
        let period_ms = (period.as_millis() as u64).max(1);
        let deadline = state.now_ms + period_ms;
        state.timers.insert(
            (deadline, seq),
            TimerEntry {
                id,
                period_ms,
                callback: Rc::new(RefCell::new(callback)),
            },
        );
        id
    }

    /// Cancel a repeating timer. Unknown ids are a no-op.
    pub fn clear_interval(&self, id: TimerId) {
        self.inner.borrow_mut().timers.retain(|_, entry| entry.id != id);
    }

    /// Run queued tasks until the queue is empty, including tasks queued by
    /// the tasks themselves. Timers do not fire here.
    pub fn run_until_idle(&self) {
        loop {
            let task = self.inner.borrow_mut().tasks.pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Advance the virtual clock by `delta`, firing every timer tick that
    /// falls due and draining the task queue after each one.
    pub fn advance(&self, delta: Duration) {
        let target = self.inner.borrow().now_ms + delta.as_millis() as u64;
        self.run_until_idle();

        loop {
            let due = {
                let mut state = self.inner.borrow_mut();
                let key = state.timers.keys().next().copied();
                match key {
                    Some((deadline, seq)) if deadline <= target => {
                        state.timers.remove(&(deadline, seq)).map(|entry| {
                            state.now_ms = deadline;
                            let callback = Rc::clone(&entry.callback);
                            let next = deadline + entry.period_ms;
                            state.timers.insert((next, seq), entry);
                            callback
                        })
                    }
                    _ => None,
                }
            };

            match due {
                Some(callback) => {
                    (callback.borrow_mut())();
                    self.run_until_idle();
                }
                None => break,
            }
        }

        self.inner.borrow_mut().now_ms = target;
    }

    /// True when no tasks are queued.
    pub fn is_idle(&self) -> bool {
        self.inner.borrow().tasks.is_empty()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("now_ms", &state.now_ms)
            .field("tasks", &state.tasks.len())
            .field("timers", &state.timers.len())
            .finish()
    }
}
