use super::action::{ActionList, Condition};

/// When a suspended task may continue.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Wake {
    /// Session time in seconds.
    AtTime(f64),
    /// Frame counter value; used by the loop yield.
    AtFrame(u64),
}

#[derive(Clone, Debug)]
pub(crate) enum Frame {
    Sequence {
        actions: ActionList,
        pc: usize,
        /// Body of a `call_func`; counts toward the call depth.
        call: bool,
    },
    Repeat {
        body: ActionList,
        times: u64,
        done: u64,
        yielded_at: u64,
    },
    RepeatWhile {
        cond: Condition,
        body: ActionList,
        done: u64,
        yielded_at: u64,
    },
}

impl Frame {
    pub fn sequence(actions: ActionList) -> Self {
        Self::Sequence {
            actions,
            pc: 0,
            call: false,
        }
    }
}

/// One independently-triggered action list and its explicit continuation stack.
#[derive(Clone, Debug)]
pub struct Task {
    pub id: u64,
    pub origin: String,
    pub(crate) frames: Vec<Frame>,
    pub wake: Option<Wake>,
}

impl Task {
    pub(crate) fn new(id: u64, origin: String, actions: ActionList) -> Self {
        Self {
            id,
            origin,
            frames: vec![Frame::sequence(actions)],
            wake: None,
        }
    }

    pub fn call_depth(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| matches!(f, Frame::Sequence { call: true, .. }))
            .count()
    }

    pub fn is_due(&self, clock: f64, frame: u64) -> bool {
        match self.wake {
            None => true,
            Some(Wake::AtTime(t)) => clock >= t,
            Some(Wake::AtFrame(f)) => frame >= f,
        }
    }
}

/// Loop bookkeeping shared by `repeat_n` and `repeat_while`: returns true when
/// the loop should hand control back before starting iteration `done + 1`.
pub(crate) fn should_yield(done: u64, yielded_at: &mut u64, interval: u64) -> bool {
    if interval == 0 || done == 0 || done % interval != 0 || *yielded_at == done {
        return false;
    }
    *yielded_at = done;
    true
}

pub(crate) enum StepOutcome {
    Continue,
    Suspend(Wake),
}

pub(crate) enum TaskState {
    Finished,
    Suspended,
}
