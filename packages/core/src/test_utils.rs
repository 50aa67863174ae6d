use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use crate::error::{Error, Result};
use crate::executor::{CommandOutcome, CommandRunner, CommandSpec};
use crate::scrobble::{ScrobbleEvent, Scrobbler};

/// Runner that records every command and answers with scripted exit codes.
///
/// Programs without a scripted code exit 0.
#[derive(Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<CommandSpec>>,
    codes: RefCell<HashMap<String, VecDeque<i32>>>,
    hook: Option<Box<dyn Fn(&CommandSpec)>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `code` as the next exit code for `program`.
    pub fn exit_with(self, program: &str, code: i32) -> Self {
        self.codes
            .borrow_mut()
            .entry(program.to_string())
            .or_default()
            .push_back(code);
        self
    }

    /// Runs `hook` for every command before answering, e.g. to fake rsync.
    pub fn on_run(mut self, hook: impl Fn(&CommandSpec) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.program.clone()).collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome> {
        self.calls.borrow_mut().push(spec.clone());
        if let Some(hook) = &self.hook {
            hook(spec);
        }
        let code = self
            .codes
            .borrow_mut()
            .get_mut(&spec.program)
            .and_then(VecDeque::pop_front)
            .unwrap_or(0);
        Ok(CommandOutcome {
            code,
            stderr: if code == 0 {
                String::new()
            } else {
                format!("{} failed", spec.program)
            },
        })
    }
}

/// Scrobbler that keeps every submitted batch in memory.
#[derive(Default)]
pub struct RecordingScrobbler {
    pub batches: RefCell<Vec<Vec<ScrobbleEvent>>>,
    pub fail: bool,
}

impl RecordingScrobbler {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<ScrobbleEvent> {
        self.batches.borrow().iter().flatten().cloned().collect()
    }
}

impl Scrobbler for RecordingScrobbler {
    fn submit_many(&self, events: &[ScrobbleEvent]) -> Result<()> {
        if self.fail {
            return Err(Error::scrobbler("remote rejected the batch"));
        }
        self.batches.borrow_mut().push(events.to_vec());
        Ok(())
    }
}
