//! # WorkerManager
//!
//! The process-wide orchestrator: holds every worker's [`Interpreter`],
//! drives them in strict round-robin inside a per-frame step budget, and
//! owns the single [`MemorySpace`] (component 4) they all share. The grid
//! and every other host-facing effect is reached through one shared
//! [`HostIo`] implementation injected at construction — per §4.5, "all
//! workers share one grid and one MemorySpace", and per §6, grid storage is
//! a collaborator concern, not the core's.

use crate::error::CompileError;
use crate::interpreter::{Interpreter, StepOutcome, WorkerState};
use crate::io::HostIo;
use crate::memory::MemorySpace;
use crate::parser::parse_program;

/// One worker slot: its interpreter plus the id and source text a host
/// might want for diagnostics (e.g. `worker-sim`'s worker list).
pub struct WorkerRecord {
    pub id: usize,
    pub script: String,
    interpreter: Interpreter,
}

impl WorkerRecord {
    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }
}

/// Drives N worker coroutines in round-robin, sharing one grid (via
/// `HostIo`) and one [`MemorySpace`] across all of them.
pub struct WorkerManager {
    workers: Vec<WorkerRecord>,
    memory: MemorySpace,
    io: Box<dyn HostIo>,
    next_id: usize,
}

impl WorkerManager {
    /// `io` is the shared host adapter (grid storage, transcript, input
    /// channels) every worker added to this manager will use.
    pub fn new(io: Box<dyn HostIo>) -> Self {
        Self { workers: Vec::new(), memory: MemorySpace::new(), io, next_id: 0 }
    }

    /// Parse `source` and add it as a new worker, appended to the end of the
    /// round-robin order. Returns the new worker's id.
    pub fn add_worker(&mut self, source: &str) -> Result<usize, CompileError> {
        let program = parse_program(source)?;
        let id = self.next_id;
        self.next_id += 1;
        log::debug!("worker {id}: loaded {} lines", program.body.len());
        self.workers.push(WorkerRecord { id, script: source.to_string(), interpreter: Interpreter::new(program) });
        Ok(id)
    }

    pub fn workers(&self) -> &[WorkerRecord] {
        &self.workers
    }

    pub fn worker(&self, id: usize) -> Option<&WorkerRecord> {
        self.workers.iter().find(|w| w.id == id)
    }

    pub fn worker_mut(&mut self, id: usize) -> Option<&mut WorkerRecord> {
        self.workers.iter_mut().find(|w| w.id == id)
    }

    pub fn memory(&self) -> &MemorySpace {
        &self.memory
    }

    pub fn io(&self) -> &dyn HostIo {
        self.io.as_ref()
    }

    pub fn io_mut(&mut self) -> &mut dyn HostIo {
        self.io.as_mut()
    }

    /// Remove a halted worker from the round-robin order (a host typically
    /// does this at a frame boundary, per §7's "a halted worker ... may be
    /// removed by the host at a frame boundary").
    pub fn remove_worker(&mut self, id: usize) {
        self.workers.retain(|w| w.id != id);
    }

    /// Drive every worker through up to `steps_per_frame` statements each,
    /// in strict round-robin, per §4.5:
    ///
    /// 1. Every worker still `Waiting` returns to `Running`.
    /// 2. For up to `steps_per_frame` sub-steps, each worker that
    ///    `can_execute()` advances by exactly one statement, in the same
    ///    fixed insertion order every sub-step and every frame.
    /// 3. If a whole sub-step passes with no worker advancing (all
    ///    `Waiting` or `Halted`), the frame ends early.
    ///
    /// Returns `false` once every worker is permanently halted — the
    /// session may terminate — `true` otherwise.
    pub fn execute_frame(&mut self, steps_per_frame: usize) -> bool {
        for record in &mut self.workers {
            record.interpreter.resume_from_frame_wait();
        }

        for _ in 0..steps_per_frame {
            let mut any_ran = false;
            for record in &mut self.workers {
                if !record.interpreter.can_execute() {
                    continue;
                }
                any_ran = true;
                match record.interpreter.step(&mut self.memory, self.io.as_mut()) {
                    StepOutcome::Halted => log::info!("worker {} halted", record.id),
                    StepOutcome::Errored => {
                        if let Some(err) = record.interpreter.last_error() {
                            log::warn!("worker {} runtime error: {}", record.id, err);
                        }
                    }
                    _ => {}
                }
            }
            if !any_ran {
                break;
            }
        }

        self.workers.iter().any(|w| !matches!(w.interpreter.state(), WorkerState::Halted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::GridIo;

    #[test]
    fn each_runnable_worker_executes_at_most_ceil_n_over_k_statements() {
        let mut mgr = WorkerManager::new(Box::new(GridIo::new()));
        mgr.add_worker("^L\nA=A+1\n#=^L\n").unwrap();
        mgr.add_worker("^L\nA=A+1\n#=^L\n").unwrap();
        let steps_per_frame = 5;
        mgr.execute_frame(steps_per_frame);
        let ceil_n_over_k = 3; // ceil(5/2)
        let total: i32 = mgr.workers().iter().map(|w| w.interpreter().get_variable('A') as i32).sum();
        assert!(total <= steps_per_frame as i32);
        for w in mgr.workers() {
            assert!(w.interpreter().get_variable('A') as i32 <= ceil_n_over_k);
        }
    }

    #[test]
    fn execute_frame_returns_false_once_every_worker_is_halted() {
        let mut mgr = WorkerManager::new(Box::new(GridIo::new()));
        mgr.add_worker("#=-1\n").unwrap();
        mgr.add_worker("#=-1\n").unwrap();
        let still_running = mgr.execute_frame(10);
        assert!(!still_running);
    }

    #[test]
    fn at_most_steps_per_frame_statements_execute_per_worker() {
        let mut mgr = WorkerManager::new(Box::new(GridIo::new()));
        mgr.add_worker("^L\nA=A+1\n#=^L\n").unwrap();
        mgr.execute_frame(5);
        let a = mgr.workers()[0].interpreter().get_variable('A');
        assert!(a as i32 <= 5);
    }

    #[test]
    fn frame_wait_suspends_a_worker_until_the_next_frame() {
        let mut mgr = WorkerManager::new(Box::new(GridIo::new()));
        mgr.add_worker("C=0\n^L\nC=C+1\n#=`\n#=^L\n").unwrap();
        for expected in 1..=3 {
            mgr.execute_frame(100);
            assert_eq!(mgr.workers()[0].interpreter().get_variable('C'), expected);
        }
    }

    #[test]
    fn two_workers_racing_a_cas_only_one_ever_wins() {
        let src_a = "X=0\nY=0\n`=0\n^L\nA=<&0,1>\n;=A=0\n#=^L\n?=\"won\" /\n";
        let src_b = "X=0\nY=0\n^L\nB=<&0,2>\n;=B=0\n#=^L\n?=\"won\" /\n";
        let mut mgr = WorkerManager::new(Box::new(GridIo::new()));
        mgr.add_worker(src_a).unwrap();
        mgr.add_worker(src_b).unwrap();
        for _ in 0..20 {
            mgr.execute_frame(50);
        }
        let transcript = mgr.io().peek(0); // grid cell (0,0) holds the winner's value
        assert!(transcript == 1 || transcript == 2);
    }

    #[test]
    fn removing_a_halted_worker_drops_it_from_round_robin() {
        let mut mgr = WorkerManager::new(Box::new(GridIo::new()));
        let id = mgr.add_worker("#=-1\n").unwrap();
        mgr.execute_frame(1);
        mgr.remove_worker(id);
        assert!(mgr.worker(id).is_none());
        assert_eq!(mgr.workers().len(), 0);
    }
}
