//! # Interpreter
//!
//! A single worker's execution state: a coroutine-style walk of one
//! `Program`'s AST that yields after exactly one statement, matching the
//! scheduler's single-statement-granularity cooperative model (§4.3, §5).
//!
//! ## Resuming a recursive walk without real generators
//!
//! The reference behavior is generator-shaped: a recursive `executeStatement`
//! that `yield`s between every statement, including ones nested inside
//! `IF`/`FOR`/`WHILE` bodies. Rust has no stable generators, so this walk is
//! made resumable with an explicit stack of [`Frame`]s standing in for the
//! generator's suspended call stack — the "explicit call and loop state"
//! component 5 asks for. `step` pops/pushes frames one at a time and returns
//! after doing exactly one unit of work: executing a leaf statement,
//! deciding an `IF`/`FOR`/`WHILE` header, or re-testing a loop condition at
//! the end of an iteration. Moving between an exhausted, body-less frame and
//! its parent costs nothing (there is no statement to attribute a yield to);
//! everything else counts as one step.
//!
//! `GOTO`/`GOSUB`/`RETURN`/`HALT` clear the frame stack outright and either
//! redirect `line_idx` or halt — exactly the "jumps unwind through arbitrary
//! nesting" rule from §4.3, expressed here as "throw away whatever frames
//! were open and start fresh at the target line".

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ast::{BinaryOp, Expr, Program, Statement, UnaryOp};
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::io::{grid_index, HostIo};
use crate::memory::MemorySpace;

/// Per-worker lifecycle state (§4.3's `running`/`halted`/`waiting`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Waiting,
    Halted,
}

/// What one call to [`Interpreter::step`] accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One statement (or loop header/re-test) executed; the worker may still
    /// be runnable.
    Executed,
    /// The current statement needs a complete input line that hasn't
    /// arrived; nothing was mutated and the same statement will be retried.
    Blocked,
    /// The worker is in `Waiting` and stays there until `resume_from_frame_wait`.
    FrameWaiting,
    /// The worker has halted (explicitly, or by running off the end of the program).
    Halted,
    /// A runtime error was raised this step; the worker is now halted.
    Errored,
}

/// Debug stepping granularity requested by a host (mirrors common debugger
/// verbs; optional relative to the core execution contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugMode {
    Run,
    StepIn,
    StepOver,
    StepOut,
    Break,
}

enum EvalSignal {
    Error(RuntimeError),
    InputPending,
}

type EvalResult = Result<i16, EvalSignal>;

enum Flow {
    Normal,
    Jumped,
    Halted,
}

type ExecResult = Result<Flow, EvalSignal>;

/// One level of the resumable execution stack.
struct Frame {
    body: Vec<Statement>,
    index: usize,
    kind: FrameKind,
}

enum FrameKind {
    /// The statement list of the current top-level `Line`.
    Line,
    /// The `then_body` or `else_body` of an `IfBlock`; popping needs no
    /// further action beyond returning control to the parent frame.
    IfBody,
    /// The `body` of a `ForBlock`; popping increments the loop variable and
    /// re-tests the bound, which is itself one yield (it's an evaluation
    /// with the same side-effect surface as any other statement).
    ForBody { var: char, end: i16, step: i16 },
    /// The `body` of a `WhileBlock`; popping re-evaluates `condition`.
    WhileBody { condition: Expr },
}

impl Frame {
    fn line(body: Vec<Statement>) -> Self {
        Frame { body, index: 0, kind: FrameKind::Line }
    }
    fn if_body(body: Vec<Statement>) -> Self {
        Frame { body, index: 0, kind: FrameKind::IfBody }
    }
}

/// One worker's interpreter: a loaded `Program`, its own variables and call
/// stack, and the resumable frame stack described above.
///
/// Does *not* own the shared grid or [`MemorySpace`] — those are injected
/// per call to `step`, per §4.5's "all workers share one grid and one
/// MemorySpace" rule; only the per-worker state named in §4.3 lives here.
pub struct Interpreter {
    program: Program,
    line_idx: usize,
    frames: Vec<Frame>,
    variables: [i16; 26],
    call_stack: Vec<usize>,
    state: WorkerState,
    rng: StdRng,
    /// Prefix of the in-flight input line already echoed to the transcript.
    input_echo: String,
    last_error: Option<RuntimeError>,
    breakpoints: HashSet<usize>,
    debug_mode: DebugMode,
}

impl Interpreter {
    /// Load a parsed program, resetting all execution state (§4.3's
    /// `loadProgram`).
    pub fn new(program: Program) -> Self {
        Self {
            program,
            line_idx: 0,
            frames: Vec::new(),
            variables: [0; 26],
            call_stack: Vec::new(),
            state: WorkerState::Running,
            rng: StdRng::from_entropy(),
            input_echo: String::new(),
            last_error: None,
            breakpoints: HashSet::new(),
            debug_mode: DebugMode::Run,
        }
    }

    /// Like [`Interpreter::new`], but with a seeded RNG for reproducible
    /// `~` sequences in tests.
    pub fn with_seed(program: Program, seed: u64) -> Self {
        let mut interp = Self::new(program);
        interp.rng = StdRng::seed_from_u64(seed);
        interp
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn can_execute(&self) -> bool {
        matches!(self.state, WorkerState::Running)
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, WorkerState::Halted)
    }

    pub fn last_error(&self) -> Option<&RuntimeError> {
        self.last_error.as_ref()
    }

    pub fn get_variable(&self, name: char) -> i16 {
        self.var(name)
    }

    /// The source line of whatever statement is about to execute next —
    /// the deepest frame's current statement if one is open, else the
    /// top-level line pointer.
    pub fn get_line(&self) -> usize {
        for frame in self.frames.iter().rev() {
            if let Some(stmt) = frame.body.get(frame.index) {
                return stmt.line();
            }
        }
        self.program.body.get(self.line_idx).map(|l| l.line_no).unwrap_or(0)
    }

    pub fn call_stack(&self) -> &[usize] {
        &self.call_stack
    }

    pub fn set_breakpoint(&mut self, line: usize) {
        self.breakpoints.insert(line);
    }

    pub fn clear_breakpoint(&mut self, line: usize) {
        self.breakpoints.remove(&line);
    }

    pub fn breakpoints(&self) -> &HashSet<usize> {
        &self.breakpoints
    }

    pub fn debug_mode(&self) -> DebugMode {
        self.debug_mode
    }

    /// `true` once a debug-stepping command has paused execution; a host
    /// debugger must issue `continue_exec`/`step_in`/`step_over`/`step_out`
    /// before calling `run_until_pause` again.
    pub fn is_paused(&self) -> bool {
        self.debug_mode == DebugMode::Break
    }

    pub fn continue_exec(&mut self) {
        self.debug_mode = DebugMode::Run;
    }

    pub fn step_in(&mut self) {
        self.debug_mode = DebugMode::StepIn;
    }

    pub fn step_over(&mut self) {
        self.debug_mode = DebugMode::StepOver;
    }

    pub fn step_out(&mut self) {
        self.debug_mode = DebugMode::StepOut;
    }

    /// Drives `step` under the current `DebugMode`, stopping at the next
    /// point a debugger should regain control: after exactly one statement
    /// (`StepIn`), once the call stack returns to the depth it had when this
    /// was called or shallower (`StepOver`), once it drops below that depth
    /// (`StepOut`), or at the next breakpoint line (`Run`). Any outcome other
    /// than `Executed` — blocked on input, frame-waiting, halted, errored —
    /// always returns immediately regardless of mode, since those are points
    /// the worker loses its turn anyway.
    pub fn run_until_pause(&mut self, memory: &mut MemorySpace, io: &mut dyn HostIo) -> StepOutcome {
        let start_depth = self.call_stack.len();
        loop {
            let outcome = self.step(memory, io);
            if outcome != StepOutcome::Executed {
                return outcome;
            }
            let should_pause = match self.debug_mode {
                DebugMode::StepIn | DebugMode::Break => true,
                DebugMode::StepOver => self.call_stack.len() <= start_depth,
                DebugMode::StepOut => self.call_stack.len() < start_depth,
                DebugMode::Run => self.breakpoints.contains(&self.get_line()),
            };
            if should_pause {
                self.debug_mode = DebugMode::Break;
                return outcome;
            }
        }
    }

    /// Clears `Waiting` back to `Running`; called by the scheduler at the
    /// start of every frame (§4.5 step 1). No-op for `Running`/`Halted`.
    pub fn resume_from_frame_wait(&mut self) {
        if self.state == WorkerState::Waiting {
            self.state = WorkerState::Running;
        }
    }

    fn var(&self, name: char) -> i16 {
        self.variables[(name as u8 - b'A') as usize]
    }

    fn set_var(&mut self, name: char, value: i16) {
        self.variables[(name as u8 - b'A') as usize] = value;
    }

    fn fail(&mut self, err: RuntimeError) {
        self.last_error = Some(err);
        self.state = WorkerState::Halted;
        self.frames.clear();
    }

    /// Advance by exactly one unit of work: a leaf statement, a block
    /// header decision, or a loop re-test. See the module doc comment for
    /// what counts as "free" (no statement executed, no yield consumed).
    pub fn step(&mut self, memory: &mut MemorySpace, io: &mut dyn HostIo) -> StepOutcome {
        match self.state {
            WorkerState::Halted => return StepOutcome::Halted,
            WorkerState::Waiting => return StepOutcome::FrameWaiting,
            WorkerState::Running => {}
        }

        loop {
            if self.frames.is_empty() {
                if self.line_idx >= self.program.body.len() {
                    self.state = WorkerState::Halted;
                    return StepOutcome::Halted;
                }
                let stmts = self.program.body[self.line_idx].statements.clone();
                self.frames.push(Frame::line(stmts));
            }

            let top_exhausted = {
                let frame = self.frames.last().unwrap();
                frame.index >= frame.body.len()
            };

            if !top_exhausted {
                let stmt = {
                    let frame = self.frames.last().unwrap();
                    frame.body[frame.index].clone()
                };
                return self.execute_current(&stmt, memory, io);
            }

            let finished = self.frames.pop().unwrap();
            match finished.kind {
                FrameKind::Line => {
                    self.line_idx += 1;
                    continue; // bookkeeping only, never a yield
                }
                FrameKind::IfBody => {
                    continue; // bookkeeping only, never a yield
                }
                FrameKind::ForBody { var, end, step } => {
                    let next = self.var(var).wrapping_add(step);
                    self.set_var(var, next);
                    let cont = if step > 0 { next <= end } else { next >= end };
                    if cont {
                        self.frames.push(Frame { body: finished.body, index: 0, kind: FrameKind::ForBody { var, end, step } });
                    }
                    return StepOutcome::Executed;
                }
                FrameKind::WhileBody { condition } => match self.eval(&condition, memory, io) {
                    Ok(v) => {
                        if v != 0 {
                            self.frames.push(Frame { body: finished.body, index: 0, kind: FrameKind::WhileBody { condition } });
                        }
                        return StepOutcome::Executed;
                    }
                    Err(EvalSignal::InputPending) => {
                        self.frames.push(Frame { body: finished.body, index: finished.index, kind: FrameKind::WhileBody { condition } });
                        return StepOutcome::Blocked;
                    }
                    Err(EvalSignal::Error(e)) => {
                        self.fail(e);
                        return StepOutcome::Errored;
                    }
                },
            }
        }
    }

    /// Advances the current top frame's statement index by one, used after
    /// a leaf statement or a block header completes normally.
    fn advance_top(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.index += 1;
        }
    }

    fn execute_current(&mut self, stmt: &Statement, memory: &mut MemorySpace, io: &mut dyn HostIo) -> StepOutcome {
        match stmt {
            Statement::IfBlock { condition, then_body, else_body, .. } => {
                match self.eval(condition, memory, io) {
                    Ok(v) => {
                        self.advance_top();
                        if v != 0 {
                            self.frames.push(Frame::if_body(then_body.clone()));
                        } else if let Some(else_body) = else_body {
                            self.frames.push(Frame::if_body(else_body.clone()));
                        }
                        StepOutcome::Executed
                    }
                    Err(EvalSignal::InputPending) => StepOutcome::Blocked,
                    Err(EvalSignal::Error(e)) => {
                        self.fail(e);
                        StepOutcome::Errored
                    }
                }
            }
            Statement::ForBlock { var, start, end, step, body, line } => {
                match self.eval_for_header(start, end, step.as_ref(), *line, memory, io) {
                    Ok((start_v, end_v, step_v)) => {
                        self.set_var(*var, start_v);
                        self.advance_top();
                        let cont = if step_v > 0 { start_v <= end_v } else { start_v >= end_v };
                        if cont {
                            self.frames.push(Frame {
                                body: body.clone(),
                                index: 0,
                                kind: FrameKind::ForBody { var: *var, end: end_v, step: step_v },
                            });
                        }
                        StepOutcome::Executed
                    }
                    Err(EvalSignal::InputPending) => StepOutcome::Blocked,
                    Err(EvalSignal::Error(e)) => {
                        self.fail(e);
                        StepOutcome::Errored
                    }
                }
            }
            Statement::WhileBlock { condition, body, .. } => match self.eval(condition, memory, io) {
                Ok(v) => {
                    self.advance_top();
                    if v != 0 {
                        self.frames.push(Frame { body: body.clone(), index: 0, kind: FrameKind::WhileBody { condition: condition.clone() } });
                    }
                    StepOutcome::Executed
                }
                Err(EvalSignal::InputPending) => StepOutcome::Blocked,
                Err(EvalSignal::Error(e)) => {
                    self.fail(e);
                    StepOutcome::Errored
                }
            },
            other => match self.exec_leaf(other, memory, io) {
                Ok(Flow::Normal) => {
                    self.advance_top();
                    StepOutcome::Executed
                }
                Ok(Flow::Jumped) => {
                    self.frames.clear();
                    StepOutcome::Executed
                }
                Ok(Flow::Halted) => {
                    self.frames.clear();
                    self.state = WorkerState::Halted;
                    StepOutcome::Halted
                }
                Err(EvalSignal::InputPending) => StepOutcome::Blocked,
                Err(EvalSignal::Error(e)) => {
                    self.fail(e);
                    StepOutcome::Errored
                }
            },
        }
    }

    fn eval_for_header(
        &mut self,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        line: usize,
        memory: &mut MemorySpace,
        io: &mut dyn HostIo,
    ) -> EvalResult3 {
        let start_v = self.eval(start, memory, io)?;
        let end_v = self.eval(end, memory, io)?;
        let step_v = match step {
            Some(e) => self.eval(e, memory, io)?,
            None => 1,
        };
        if step_v == 0 {
            return Err(EvalSignal::Error(RuntimeError::new(RuntimeErrorKind::ForStepZero, line, "FOR step may not be zero")));
        }
        Ok((start_v, end_v, step_v))
    }

    fn exec_leaf(&mut self, stmt: &Statement, memory: &mut MemorySpace, io: &mut dyn HostIo) -> ExecResult {
        match stmt {
            Statement::Assignment { var, expr, .. } => {
                let v = self.eval(expr, memory, io)?;
                self.set_var(*var, v);
                Ok(Flow::Normal)
            }
            Statement::Output { expr, .. } => {
                if let Expr::StringLiteral(s) = expr {
                    io.log_str(s);
                } else {
                    let v = self.eval(expr, memory, io)?;
                    io.log_number(v);
                }
                Ok(Flow::Normal)
            }
            Statement::Newline { .. } => {
                io.log_str("\n");
                Ok(Flow::Normal)
            }
            Statement::Goto { label, line } => {
                let target = *self
                    .program
                    .labels
                    .get(label)
                    .ok_or_else(|| EvalSignal::Error(RuntimeError::new(RuntimeErrorKind::UndefinedLabel, *line, format!("undefined label: ^{}", label))))?;
                self.line_idx = target;
                Ok(Flow::Jumped)
            }
            Statement::Gosub { label, line } => {
                let target = *self
                    .program
                    .labels
                    .get(label)
                    .ok_or_else(|| EvalSignal::Error(RuntimeError::new(RuntimeErrorKind::UndefinedLabel, *line, format!("undefined label: ^{}", label))))?;
                self.call_stack.push(self.line_idx + 1);
                self.line_idx = target;
                Ok(Flow::Jumped)
            }
            Statement::Return { line } => {
                let target = self
                    .call_stack
                    .pop()
                    .ok_or_else(|| EvalSignal::Error(RuntimeError::new(RuntimeErrorKind::ReturnWithEmptyCallStack, *line, "RETURN with empty call stack")))?;
                self.line_idx = target;
                Ok(Flow::Jumped)
            }
            Statement::Halt { .. } => Ok(Flow::Halted),
            Statement::WaitForNextFrame { .. } => {
                self.state = WorkerState::Waiting;
                Ok(Flow::Normal)
            }
            Statement::Poke { expr, .. } => {
                let v = self.eval(expr, memory, io)?;
                let (x, y) = (self.var('X') as i32, self.var('Y') as i32);
                io.poke(x, y, v);
                Ok(Flow::Normal)
            }
            Statement::IoPut { expr, .. } => {
                let v = self.eval(expr, memory, io)?;
                io.put(v);
                Ok(Flow::Normal)
            }
            Statement::ArrayAssignment { index, is_literal_minus_one, expr, .. } => {
                let v = self.eval(expr, memory, io)?;
                if *is_literal_minus_one {
                    memory.push(v);
                } else {
                    let idx = self.eval(index, memory, io)? as i32;
                    memory.write_array(idx, v);
                }
                Ok(Flow::Normal)
            }
            Statement::ArrayInitialization { index, exprs, .. } => {
                let idx0 = self.eval(index, memory, io)? as i32;
                let mut values = Vec::with_capacity(exprs.len());
                for e in exprs {
                    values.push(self.eval(e, memory, io)?);
                }
                memory.initialize_array(idx0, &values);
                Ok(Flow::Normal)
            }
            Statement::IfBlock { .. } | Statement::ForBlock { .. } | Statement::WhileBlock { .. } => {
                unreachable!("block statements are dispatched by execute_current, not exec_leaf")
            }
        }
    }

    fn eval(&mut self, expr: &Expr, memory: &mut MemorySpace, io: &mut dyn HostIo) -> EvalResult {
        match expr {
            Expr::NumericLiteral(n) => Ok(*n),
            Expr::CharLiteral(c) => Ok(*c as i16),
            Expr::StringLiteral(_) => Err(EvalSignal::Error(RuntimeError::new(
                RuntimeErrorKind::StringWhereNumberRequired,
                self.get_line(),
                "a string literal may not appear where a number is required",
            ))),
            Expr::Identifier(ch) => Ok(self.var(*ch)),
            Expr::Unary { op, operand } => {
                let v = self.eval(operand, memory, io)?;
                Ok(match op {
                    UnaryOp::Neg => 0i16.wrapping_sub(v),
                    UnaryOp::Plus => v,
                    UnaryOp::Not => i16::from(v == 0),
                })
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, memory, io)?;
                let r = self.eval(right, memory, io)?;
                self.apply_binary(*op, l, r)
            }
            Expr::Peek => {
                let idx = grid_index(self.var('X') as i32, self.var('Y') as i32);
                Ok(io.peek(idx))
            }
            Expr::Random => Ok(self.rng.gen::<u16>() as i16),
            Expr::IoGet => Ok(io.get_char() as i16),
            Expr::InputNumber => self.eval_input_number(io),
            Expr::ArrayAccess { index, is_literal_minus_one } => {
                if *is_literal_minus_one {
                    Ok(memory.pop())
                } else {
                    let idx = self.eval(index, memory, io)? as i32;
                    Ok(memory.read_array(idx))
                }
            }
            Expr::CompareAndSwap { expected, new_value } => {
                let (x, y) = (self.var('X') as i32, self.var('Y') as i32);
                let idx = grid_index(x, y);
                let expected_v = self.eval(expected, memory, io)?;
                let new_v = self.eval(new_value, memory, io)?;
                if io.peek(idx) == expected_v {
                    io.poke(x, y, new_v);
                    Ok(1)
                } else {
                    Ok(0)
                }
            }
        }
    }

    fn eval_input_number(&mut self, io: &mut dyn HostIo) -> EvalResult {
        let input = io.get_line();
        if input.complete {
            self.input_echo.clear();
            let trimmed = input.value.trim();
            let value = trimmed.parse::<i32>().map(|n| (n & 0xFFFF) as u16 as i16).unwrap_or(0);
            Ok(value)
        } else {
            if input.value.len() > self.input_echo.len() {
                let delta = &input.value[self.input_echo.len()..];
                io.log_str(delta);
                self.input_echo = input.value.clone();
            }
            Err(EvalSignal::InputPending)
        }
    }

    fn apply_binary(&self, op: BinaryOp, l: i16, r: i16) -> EvalResult {
        use BinaryOp::*;
        Ok(match op {
            Add => l.wrapping_add(r),
            Sub => l.wrapping_sub(r),
            Mul => l.wrapping_mul(r),
            Div => {
                if r == 0 {
                    return Err(EvalSignal::Error(RuntimeError::new(RuntimeErrorKind::DivisionByZero, self.get_line(), "division by zero")));
                }
                l.wrapping_div(r)
            }
            Mod => {
                if r == 0 {
                    return Err(EvalSignal::Error(RuntimeError::new(RuntimeErrorKind::DivisionByZero, self.get_line(), "modulo by zero")));
                }
                l.wrapping_rem(r)
            }
            Eq => i16::from(l == r),
            NotEq => i16::from(l != r),
            Gt => i16::from(l > r),
            Lt => i16::from(l < r),
            Ge => i16::from(l >= r),
            Le => i16::from(l <= r),
            And => i16::from(l != 0 && r != 0),
            Or => i16::from(l != 0 || r != 0),
            Comma => r,
        })
    }
}

type EvalResult3 = Result<(i16, i16, i16), EvalSignal>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::GridIo;
    use crate::parser::parse_program;

    fn run_to_halt(src: &str) -> (GridIo, Interpreter) {
        let program = parse_program(src).unwrap();
        let mut interp = Interpreter::with_seed(program, 1);
        let mut memory = MemorySpace::new();
        let mut io = GridIo::new();
        let mut guard = 0;
        loop {
            match interp.step(&mut memory, &mut io) {
                StepOutcome::Halted | StepOutcome::Errored => break,
                _ => {}
            }
            guard += 1;
            assert!(guard < 100_000, "runaway interpreter");
        }
        (io, interp)
    }

    #[test]
    fn canonical_inline_if_skip_then_done() {
        let (io, _) = run_to_halt("A=3\n;=A>5 ?=A\n?=\"done\" /\n");
        assert_eq!(io.transcript(), "done\n");
    }

    #[test]
    fn canonical_nested_for_sums_one_to_ten() {
        let (io, _) = run_to_halt("S=0\n@=I,1,10\nS=S+I\n#=@\n?=S /\n");
        assert_eq!(io.transcript(), "55\n");
    }

    #[test]
    fn canonical_block_if_else_takes_false_branch() {
        let src = "A=5\n;=A>10\n?=\"big\"\n;\n?=\"small\"\n#=;\n/\n";
        let (io, _) = run_to_halt(src);
        assert_eq!(io.transcript(), "small\n");
    }

    #[test]
    fn canonical_gosub_return_runs_subroutine_before_resuming() {
        let src = "!=^SUB\n?=\"after\" /\n#=-1\n^SUB\n?=\"in\" /\n#=!\n";
        let (io, _) = run_to_halt(src);
        assert_eq!(io.transcript(), "in\nafter\n");
    }

    #[test]
    fn division_by_zero_halts_with_runtime_error() {
        let (_, interp) = run_to_halt("A=1/0\n");
        assert!(interp.is_halted());
        assert_eq!(interp.last_error().unwrap().kind, RuntimeErrorKind::DivisionByZero);
    }

    #[test]
    fn for_step_zero_is_a_runtime_error() {
        let (_, interp) = run_to_halt("@=I,1,10,0\nS=1\n#=@\n");
        assert!(interp.is_halted());
        assert_eq!(interp.last_error().unwrap().kind, RuntimeErrorKind::ForStepZero);
    }

    #[test]
    fn return_with_empty_call_stack_is_a_runtime_error() {
        let (_, interp) = run_to_halt("#=!\n");
        assert!(interp.is_halted());
        assert_eq!(interp.last_error().unwrap().kind, RuntimeErrorKind::ReturnWithEmptyCallStack);
    }

    #[test]
    fn undefined_goto_label_is_a_runtime_error() {
        let (_, interp) = run_to_halt("#=^NOWHERE\n");
        assert!(interp.is_halted());
        assert_eq!(interp.last_error().unwrap().kind, RuntimeErrorKind::UndefinedLabel);
    }

    #[test]
    fn arithmetic_wraps_mod_2_16() {
        let (io, _) = run_to_halt("A=32767\nA=A+1\n?=A /\n");
        assert_eq!(io.transcript(), "-32768\n");
    }

    #[test]
    fn poke_and_peek_round_trip_through_current_xy() {
        let (io, _) = run_to_halt("X=3\nY=4\n`=42\nA=`\n?=A /\n");
        assert_eq!(io.transcript(), "42\n");
    }

    #[test]
    fn compare_and_swap_succeeds_once_then_fails() {
        let src = "X=0\nY=0\n`=0\nA=<&0,1>\n?=A /\nB=<&0,2>\n?=B /\n";
        let (io, _) = run_to_halt(src);
        assert_eq!(io.transcript(), "1\n0\n");
    }

    #[test]
    fn array_assignment_and_access_round_trip() {
        let (io, _) = run_to_halt("[100]=7\nA=[100]\n?=A /\n");
        assert_eq!(io.transcript(), "7\n");
    }

    #[test]
    fn array_index_wraps_mod_65536() {
        let (io, _) = run_to_halt("[65536]=9\nA=[0]\n?=A /\n");
        assert_eq!(io.transcript(), "9\n");
    }

    #[test]
    fn literal_minus_one_index_pushes_and_pops_the_stack() {
        let (io, _) = run_to_halt("[-1]=1\n[-1]=2\nA=[-1]\nB=[-1]\n?=A?=B /\n");
        assert_eq!(io.transcript(), "21\n");
    }

    #[test]
    fn array_initialization_writes_consecutive_cells() {
        let (io, _) = run_to_halt("[10]=1,2,3\nA=[10]\nB=[11]\nC=[12]\n?=A?=B?=C /\n");
        assert_eq!(io.transcript(), "123\n");
    }

    #[test]
    fn wait_for_next_frame_suspends_until_resumed() {
        let program = parse_program("C=0\n^L\nC=C+1\n#=`\n#=^L\n").unwrap();
        let mut interp = Interpreter::new(program);
        let mut memory = MemorySpace::new();
        let mut io = GridIo::new();

        for expected in 1..=3 {
            interp.resume_from_frame_wait();
            loop {
                match interp.step(&mut memory, &mut io) {
                    StepOutcome::FrameWaiting => break,
                    StepOutcome::Halted | StepOutcome::Errored => panic!("should not halt"),
                    _ => {}
                }
            }
            assert_eq!(interp.get_variable('C'), expected);
        }
    }

    #[test]
    fn non_blocking_char_input_defaults_to_zero() {
        let program = parse_program("A=$\n?=A /\n").unwrap();
        let mut interp = Interpreter::new(program);
        let mut memory = MemorySpace::new();
        let mut io = GridIo::new();
        io.push_char_input(65);
        loop {
            match interp.step(&mut memory, &mut io) {
                StepOutcome::Halted | StepOutcome::Errored => break,
                _ => {}
            }
        }
        assert_eq!(io.transcript(), "65\n");
    }

    #[test]
    fn blocking_numeric_input_retries_until_a_line_completes() {
        let program = parse_program("A=?\n?=A /\n").unwrap();
        let mut interp = Interpreter::new(program);
        let mut memory = MemorySpace::new();
        let mut io = GridIo::new();

        assert_eq!(interp.step(&mut memory, &mut io), StepOutcome::Blocked);
        assert_eq!(interp.step(&mut memory, &mut io), StepOutcome::Blocked);

        io.push_line("-7");
        assert_eq!(interp.step(&mut memory, &mut io), StepOutcome::Executed);
        loop {
            match interp.step(&mut memory, &mut io) {
                StepOutcome::Halted | StepOutcome::Errored => break,
                _ => {}
            }
        }
        assert_eq!(io.transcript(), "-7\n");
    }

    #[test]
    fn inline_if_skips_every_statement_remaining_on_the_line() {
        let (io, interp) = run_to_halt("A=3 ;=A>5 ?=A B=1 ?=B\n");
        assert_eq!(io.transcript(), "");
        assert_eq!(interp.get_variable('B'), 0);
    }

    #[test]
    fn while_block_reevaluates_condition_before_each_iteration() {
        let (io, _) = run_to_halt("I=0\n@=(I<3)\nI=I+1\n?=I /\n#=@\n");
        assert_eq!(io.transcript(), "1\n2\n3\n");
    }

    #[test]
    fn run_until_pause_stops_at_a_breakpoint_line() {
        let program = parse_program("A=1\nA=2\nA=3\n?=A /\n").unwrap();
        let mut interp = Interpreter::new(program);
        let mut memory = MemorySpace::new();
        let mut io = GridIo::new();
        interp.set_breakpoint(3);
        interp.continue_exec();
        let outcome = interp.run_until_pause(&mut memory, &mut io);
        assert_eq!(outcome, StepOutcome::Executed);
        assert!(interp.is_paused());
        assert_eq!(interp.get_line(), 3);
        assert_eq!(interp.get_variable('A'), 2);
    }

    #[test]
    fn step_over_does_not_pause_inside_a_called_subroutine() {
        let src = "!=^SUB\n?=\"after\" /\n#=-1\n^SUB\nR=1\n#=!\n";
        let program = parse_program(src).unwrap();
        let mut interp = Interpreter::new(program);
        let mut memory = MemorySpace::new();
        let mut io = GridIo::new();
        interp.step_over();
        let outcome = interp.run_until_pause(&mut memory, &mut io);
        assert_eq!(outcome, StepOutcome::Executed);
        assert!(interp.is_paused());
        // the GOSUB/RETURN round trip happened entirely within one step_over
        assert_eq!(interp.get_variable('R'), 1);
        assert_eq!(io.transcript(), "");
    }

    #[test]
    fn step_in_pauses_after_exactly_one_statement() {
        let program = parse_program("A=1\nA=2\n").unwrap();
        let mut interp = Interpreter::new(program);
        let mut memory = MemorySpace::new();
        let mut io = GridIo::new();
        interp.step_in();
        interp.run_until_pause(&mut memory, &mut io);
        assert_eq!(interp.get_variable('A'), 1);
        assert!(interp.is_paused());
    }

    #[test]
    fn one_yield_occurs_per_statement_inside_a_for_body() {
        let program = parse_program("@=I,1,3\n?=I /\n#=@\n").unwrap();
        let mut interp = Interpreter::new(program);
        let mut memory = MemorySpace::new();
        let mut io = GridIo::new();
        let mut transcripts_after_each_line = Vec::new();
        for _ in 0..20 {
            match interp.step(&mut memory, &mut io) {
                StepOutcome::Executed => transcripts_after_each_line.push(io.transcript().to_string()),
                StepOutcome::Halted => break,
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(transcripts_after_each_line.contains(&"1\n".to_string()));
        assert!(transcripts_after_each_line.contains(&"1\n2\n".to_string()));
        assert!(transcripts_after_each_line.contains(&"1\n2\n3\n".to_string()));
    }
}
