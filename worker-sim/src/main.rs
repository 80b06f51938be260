//! # worker-sim
//!
//! An interactive TUI debugger for a single WorkerScript worker, in the
//! same spirit as the teacher's `lc3-sim`: it sits on top of the core's
//! existing step/breakpoint contract (`Interpreter::{set_breakpoint,
//! step_in, step_over, step_out, continue_exec, run_until_pause}`) rather
//! than adding any new execution semantics. It shows one worker at a time —
//! multi-worker round-robin scheduling is `WorkerManager`'s job, exercised
//! by the `workerscript` binary, not by this debugger.
//!
//! This is a host-side adapter (component 7): it owns the grid and
//! transcript (via `GridIo`) and renders them, but contributes nothing to
//! `workerscript_core` itself.

use std::env;
use std::fs;
use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use workerscript_core::interpreter::{Interpreter, WorkerState};
use workerscript_core::io::GridIo;
use workerscript_core::memory::MemorySpace;
use workerscript_core::parser::parse_program;

struct App {
    source_lines: Vec<String>,
    interpreter: Interpreter,
    memory: MemorySpace,
    io: GridIo,
    cursor: usize,
    status: String,
}

impl App {
    fn new(path: &str) -> Result<Self, String> {
        let text = fs::read_to_string(path).map_err(|e| format!("failed to read {path}: {e}"))?;
        let program = parse_program(&text).map_err(|e| format!("{path}: {e}"))?;
        let source_lines = text.lines().map(str::to_string).collect();
        Ok(Self {
            source_lines,
            interpreter: Interpreter::new(program),
            memory: MemorySpace::new(),
            io: GridIo::new(),
            cursor: 1,
            status: "paused before first statement".to_string(),
        })
    }

    fn toggle_breakpoint_at_cursor(&mut self) {
        if self.interpreter.breakpoints().contains(&self.cursor) {
            self.interpreter.clear_breakpoint(self.cursor);
        } else {
            self.interpreter.set_breakpoint(self.cursor);
        }
    }

    fn dispatch(&mut self, key: KeyCode) {
        if !self.interpreter.can_execute() {
            self.status = "worker is not running".to_string();
            return;
        }
        match key {
            KeyCode::Char('i') => self.interpreter.step_in(),
            KeyCode::Char('o') => self.interpreter.step_over(),
            KeyCode::Char('O') => self.interpreter.step_out(),
            KeyCode::Char('c') => self.interpreter.continue_exec(),
            _ => return,
        }
        let outcome = self.interpreter.run_until_pause(&mut self.memory, &mut self.io);
        self.status = format!("{outcome:?}");
        self.cursor = self.interpreter.get_line().max(1);
    }
}

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: worker-sim <script.ws>");
        std::process::exit(1);
    }

    let mut app = match App::new(&args[1]) {
        Ok(app) => app,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(1);
        }
    };

    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, &mut app);
    teardown_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

fn run(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Char('b') => app.toggle_breakpoint_at_cursor(),
                    KeyCode::Up => app.cursor = app.cursor.saturating_sub(1).max(1),
                    KeyCode::Down => app.cursor = (app.cursor + 1).min(app.source_lines.len()),
                    other => app.dispatch(other),
                }
            }
        }
    }
}

fn draw(f: &mut Frame, app: &App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(root[0]);

    draw_source(f, columns[0], app);
    draw_side_panels(f, columns[1], app);
    draw_status(f, root[1], app);
}

fn draw_source(f: &mut Frame, area: Rect, app: &App) {
    let current_line = app.interpreter.get_line();
    let lines: Vec<Line> = app
        .source_lines
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let line_no = i + 1;
            let marker = if line_no == current_line {
                "> "
            } else if app.interpreter.breakpoints().contains(&line_no) {
                "* "
            } else {
                "  "
            };
            let style = if line_no == app.cursor {
                Style::default().add_modifier(Modifier::REVERSED)
            } else if line_no == current_line {
                Style::default().fg(Color::Yellow)
            } else if app.interpreter.breakpoints().contains(&line_no) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            Line::from(Span::styled(format!("{marker}{line_no:>4} | {text}"), style))
        })
        .collect();
    let block = Block::default().borders(Borders::ALL).title("source  (b: breakpoint, ↑/↓: cursor)");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_side_panels(f: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(10), Constraint::Length(6), Constraint::Min(0)])
        .split(area);

    let vars: Vec<Line> = (b'A'..=b'Z')
        .collect::<Vec<u8>>()
        .chunks(7)
        .map(|chunk| {
            let spans: Vec<Span> = chunk
                .iter()
                .map(|&b| Span::raw(format!("{}={:<6}", b as char, app.interpreter.get_variable(b as char))))
                .collect();
            Line::from(spans)
        })
        .collect();
    f.render_widget(Paragraph::new(vars).block(Block::default().borders(Borders::ALL).title("variables")), rows[0]);

    let call_stack: Vec<Line> = app.interpreter.call_stack().iter().rev().map(|idx| Line::from(format!("-> line index {idx}"))).collect();
    f.render_widget(Paragraph::new(call_stack).block(Block::default().borders(Borders::ALL).title("call stack")), rows[1]);

    let transcript = Paragraph::new(app.io.transcript())
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("transcript"));
    f.render_widget(transcript, rows[2]);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let state = match app.interpreter.state() {
        WorkerState::Running => "running",
        WorkerState::Waiting => "waiting (frame)",
        WorkerState::Halted => "halted",
    };
    let paused = if app.interpreter.is_paused() { "paused" } else { "armed" };
    let text = format!(
        "state: {state}  [{paused}]  {}   |   i: step-in  o: step-over  O: step-out  c: continue  q: quit",
        app.status
    );
    f.render_widget(Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("worker-sim")), area);
}
