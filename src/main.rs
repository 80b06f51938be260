//! Command-line front end for the WorkerScript runtime.
//!
//! Loads one or more source files as workers, wires a stdin/stdout
//! [`HostIo`] adapter, and pumps [`WorkerManager::execute_frame`] until
//! every worker halts (or an optional frame cap is hit). This binary is a
//! thin host over `workerscript_core` — no grid renderer, no example
//! scripts bundled, per the core spec's external-collaborator boundary.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use clap::Parser;

use workerscript_core::io::{grid_index, HostIo, LineInput};
use workerscript_core::manager::WorkerManager;

/// Run one or more WorkerScript programs as cooperatively scheduled workers.
#[derive(Parser, Debug)]
#[command(name = "workerscript", version, about)]
struct Cli {
    /// WorkerScript source files, one worker per file.
    #[arg(required = true)]
    scripts: Vec<PathBuf>,

    /// Statements executed per worker per frame (the round-robin step budget).
    #[arg(long, default_value_t = 64)]
    steps_per_frame: usize,

    /// Stop after this many frames even if workers are still running (0 = unbounded).
    #[arg(long, default_value_t = 0)]
    frames: usize,

    /// Parse every script and print its AST instead of running it.
    #[arg(long)]
    dump_ast: bool,

    /// Log the source line executed by each worker on every step (via `log::trace!`).
    #[arg(long)]
    trace: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let sources: Vec<(PathBuf, String)> = cli
        .scripts
        .iter()
        .map(|path| {
            let text = fs::read_to_string(path).unwrap_or_else(|err| {
                eprintln!("failed to read {}: {err}", path.display());
                std::process::exit(1);
            });
            (path.clone(), text)
        })
        .collect();

    if cli.dump_ast {
        for (path, text) in &sources {
            match workerscript_core::parser::parse_program(text) {
                Ok(program) => println!("-- {} --\n{:#?}", path.display(), program),
                Err(err) => {
                    eprintln!("{}: {err}", path.display());
                    std::process::exit(1);
                }
            }
        }
        return;
    }

    let mut manager = WorkerManager::new(Box::new(StdioIo::new()));
    for (path, text) in &sources {
        match manager.add_worker(&text) {
            Ok(id) => log::info!("worker {id}: loaded {}", path.display()),
            Err(err) => {
                eprintln!("{}: {err}", path.display());
                std::process::exit(1);
            }
        }
    }

    let mut frame = 0usize;
    loop {
        if cli.trace {
            for w in manager.workers() {
                log::trace!("worker {} at line {}", w.id, w.interpreter().get_line());
            }
        }
        let still_running = manager.execute_frame(cli.steps_per_frame);
        frame += 1;
        io::stdout().flush().ok();
        if !still_running {
            break;
        }
        if cli.frames != 0 && frame >= cli.frames {
            log::info!("stopping after {frame} frames (--frames limit reached)");
            break;
        }
    }
}

/// The CLI's `HostIo`: a 100x100 grid backing `` ` `` PEEK/POKE, transcript
/// output streamed straight to stdout, and stdin read on a background
/// thread so [`HostIo::get_char`]/[`HostIo::get_line`] stay non-blocking —
/// the core never waits on I/O itself (§6); only this adapter does.
struct StdioIo {
    grid: Vec<u8>,
    bytes: Receiver<u8>,
    pending_line: Vec<u8>,
}

impl StdioIo {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            let mut lock = stdin.lock();
            let mut buf = [0u8; 1];
            loop {
                match lock.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(buf[0]).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self { grid: vec![0; 10_000], bytes: rx, pending_line: Vec::new() }
    }
}

impl HostIo for StdioIo {
    fn peek(&self, index: i32) -> i16 {
        self.grid[index.rem_euclid(10_000) as usize] as i16
    }

    fn poke(&mut self, x: i32, y: i32, value: i16) {
        let idx = grid_index(x, y) as usize;
        self.grid[idx] = (value as u16 & 0xFF) as u8;
    }

    fn log_str(&mut self, text: &str) {
        print!("{text}");
    }

    fn log_number(&mut self, value: i16) {
        print!("{value}");
    }

    fn get_char(&mut self) -> u8 {
        self.bytes.try_recv().unwrap_or(0)
    }

    fn get_line(&mut self) -> LineInput {
        while let Ok(b) = self.bytes.try_recv() {
            if b == b'\n' {
                let mut line = String::from_utf8_lossy(&self.pending_line).into_owned();
                if line.ends_with('\r') {
                    line.pop();
                }
                self.pending_line.clear();
                return LineInput { complete: true, value: line };
            }
            self.pending_line.push(b);
        }
        LineInput { complete: false, value: String::from_utf8_lossy(&self.pending_line).into_owned() }
    }

    fn put(&mut self, value: i16) {
        let byte = (value as u16 & 0xFF) as u8;
        print!("{}", byte as char);
    }
}
