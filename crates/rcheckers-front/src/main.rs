use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{select, unbounded};

use rcheckers_engine::MaterialEngine;
use rcheckers_front::command::{self, Command, HELP_TEXT};
use rcheckers_front::control::Control;
use rcheckers_front::events::UiEvent;
use rcheckers_front::stdin_reader::spawn_stdin_reader;
use rcheckers_front::supervisor::Supervisor;
use rcheckers_front::utils::format_clock_ms;
use rcheckers_front::Options;

#[derive(Parser, Debug)]
#[command(author, version, about = "checkers front-end (engine orchestration core)")]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Options file (TOML)
    #[arg(long, default_value = "rcheckers.toml")]
    config: PathBuf,

    /// Override the match artifact directory
    #[arg(long)]
    match_dir: Option<PathBuf>,

    /// Override the documents directory (analysis reports, test logs)
    #[arg(long)]
    docs_dir: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    use std::io::Write;
    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    )
    .format(|buf, record| {
        writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
    })
    .write_style(env_logger::WriteStyle::Never)
    .target(env_logger::Target::Stderr)
    .init();

    if let Err(e) = run(args) {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut opts = Options::load(&args.config)?;
    if let Some(dir) = args.match_dir {
        opts.match_dir = dir;
    }
    if let Some(dir) = args.docs_dir {
        opts.docs_dir = dir;
    }

    let (event_tx, event_rx) = unbounded();
    let control = Control::new(opts, event_tx);

    // 組み込みエンジンを両スロットに置く。外部エンジンを繋ぐときは
    // ここを差し替える。
    control.set_primary_engine(Box::new(MaterialEngine::new()));
    control.set_secondary_engine(Box::new(MaterialEngine::new()));

    let shutdown = Arc::new(AtomicBool::new(false));
    let supervisor_handle = Supervisor::spawn(Arc::clone(&control), Arc::clone(&shutdown))?;

    let (cmd_tx, cmd_rx) = unbounded::<String>();
    let stdin_handle = spawn_stdin_reader(cmd_tx)?;

    println!("rcheckers ready. type 'help' for commands.");
    control.show_board();

    loop {
        select! {
            recv(cmd_rx) -> line => {
                let Ok(line) = line else {
                    log::debug!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(cmd) => handle_command(&control, cmd),
                    Err(e) => println!("{e}"),
                }
            }
            recv(event_rx) -> event => {
                if let Ok(event) = event {
                    print_event(event);
                }
            }
            default(Duration::from_millis(10)) => {}
        }
    }

    // Clean shutdown: stop workers, then join the helper threads
    shutdown.store(true, Ordering::Release);
    control.search.abort_and_wait();
    control.animation.cancel_and_wait();
    match supervisor_handle.join() {
        Ok(()) => log::debug!("supervisor joined"),
        Err(_) => log::error!("supervisor thread panicked"),
    }
    drop(control);
    // stdin reader は EOF まで走り続けるのでデタッチのまま残す
    drop(stdin_handle);
    Ok(())
}

fn handle_command(control: &Arc<Control>, cmd: Command) {
    match cmd {
        Command::Move { from, to } => {
            control.user_move(from, to);
        }
        Command::Play => control.play(),
        Command::PlayNow => control.interrupt(),
        Command::Abort => control.abort_engine(),
        Command::Back => control.take_back(),
        Command::Forward => control.forward(),
        Command::BackAll => control.back_all(),
        Command::ForwardAll => control.forward_all(),
        Command::New => control.new_game(),
        Command::Fen(fen) => {
            control.load_fen(&fen);
        }
        Command::Comment(text) => control.comment_last_move(&text),
        Command::Mode(mode) => control.set_mode(mode),
        Command::Engine(id) => control.select_engine(id),
        Command::EngineCommand(text) => println!("{}", control.engine_command(&text)),
        Command::BookDelete => control.book_delete(),
        Command::Clocks => control.emit_clocks(),
        Command::Show => control.show_board(),
        Command::Help => println!("{HELP_TEXT}"),
        Command::Quit => unreachable!("handled by the caller"),
    }
}

fn print_event(event: UiEvent) {
    match event {
        UiEvent::Status(text) => println!("status: {text}"),
        UiEvent::BoardChanged { board, side_to_move } => {
            println!("{board}{side_to_move:?} to move");
        }
        UiEvent::AnimationFrame { record, step, steps } => {
            log::debug!("animating {record} ({step}/{steps})");
        }
        UiEvent::Clocks { black_ms, white_ms } => {
            println!("clocks: black {} white {}", format_clock_ms(black_ms), format_clock_ms(white_ms));
        }
        UiEvent::ModeChanged(mode) => println!("mode: {}", mode.label()),
        UiEvent::GameOver(reason) => println!("game over: {reason}"),
    }
}
