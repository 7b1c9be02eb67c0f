//! Orchestration integration tests
//!
//! Drive the front-end core end to end with scriptable fake engines:
//! dispatch gating, reconciliation, cancellation, mode protocols and the
//! match bookkeeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::unbounded;

use rcheckers_core::{Board, Color, Square, generate_moves};
use rcheckers_engine::{
    CancelToken, EngineAdapter, EngineError, ResultCode, SearchParams, SearchReply,
};
use rcheckers_front::control::Control;
use rcheckers_front::session::EngineId;
use rcheckers_front::supervisor::Supervisor;
use rcheckers_front::utils::lock_or_recover;
use rcheckers_front::{Mode, Options};

/// Scriptable engine for orchestration tests
struct FakeEngine {
    behavior: Behavior,
    calls: Arc<AtomicU32>,
    saw_cancel: Arc<AtomicBool>,
}

#[derive(Clone)]
enum Behavior {
    /// Instantly play the first legal move (reported via the board path)
    FirstLegal,
    /// Return a board that matches no legal candidate
    BogusBoard,
    /// Spin until cancelled, then report without a move
    SlowUntilCancelled,
    /// Play the first legal move, claiming a win on the nth call
    ClaimWinOnCall(u32),
    /// Sleep briefly, then play the first legal move
    Sleepy(Duration),
}

impl FakeEngine {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicU32::new(0)),
            saw_cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    fn probes(&self) -> (Arc<AtomicU32>, Arc<AtomicBool>) {
        (Arc::clone(&self.calls), Arc::clone(&self.saw_cancel))
    }

    fn first_legal_reply(board: &Board, params: &SearchParams, claim_win: bool) -> SearchReply {
        let moves = generate_moves(board, params.side);
        let Some(mv) = moves.first() else {
            return SearchReply {
                result: ResultCode::Loss,
                board: board.clone(),
                mv: None,
                status: "no move in this position".to_string(),
            };
        };
        let mut after = board.clone();
        after.apply(mv);
        let result = if claim_win {
            ResultCode::Win
        } else {
            ResultCode::Unknown
        };
        SearchReply {
            result,
            board: after,
            mv: Some(mv.clone()),
            status: format!("best={} depth=1 eval=+0", mv.notation()),
        }
    }
}

impl EngineAdapter for FakeEngine {
    fn compute_move(
        &mut self,
        board: &Board,
        params: &SearchParams,
        cancel: &CancelToken,
    ) -> Result<SearchReply> {
        let call = self.calls.fetch_add(1, Ordering::AcqRel) + 1;
        match &self.behavior {
            Behavior::FirstLegal => Ok(Self::first_legal_reply(board, params, false)),
            Behavior::ClaimWinOnCall(n) => {
                Ok(Self::first_legal_reply(board, params, call >= *n))
            }
            Behavior::BogusBoard => Ok(SearchReply {
                result: ResultCode::Unknown,
                board: Board::empty(),
                mv: None,
                status: "bogus reply".to_string(),
            }),
            Behavior::SlowUntilCancelled => {
                let t0 = Instant::now();
                while !cancel.play_now() {
                    if t0.elapsed() > Duration::from_secs(5) {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(2));
                }
                self.saw_cancel.store(cancel.play_now(), Ordering::Release);
                if cancel.aborted() {
                    Ok(SearchReply {
                        result: ResultCode::Unknown,
                        board: board.clone(),
                        mv: None,
                        status: "search aborted".to_string(),
                    })
                } else {
                    Ok(Self::first_legal_reply(board, params, false))
                }
            }
            Behavior::Sleepy(delay) => {
                std::thread::sleep(*delay);
                Ok(Self::first_legal_reply(board, params, false))
            }
        }
    }

    fn send_command(&mut self, command: &str) -> Result<String, EngineError> {
        match command.trim() {
            "name" => Ok("Fake 1.0".to_string()),
            other => Err(EngineError::Unsupported(other.to_string())),
        }
    }
}

fn test_options(dir: &std::path::Path) -> Options {
    Options {
        animation_ms: 0,
        user_book: false,
        level_ms: 50,
        cancel_wait_ms: 1_000,
        book_file: dir.join("book.json"),
        docs_dir: dir.join("docs"),
        match_dir: dir.join("match"),
        testset_file: dir.join("testset.txt"),
        games_db: dir.join("games.jsonl"),
        ..Options::default()
    }
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let t0 = Instant::now();
    while t0.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn wait_idle(control: &Control) -> bool {
    wait_until(Duration::from_secs(10), || !control.status.any_busy())
}

#[test]
fn search_commits_matching_move_and_timeline_grows() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = unbounded();
    let control = Control::new(test_options(dir.path()), tx);
    control.set_primary_engine(Box::new(FakeEngine::new(Behavior::FirstLegal)));

    control.play();
    assert!(wait_idle(&control));

    let session = lock_or_recover(&control.session);
    assert_eq!(session.timeline.len(), 1, "matched move must be committed");
    assert_ne!(session.board, Board::start_position());
    assert_eq!(session.color, Color::White);
    assert!(session.status.contains("best="));
}

#[test]
fn bogus_engine_board_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = unbounded();
    let control = Control::new(test_options(dir.path()), tx);
    control.set_primary_engine(Box::new(FakeEngine::new(Behavior::BogusBoard)));

    control.play();
    assert!(wait_idle(&control));

    let session = lock_or_recover(&control.session);
    assert_eq!(session.timeline.len(), 0);
    assert_eq!(session.board, Board::start_position());
    assert_eq!(session.color, Color::Black);
    assert!(session.status.contains("no move made"));
}

#[test]
fn missing_engine_is_reported_and_recoverable() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = unbounded();
    let control = Control::new(test_options(dir.path()), tx);

    control.play();
    assert!(wait_idle(&control));
    {
        let session = lock_or_recover(&control.session);
        assert!(session.status.contains("no engine defined"));
        assert_eq!(session.timeline.len(), 0);
    }

    // Recoverable: plugging an engine in makes the next request work
    control.set_primary_engine(Box::new(FakeEngine::new(Behavior::FirstLegal)));
    control.play();
    assert!(wait_idle(&control));
    assert_eq!(lock_or_recover(&control.session).timeline.len(), 1);
}

#[test]
fn zero_legal_moves_raises_gameover_in_automatic_mode() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = unbounded();
    let control = Control::new(test_options(dir.path()), tx);
    control.set_primary_engine(Box::new(FakeEngine::new(Behavior::FirstLegal)));

    // White to move with no legal move at all
    assert!(control.load_fen("W:W32:BK23,K27,K28"));
    control.set_mode(Mode::Autoplay);
    control.play();
    assert!(wait_idle(&control));

    let session = lock_or_recover(&control.session);
    assert!(session.gameover, "terminal position must raise the shared gameover flag");
    assert_eq!(session.timeline.len(), 0, "no move is appended");
}

#[test]
fn second_dispatch_while_busy_becomes_interrupt() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = unbounded();
    let control = Control::new(test_options(dir.path()), tx);
    let engine = FakeEngine::new(Behavior::SlowUntilCancelled);
    let (_calls, saw_cancel) = engine.probes();
    control.set_primary_engine(Box::new(engine));

    control.play();
    assert!(wait_until(Duration::from_secs(2), || control.status.searching()));

    // Dispatch while busy: no second worker starts, the engine is told
    // to play now instead.
    control.play();
    assert!(wait_idle(&control));
    assert!(saw_cancel.load(Ordering::Acquire), "engine must observe the play-now signal");
    // play-now keeps the result: the move was committed
    assert_eq!(lock_or_recover(&control.session).timeline.len(), 1);
}

#[test]
fn mode_transition_cancels_search_before_commit() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = unbounded();
    let control = Control::new(test_options(dir.path()), tx);
    let engine = FakeEngine::new(Behavior::SlowUntilCancelled);
    let (_calls, saw_cancel) = engine.probes();
    control.set_primary_engine(Box::new(engine));

    control.play();
    assert!(wait_until(Duration::from_secs(2), || control.status.searching()));

    control.set_mode(Mode::TwoPlayerEntry);
    assert_eq!(control.mode.current(), Mode::TwoPlayerEntry);
    assert!(saw_cancel.load(Ordering::Acquire), "transition must force cancellation first");
    assert!(wait_idle(&control));
    // abort-no-move: nothing was committed
    assert_eq!(lock_or_recover(&control.session).timeline.len(), 0);
}

#[test]
fn takeback_after_animated_move_restores_the_board() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = test_options(dir.path());
    opts.animation_ms = 150;
    let (tx, _rx) = unbounded();
    let control = Control::new(opts, tx);

    control.user_move(Square::new(11).unwrap(), Square::new(15).unwrap());
    // 巻き戻しはアニメーション完了を待ってから盤面を触る
    control.take_back();

    let session = lock_or_recover(&control.session);
    assert_eq!(session.board, Board::start_position());
    assert_eq!(session.timeline.cursor(), 0);
    assert_eq!(session.color, Color::Black);
}

#[test]
fn incremental_clock_charges_only_the_mover() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = test_options(dir.path());
    opts.use_incremental_time = true;
    opts.initial_time_ms = 10_000;
    opts.increment_ms = 2_000;
    let (tx, _rx) = unbounded();
    let control = Control::new(opts, tx);
    control.set_primary_engine(Box::new(FakeEngine::new(Behavior::Sleepy(
        Duration::from_millis(120),
    ))));

    let white_before = lock_or_recover(&control.session).clock.remaining_ms(Color::White);
    control.play();
    assert!(wait_idle(&control));

    let session = lock_or_recover(&control.session);
    let black_after = session.clock.remaining_ms(Color::Black);
    let white_after = session.clock.remaining_ms(Color::White);
    assert_eq!(white_after, white_before, "the non-moving side's clock is frozen");
    // remaining += increment - elapsed, elapsed >= 120ms
    assert!(black_after > 10_000, "increment outweighs the short think time");
    assert!(black_after <= 12_000 - 120, "elapsed time must be subtracted");
}

#[test]
fn normal_mode_supervisor_replies_to_user_move() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = unbounded();
    let control = Control::new(test_options(dir.path()), tx);
    control.set_primary_engine(Box::new(FakeEngine::new(Behavior::FirstLegal)));

    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = Supervisor::spawn(Arc::clone(&control), Arc::clone(&shutdown)).unwrap();

    control.user_move(Square::new(11).unwrap(), Square::new(15).unwrap());
    assert!(wait_until(Duration::from_secs(10), || {
        lock_or_recover(&control.session).timeline.len() >= 2
    }));
    let color = lock_or_recover(&control.session).color;
    assert_eq!(color, Color::Black, "engine replied for white");

    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();
}

#[test]
fn observe_mode_annotates_without_committing() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = unbounded();
    let control = Control::new(test_options(dir.path()), tx);
    let engine = FakeEngine::new(Behavior::FirstLegal);
    let (calls, _) = engine.probes();
    control.set_primary_engine(Box::new(engine));

    control.set_mode(Mode::ObserveGame);
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = Supervisor::spawn(Arc::clone(&control), Arc::clone(&shutdown)).unwrap();

    // newposition is true right after startup, so one search runs
    assert!(wait_until(Duration::from_secs(5), || calls.load(Ordering::Acquire) >= 1));
    assert!(wait_idle(&control));
    std::thread::sleep(Duration::from_millis(50));
    {
        let session = lock_or_recover(&control.session);
        assert_eq!(session.timeline.len(), 0, "observation never commits a move");
        assert_eq!(session.board, Board::start_position());
    }
    let before = calls.load(Ordering::Acquire);

    // a user move re-arms the observer exactly once
    control.user_move(Square::new(11).unwrap(), Square::new(15).unwrap());
    assert!(wait_until(Duration::from_secs(5), || {
        calls.load(Ordering::Acquire) > before
    }));

    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();
}

#[test]
fn analyze_game_annotates_moves_and_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = unbounded();
    let control = Control::new(test_options(dir.path()), tx);
    control.set_primary_engine(Box::new(FakeEngine::new(Behavior::FirstLegal)));

    // 3 手の短い対局を入力しておく
    for (from, to) in [(11, 15), (23, 19), (8, 11)] {
        assert!(control.user_move(Square::new(from).unwrap(), Square::new(to).unwrap()));
        assert!(wait_idle(&control));
    }

    control.set_mode(Mode::AnalyzeGame);
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = Supervisor::spawn(Arc::clone(&control), Arc::clone(&shutdown)).unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        control.mode.current() == Mode::Normal
    }));
    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();

    let session = lock_or_recover(&control.session);
    assert_eq!(session.timeline.len(), 3, "analysis must not change the game");
    for entry in session.timeline.entries() {
        assert!(
            !entry.annotation.is_empty(),
            "every move needs an annotation, missing on {}",
            entry.notation
        );
    }
    let report_path = control.opts.analysis_path(1);
    assert!(report_path.exists(), "analysis report must be written");
}

#[test]
fn engine_vs_engine_alternates_and_stops_on_claim() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = unbounded();
    let control = Control::new(test_options(dir.path()), tx);
    let primary = FakeEngine::new(Behavior::ClaimWinOnCall(2));
    let secondary = FakeEngine::new(Behavior::ClaimWinOnCall(2));
    let (primary_calls, _) = primary.probes();
    let (secondary_calls, _) = secondary.probes();
    control.set_primary_engine(Box::new(primary));
    control.set_secondary_engine(Box::new(secondary));

    control.set_mode(Mode::EngineVsEngine);
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = Supervisor::spawn(Arc::clone(&control), Arc::clone(&shutdown)).unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        control.mode.current() == Mode::Normal
    }));
    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();

    assert!(primary_calls.load(Ordering::Acquire) >= 1);
    assert!(secondary_calls.load(Ordering::Acquire) >= 1, "engines must alternate");
    let session = lock_or_recover(&control.session);
    assert!(session.timeline.len() >= 2);
    assert_eq!(session.current_engine, EngineId::Primary, "primary restored after the game");
}

#[test]
fn engine_match_plays_schedule_and_checkpoints_stats() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = test_options(dir.path());
    opts.max_game_moves = 6;
    let openings_path = dir.path().join("openings.txt");
    std::fs::write(&openings_path, "old 14th: 11-15 23-19 8-11\n").unwrap();
    opts.openings_file = Some(openings_path);
    let (tx, _rx) = unbounded();
    let control = Control::new(opts, tx);
    control.set_primary_engine(Box::new(FakeEngine::new(Behavior::FirstLegal)));
    control.set_secondary_engine(Box::new(FakeEngine::new(Behavior::FirstLegal)));

    control.set_mode(Mode::EngineMatch);
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = Supervisor::spawn(Arc::clone(&control), Arc::clone(&shutdown)).unwrap();

    assert!(
        wait_until(Duration::from_secs(30), || control.mode.current() == Mode::Normal),
        "match must end when the schedule is exhausted"
    );
    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();

    // 1 opening, played twice with colors swapped
    let stats = rcheckers_front::stats::MatchStats::load(&control.opts.stats_path()).unwrap();
    assert_eq!(stats.games(), 2);
    assert_eq!(
        stats.wins + stats.losses + stats.draws + stats.unknowns,
        stats.games()
    );
    // both games hit the move cap and count as unknown
    assert_eq!(stats.unknowns, 2);

    let progress = std::fs::read_to_string(control.opts.progress_path()).unwrap();
    assert_eq!(progress, "??");
    let games = rcheckers_front::gamestore::load_games(&control.opts.match_games_path()).unwrap();
    assert_eq!(games.len(), 2);
    assert!(games[0].moves.len() >= 3, "opening plies are part of the stored game");
}

#[test]
fn testset_mode_replays_every_position_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let opts = test_options(dir.path());
    std::fs::write(&opts.testset_file, "B:W28:B1\nW:W21,22:B4\n").unwrap();
    let (tx, _rx) = unbounded();
    let control = Control::new(opts, tx);
    let engine = FakeEngine::new(Behavior::FirstLegal);
    let (calls, _) = engine.probes();
    control.set_primary_engine(Box::new(engine));

    control.set_mode(Mode::RunTestSet);
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = Supervisor::spawn(Arc::clone(&control), Arc::clone(&shutdown)).unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        control.mode.current() == Mode::Normal
    }));
    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();

    assert_eq!(calls.load(Ordering::Acquire), 2, "one search per test position");
    let log = std::fs::read_to_string(control.opts.testlog_path()).unwrap();
    assert!(log.contains("#1: B:W28:B1"));
    assert!(log.contains("#2: W:W21,22:B4"));
    assert!(log.contains("best="), "engine status lines are logged");
}
