//! Search worker
//!
//! Runs exactly one engine invocation at a time on its own thread. The
//! `searching` flag is raised before the thread spawns and cleared only
//! after result post-processing, so the supervisor never dispatches a
//! second search while one is in flight. Cancellation is cooperative:
//! the engine polls the token at its own granularity and the bounded
//! wait in `abort_and_wait` is best effort only.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rcheckers_core::{Board, MoveRecord, generate_moves};
use rcheckers_engine::{CancelToken, ResultCode, SearchParams, TimeArgs};

use crate::animation::AnimationWorker;
use crate::book::UserBook;
use crate::config::{GT_ENGLISH, Options};
use crate::events::{EventSender, UiEvent, emit};
use crate::mode::{Mode, ModeController};
use crate::session::{EngineId, EngineSlots, Session};
use crate::status::WorkerStatus;
use crate::testset;
use crate::utils::lock_or_recover;

/// Poll interval while waiting for a busy search to quiesce
const QUIESCE_POLL: Duration = Duration::from_millis(10);

/// Match the engine's returned board against the legal candidates.
///
/// First match in generation order wins. Two distinct legal moves can in
/// principle produce identical boards in exotic positions; the tie-break
/// is deliberate and covered by a test rather than resolved silently.
pub fn reconcile(
    board_before: &Board,
    candidates: &[MoveRecord],
    engine_board: &Board,
) -> Option<MoveRecord> {
    for candidate in candidates {
        let mut work = board_before.clone();
        work.apply(candidate);
        if work == *engine_board {
            return Some(candidate.clone());
        }
    }
    None
}

pub struct SearchWorker {
    status: Arc<WorkerStatus>,
    cancel: CancelToken,
    session: Arc<Mutex<Session>>,
    engines: Arc<Mutex<EngineSlots>>,
    book: Arc<Mutex<UserBook>>,
    animation: Arc<AnimationWorker>,
    mode: Arc<ModeController>,
    events: EventSender,
    opts: Arc<Options>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SearchWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        status: Arc<WorkerStatus>,
        session: Arc<Mutex<Session>>,
        engines: Arc<Mutex<EngineSlots>>,
        book: Arc<Mutex<UserBook>>,
        animation: Arc<AnimationWorker>,
        mode: Arc<ModeController>,
        events: EventSender,
        opts: Arc<Options>,
    ) -> Self {
        Self {
            status,
            cancel: CancelToken::new(),
            session,
            engines,
            book,
            animation,
            mode,
            events,
            opts,
            handle: Mutex::new(None),
        }
    }

    /// Start a search, or turn the request into a play-now interrupt when
    /// a worker is already busy. This is the only place a search starts.
    pub fn try_start(self: &Arc<Self>) -> bool {
        if self.status.searching() || self.status.animating() {
            // The request degrades to an interrupt; no worker will start,
            // so the pending-start flag must not stay latched.
            self.status.set_starting(false);
            self.interrupt();
            return false;
        }
        self.reclaim();
        self.status.set_searching(true);
        self.status.set_starting(false);
        self.cancel.clear();

        let worker = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("search-worker".to_string())
            .spawn(move || worker.search_main());
        match spawned {
            Ok(handle) => {
                *lock_or_recover(&self.handle) = Some(handle);
                true
            }
            Err(e) => {
                log::error!("failed to spawn search thread: {e}");
                self.finish();
                false
            }
        }
    }

    /// Tell the engine to stop thinking and play its current best move
    pub fn interrupt(&self) {
        if self.status.searching() {
            self.cancel.request_play_now();
        }
    }

    /// Tell the engine to stop thinking and discard the result
    pub fn abort(&self) {
        if self.status.searching() {
            self.cancel.request_abort();
        }
    }

    /// Abort and wait up to `cancel_wait_ms` for the worker to quiesce.
    /// Returns false when the bound elapsed and the caller proceeds into
    /// the documented inconsistency window: the in-flight worker may
    /// still touch shared state shortly after.
    pub fn abort_and_wait(&self) -> bool {
        if !self.status.searching() {
            return true;
        }
        self.cancel.request_abort();
        let bound = Duration::from_millis(self.opts.cancel_wait_ms);
        let t0 = Instant::now();
        while self.status.searching() {
            if t0.elapsed() >= bound {
                log::warn!(
                    "search did not quiesce within {bound:?}; conflicting action proceeds anyway"
                );
                return false;
            }
            std::thread::sleep(QUIESCE_POLL);
        }
        self.reclaim();
        true
    }

    fn reclaim(&self) {
        let mut slot = lock_or_recover(&self.handle);
        if slot.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = slot.take() {
                let _ = handle.join();
            }
        }
    }

    fn finish(&self) {
        self.status.set_searching(false);
        self.status.set_starting(false);
    }

    fn set_status(&self, text: &str) {
        let mut session = lock_or_recover(&self.session);
        session.status = text.to_string();
        emit(&self.events, UiEvent::Status(text.to_string()));
    }

    /// Worker thread body: time settlement, terminal check, user book
    /// probe, engine call, clock settlement, move reconciliation,
    /// commit + animation hand-off.
    fn search_main(&self) {
        let mode = self.mode.current();
        let opts = &self.opts;

        // The human just moved: settle their clock before thinking starts.
        // At game start no move precedes the search, nothing to settle.
        if opts.use_incremental_time && mode != Mode::EngineMatch {
            let mut session = lock_or_recover(&self.session);
            if session.timeline.cursor() > 0 {
                let mover = session.color.opponent();
                let elapsed = session.clock.elapsed_in_turn();
                session.clock.charge(mover, elapsed);
            }
        }

        let (board_before, side, reset_history, engine_id) = {
            let session = lock_or_recover(&self.session);
            (
                session.board.clone(),
                session.color,
                session.reset_move_history,
                session.current_engine,
            )
        };

        // Zero legal moves is terminal for the side to move
        let candidates = generate_moves(&board_before, side);
        if candidates.is_empty() {
            if mode.is_automatic() {
                let mut session = lock_or_recover(&self.session);
                session.gameover = true;
                session.status = "game over".to_string();
                emit(&self.events, UiEvent::Status(session.status.clone()));
                emit(&self.events, UiEvent::GameOver("no move in this position".to_string()));
            } else {
                self.set_status("there is no move in this position");
            }
            self.finish();
            return;
        }

        // User book probe bypasses the engine entirely
        let mut found: Option<MoveRecord> = None;
        let mut status_text = String::new();
        if opts.user_book {
            let book = lock_or_recover(&self.book);
            if let Some(mv) = book.lookup(&board_before.bitpos()) {
                found = Some(mv);
                status_text = "found move in user book".to_string();
            }
        }

        if found.is_none() {
            match self.run_engine(mode, &board_before, side, reset_history, engine_id, &candidates)
            {
                Some((engine_move, text)) => {
                    found = engine_move;
                    status_text = text;
                }
                None => {
                    // no engine defined or engine failure, already reported
                    self.finish();
                    return;
                }
            }
        }

        let commit = !mode.is_annotate_only() && !self.cancel.aborted();

        if commit {
            if let Some(record) = found {
                {
                    let mut session = lock_or_recover(&self.session);
                    session.timeline.append(record.clone());
                    if opts.add_comment {
                        if let Some(entry) = session.timeline.last_played_mut() {
                            entry.comment = status_text.clone();
                        }
                    }
                    session.status = status_text.clone();
                }
                emit(&self.events, UiEvent::Status(status_text.clone()));
                // the animation applies the board mutation exactly once
                self.animation.play(record);
            } else {
                self.set_status(&status_text);
            }
        } else {
            self.set_status(&status_text);
        }

        // Analysis modes attach the status string to the move played from
        // this position instead of committing anything.
        if matches!(mode, Mode::AnalyzeGame | Mode::AnalyzePdnBatch) && candidates.len() > 1 {
            let mut session = lock_or_recover(&self.session);
            let cursor = session.timeline.cursor();
            if let Some(entry) = session.timeline.entry_mut(cursor) {
                entry.annotation = status_text.clone();
            }
        }

        if mode == Mode::RunTestSet {
            if let Err(e) = testset::append_log(&opts.testlog_path(), &status_text) {
                log::error!("could not update test log: {e}");
            }
        }

        {
            let mut session = lock_or_recover(&self.session);
            session.reset_move_history = false;
        }
        self.finish();
    }

    /// Engine invocation with time budgeting and reconciliation.
    /// Returns None when there is no usable engine reply (already
    /// reported); Some((move, status)) otherwise — move is None when the
    /// reply could not be matched against any legal candidate.
    fn run_engine(
        &self,
        mode: Mode,
        board_before: &Board,
        side: rcheckers_core::Color,
        reset_history: bool,
        engine_id: EngineId,
        candidates: &[MoveRecord],
    ) -> Option<(Option<MoveRecord>, String)> {
        let opts = &self.opts;

        let (mut budget_ms, time_args) = if opts.use_incremental_time {
            let session = lock_or_recover(&self.session);
            (
                session.clock.budget_ms(side),
                Some(TimeArgs {
                    remaining_ms: session.clock.remaining_ms(side),
                    increment_ms: session.clock.increment_ms,
                }),
            )
        } else {
            (opts.level_ms, None)
        };
        // Handicap match: the primary engine thinks on half time
        if mode == Mode::EngineMatch && opts.handicap && engine_id == EngineId::Primary {
            budget_ms = (budget_ms / 2).max(1);
        }

        let params = SearchParams {
            side,
            max_time_ms: budget_ms,
            reset_history,
            time_args,
        };

        {
            let mut session = lock_or_recover(&self.session);
            session.clock.begin_turn();
        }
        let started = Instant::now();
        let reply = {
            let mut engines = lock_or_recover(&self.engines);
            match engines.slot_mut(engine_id) {
                Some(engine) => engine.compute_move(board_before, &params, &self.cancel),
                None => {
                    self.set_status("error: no engine defined!");
                    return None;
                }
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        // Clock settlement happens strictly after the search returns and
        // before the next one can be dispatched.
        {
            let mut session = lock_or_recover(&self.session);
            if opts.use_incremental_time {
                session.clock.charge(side, elapsed_ms);
                if mode != Mode::EngineMatch {
                    // the human's clock starts running now
                    session.clock.begin_turn();
                }
            }
        }

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("engine failure: {e}");
                self.set_status(&format!("engine error: {e}"));
                return None;
            }
        };

        {
            let mut session = lock_or_recover(&self.session);
            session.last_result = reply.result;
        }

        // Match-style modes accept an explicit terminal claim
        if reply.result != ResultCode::Unknown
            && matches!(mode, Mode::EngineMatch | Mode::EngineVsEngine)
        {
            let mut session = lock_or_recover(&self.session);
            if let Some(entry) = session.timeline.last_played_mut() {
                entry.comment = format!("{} : gameover claimed", reply.status);
            }
            session.gameover = true;
            emit(&self.events, UiEvent::GameOver(reply.status.clone()));
        }

        if mode.is_annotate_only() || self.cancel.aborted() {
            return Some((None, reply.status));
        }

        if opts.gametype == GT_ENGLISH {
            match reconcile(board_before, candidates, &reply.board) {
                Some(record) => Some((Some(record), reply.status)),
                None => {
                    // no match: the shared board was never touched, so
                    // "restoring" it is simply not committing anything
                    let text =
                        format!("{} (engine board matched no legal move, no move made)", reply.status);
                    Some((None, text))
                }
            }
        } else {
            // rule variants report a structured move which is trusted
            Some((reply.mv, reply.status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcheckers_core::Color;

    #[test]
    fn test_reconcile_finds_unique_candidate() {
        let board = Board::start_position();
        let candidates = generate_moves(&board, Color::Black);
        let mut after = board.clone();
        after.apply(&candidates[3]);
        let found = reconcile(&board, &candidates, &after).unwrap();
        assert_eq!(found, candidates[3]);
    }

    #[test]
    fn test_reconcile_no_match_returns_none() {
        let board = Board::start_position();
        let candidates = generate_moves(&board, Color::Black);
        // エンジンが不正な盤面を返したケース
        let bogus = Board::empty();
        assert!(reconcile(&board, &candidates, &bogus).is_none());
        // 着手前の盤面そのものも一致しない
        assert!(reconcile(&board, &candidates, &board).is_none());
    }

    #[test]
    fn test_reconcile_ambiguity_takes_first_in_generation_order() {
        // 2 つの異なる合法手が同一の盤面を生む状況は稀だが規則変種に
        // よっては排除できない。candidates を直接構成して先勝ちを固定する。
        let (board, side) = Board::from_fen("B:W18,26:B15").unwrap();
        let real = generate_moves(&board, side);
        assert_eq!(real.len(), 1);
        let mut after = board.clone();
        after.apply(&real[0]);

        // 捕獲列の順序だけが違う第二候補: 別の MoveRecord だが適用結果は同一
        let mut twin = real[0].clone();
        twin.captures.reverse();
        assert_ne!(twin, real[0]);
        let mut twin_after = board.clone();
        twin_after.apply(&twin);
        assert_eq!(twin_after, after);

        let candidates = vec![real[0].clone(), twin];
        let found = reconcile(&board, &candidates, &after).unwrap();
        assert_eq!(found, candidates[0], "first match in generation order wins");
    }
}
