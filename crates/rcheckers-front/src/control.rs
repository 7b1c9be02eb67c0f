//! コマンドディスパッチャ
//!
//! 入力ハンドラ（stdin）とスーパーバイザの両方がここを通って状態を
//! 動かす。エンジンの起動は SearchWorker::try_start の 1 箇所だけ。
//! 盤面を書き換える操作は必ず「探索の上限付き中断 → アニメーション
//! 完了待ち」の順で排他してから進む。

use std::sync::{Arc, Mutex};

use rcheckers_core::{Board, Color, Square, generate_moves};
use rcheckers_engine::EngineAdapter;

use crate::animation::AnimationWorker;
use crate::book::{BookAddOutcome, UserBook};
use crate::config::Options;
use crate::events::{EventSender, UiEvent, emit};
use crate::mode::{Mode, ModeController, TransitionCtx};
use crate::search::SearchWorker;
use crate::session::{EngineId, EngineSlots, Session};
use crate::status::WorkerStatus;
use crate::utils::lock_or_recover;

pub struct Control {
    pub session: Arc<Mutex<Session>>,
    pub status: Arc<WorkerStatus>,
    pub mode: Arc<ModeController>,
    pub search: Arc<SearchWorker>,
    pub animation: Arc<AnimationWorker>,
    pub engines: Arc<Mutex<EngineSlots>>,
    pub book: Arc<Mutex<UserBook>>,
    pub events: EventSender,
    pub opts: Arc<Options>,
}

impl Control {
    pub fn new(opts: Options, events: EventSender) -> Arc<Self> {
        let opts = Arc::new(opts);
        let status = Arc::new(WorkerStatus::new());
        let session = Arc::new(Mutex::new(Session::new(
            opts.initial_time_ms,
            opts.increment_ms,
        )));
        let engines = Arc::new(Mutex::new(EngineSlots::default()));
        let book = match UserBook::load(&opts.book_file) {
            Ok(book) => Arc::new(Mutex::new(book)),
            Err(e) => {
                log::error!("could not load user book: {e}");
                Arc::new(Mutex::new(UserBook::new()))
            }
        };
        let mode = Arc::new(ModeController::new());
        let animation = Arc::new(AnimationWorker::new(
            Arc::clone(&status),
            Arc::clone(&session),
            events.clone(),
            opts.animation_ms,
        ));
        let search = Arc::new(SearchWorker::new(
            Arc::clone(&status),
            Arc::clone(&session),
            Arc::clone(&engines),
            Arc::clone(&book),
            Arc::clone(&animation),
            Arc::clone(&mode),
            events.clone(),
            Arc::clone(&opts),
        ));
        Arc::new(Self {
            session,
            status,
            mode,
            search,
            animation,
            engines,
            book,
            events,
            opts,
        })
    }

    pub fn set_primary_engine(&self, engine: Box<dyn EngineAdapter>) {
        lock_or_recover(&self.engines).primary = Some(engine);
    }

    pub fn set_secondary_engine(&self, engine: Box<dyn EngineAdapter>) {
        lock_or_recover(&self.engines).secondary = Some(engine);
    }

    fn set_status(&self, text: String) {
        let mut session = lock_or_recover(&self.session);
        session.status = text.clone();
        emit(&self.events, UiEvent::Status(text));
    }

    fn emit_board(&self) {
        let session = lock_or_recover(&self.session);
        emit(
            &self.events,
            UiEvent::BoardChanged {
                board: session.board.clone(),
                side_to_move: session.color,
            },
        );
    }

    /// MOVESPLAY: エンジンを起動する。既に忙しければ play-now 割り込み。
    pub fn play(&self) {
        self.search.try_start();
    }

    /// INTERRUPTENGINE: 今すぐ指させる
    pub fn interrupt(&self) {
        self.search.interrupt();
    }

    /// ABORTENGINE: 結果を捨てて止めさせる（待たない）
    pub fn abort_engine(&self) {
        self.search.abort();
    }

    /// MOVESBACK: 1 手戻す
    pub fn take_back(&self) {
        let mode = self.mode.current();
        // 観戦モードは打ち切りではなく play-now で止める
        if mode == Mode::ObserveGame {
            self.search.interrupt();
        } else {
            self.search.abort_and_wait();
        }
        // 再生中の巻き戻しは必ず完了を待つ
        self.animation.cancel_and_wait();

        if mode == Mode::BookView {
            self.book_nav(-1);
            return;
        }

        let mut session = lock_or_recover(&self.session);
        if session.timeline.cursor() == 0
            && matches!(mode, Mode::AnalyzeGame | Mode::AnalyzePdnBatch)
        {
            session.gameover = true;
        }

        if session.timeline.cursor() > 0 {
            let (notation, comment) = {
                let Session { board, timeline, .. } = &mut *session;
                let entry = timeline.step_back(board).unwrap();
                (entry.notation.clone(), entry.comment.clone())
            };
            let index = session.timeline.cursor();
            let number = session.timeline.move_number(index);
            let second = session.timeline.is_second_player(index);
            session.color = session.color.opponent();
            let dots = if second { "..." } else { "." };
            let mut text = format!("takeback: {number}{dots} {notation}");
            if !comment.is_empty() {
                text.push(' ');
                text.push_str(&comment);
            }
            session.status = text.clone();
            session.newposition = true;
            session.reset_move_history = true;
            drop(session);
            emit(&self.events, UiEvent::Status(text));
            self.emit_board();
        } else {
            session.status = "Takeback not possible: you are at the start of the game!".to_string();
            let text = session.status.clone();
            session.newposition = true;
            session.reset_move_history = true;
            drop(session);
            emit(&self.events, UiEvent::Status(text));
        }
    }

    /// MOVESFORWARD: 1 手進める
    pub fn forward(&self) {
        let mode = self.mode.current();
        self.search.abort_and_wait();
        self.animation.cancel_and_wait();

        if mode == Mode::BookView {
            self.book_nav(1);
            return;
        }

        let mut session = lock_or_recover(&self.session);
        let stepped = {
            let Session { board, timeline, .. } = &mut *session;
            timeline
                .step_forward(board)
                .map(|entry| (entry.notation.clone(), entry.comment.clone()))
        };
        match stepped {
            Some((notation, comment)) => {
                session.color = session.color.opponent();
                let index = session.timeline.cursor() - 1;
                let number = session.timeline.move_number(index);
                let second = session.timeline.is_second_player(index);
                let dots = if second { "..." } else { "." };
                let mut text = format!("{number}{dots} {notation}");
                if !comment.is_empty() {
                    text.push(' ');
                    text.push_str(&comment);
                }
                session.status = text.clone();
                session.newposition = true;
                session.reset_move_history = true;
                drop(session);
                emit(&self.events, UiEvent::Status(text));
                self.emit_board();
                if mode == Mode::ObserveGame {
                    self.search.interrupt();
                }
            }
            None => {
                session.status = "Forward not possible: End of game".to_string();
                let text = session.status.clone();
                drop(session);
                emit(&self.events, UiEvent::Status(text));
            }
        }
    }

    /// MOVESBACKALL
    pub fn back_all(&self) {
        let mode = self.mode.current();
        if matches!(mode, Mode::BookView | Mode::BookAdd) {
            return;
        }
        self.search.abort_and_wait();
        self.animation.cancel_and_wait();

        let mut session = lock_or_recover(&self.session);
        {
            let Session { board, timeline, color, .. } = &mut *session;
            while timeline.step_back(board).is_some() {
                *color = color.opponent();
            }
        }
        session.status = "you are now at the start of the game".to_string();
        session.newposition = true;
        session.reset_move_history = true;
        let text = session.status.clone();
        drop(session);
        emit(&self.events, UiEvent::Status(text));
        self.emit_board();
        if mode == Mode::ObserveGame {
            self.search.interrupt();
        }
    }

    /// MOVESFORWARDALL
    pub fn forward_all(&self) {
        let mode = self.mode.current();
        if matches!(mode, Mode::BookView | Mode::BookAdd) {
            return;
        }
        self.search.abort_and_wait();
        self.animation.cancel_and_wait();

        let mut session = lock_or_recover(&self.session);
        {
            let Session { board, timeline, color, .. } = &mut *session;
            while timeline.step_forward(board).is_some() {
                *color = color.opponent();
            }
        }
        session.status = "you are now at the end of the game".to_string();
        session.newposition = true;
        session.reset_move_history = true;
        let text = session.status.clone();
        drop(session);
        emit(&self.events, UiEvent::Status(text));
        self.emit_board();
        if mode == Mode::ObserveGame {
            self.search.interrupt();
        }
    }

    /// ユーザーブック閲覧のカーソル移動。ロックは常に session → book の順。
    fn book_nav(&self, delta: i64) {
        let mut session = lock_or_recover(&self.session);
        let book = lock_or_recover(&self.book);
        if book.is_empty() {
            session.status = "user book is empty".to_string();
            let text = session.status.clone();
            drop(book);
            drop(session);
            emit(&self.events, UiEvent::Status(text));
            return;
        }
        let cursor = session.book_cursor;
        let next = if delta < 0 {
            cursor.saturating_sub(1)
        } else {
            (cursor + 1).min(book.len() - 1)
        };
        session.book_cursor = next;
        if let Some(entry) = book.entry(next) {
            session.board = Board::from_bitpos(&entry.pos);
            session.status = book.describe(next);
        }
        let text = session.status.clone();
        drop(book);
        drop(session);
        emit(&self.events, UiEvent::Status(text));
        self.emit_board();
    }

    /// 人間の着手。from/to に一致する合法手を探して確定する。
    pub fn user_move(&self, from: Square, to: Square) -> bool {
        let mode = self.mode.current();
        // エンジン・アニメーションが動作中は入力を受けない（観戦を除く）
        if (self.status.searching() || self.status.animating()) && mode != Mode::ObserveGame {
            self.set_status("input ignored: a worker is busy".to_string());
            return false;
        }

        let record = {
            let mut session = lock_or_recover(&self.session);
            let candidates = generate_moves(&session.board, session.color);
            let Some(record) = candidates.into_iter().find(|m| m.from == from && m.to == to)
            else {
                session.status = format!("{from}-{to} is not a legal move");
                let text = session.status.clone();
                drop(session);
                emit(&self.events, UiEvent::Status(text));
                return false;
            };
            session.timeline.append(record.clone());
            session.newposition = true;
            record
        };

        // ブック登録モードでは着手前局面をキーに保存する
        if mode == Mode::BookAdd {
            let pos = lock_or_recover(&self.session).board.bitpos();
            let mut book = lock_or_recover(&self.book);
            let outcome = book.add(pos, record.clone());
            let text = match outcome {
                BookAddOutcome::Added(n) => format!("added move to user book ({n} moves)"),
                BookAddOutcome::Replaced(n) => format!("replaced move in user book ({n} moves)"),
                BookAddOutcome::Full => "user book size limit reached!".to_string(),
            };
            if outcome != BookAddOutcome::Full {
                if let Err(e) = book.save(&self.opts.book_file) {
                    log::error!("unable to write to user book: {e}");
                    self.set_status("unable to write to user book".to_string());
                } else {
                    self.set_status(text);
                }
            } else {
                self.set_status(text);
            }
        }

        // animating が立ってから startengine を立てる。逆順だと
        // スーパーバイザが着手の反映前に探索を始めてしまう。
        self.animation.play(record);
        if mode == Mode::Normal {
            lock_or_recover(&self.session).startengine = true;
        }
        if mode == Mode::ObserveGame {
            self.search.interrupt();
        }
        true
    }

    /// 新規対局
    pub fn new_game(&self) {
        self.search.abort_and_wait();
        self.animation.cancel_and_wait();
        let mut session = lock_or_recover(&self.session);
        session.reset_game(self.opts.initial_time_ms);
        drop(session);
        self.set_status("new game".to_string());
        self.emit_board();
    }

    /// FEN で与えられた局面から開始する（セットアップ確定に相当）
    pub fn load_fen(&self, fen: &str) -> bool {
        self.search.abort_and_wait();
        self.animation.cancel_and_wait();
        match Board::from_fen(fen) {
            Ok((board, side)) => {
                let mut session = lock_or_recover(&self.session);
                session.reset_to_position(board, side, fen.trim().to_string(), self.opts.initial_time_ms);
                drop(session);
                self.set_status(format!("position set, {} to move", side_name(side)));
                self.emit_board();
                true
            }
            Err(e) => {
                self.set_status(format!("bad FEN: {e}"));
                false
            }
        }
    }

    /// 直前の手へのコメント付与
    pub fn comment_last_move(&self, text: &str) {
        let mut session = lock_or_recover(&self.session);
        match session.timeline.last_played_mut() {
            Some(entry) => {
                entry.comment = text.to_string();
                drop(session);
                self.set_status("comment added".to_string());
            }
            None => {
                drop(session);
                self.set_status("no move to comment".to_string());
            }
        }
    }

    /// モード遷移。常に探索キャンセルが先行する。
    pub fn set_mode(&self, new_mode: Mode) {
        let ctx = TransitionCtx {
            search: &self.search,
            animation: &self.animation,
            session: &self.session,
            book: &self.book,
            events: &self.events,
        };
        self.mode.request_transition(new_mode, &ctx);

        // マッチの早指し設定ではアニメーションを省く
        let enabled = if new_mode == Mode::EngineMatch {
            if self.opts.use_incremental_time {
                self.opts.initial_time_ms / 30 + self.opts.increment_ms > 1_500
            } else {
                self.opts.level_ms > 1_000
            }
        } else {
            true
        };
        self.animation.set_enabled(enabled);
    }

    /// 使用エンジンの切り替え
    pub fn select_engine(&self, id: EngineId) {
        self.search.abort_and_wait();
        let mut session = lock_or_recover(&self.session);
        session.current_engine = id;
        session.reset_move_history = true;
        drop(session);
        let name = self.engine_name(id);
        self.set_status(format!("current engine: {name}"));
    }

    /// エンジンへのテキストコマンド。未対応は「機能なし」であって
    /// エラーではない。
    pub fn engine_command(&self, command: &str) -> String {
        let id = lock_or_recover(&self.session).current_engine;
        let Ok(mut engines) = self.engines.try_lock() else {
            return "engine is busy".to_string();
        };
        match engines.slot_mut(id) {
            None => "error: no engine defined!".to_string(),
            Some(engine) => match engine.send_command(command) {
                Ok(reply) => reply,
                Err(rcheckers_engine::EngineError::Unsupported(cmd)) => {
                    format!("feature not available: {cmd}")
                }
                Err(e) => format!("engine command failed: {e}"),
            },
        }
    }

    /// 現局面のエントリをユーザーブックから消す
    pub fn book_delete(&self) {
        let pos = lock_or_recover(&self.session).board.bitpos();
        let mut book = lock_or_recover(&self.book);
        if book.remove(&pos) {
            if let Err(e) = book.save(&self.opts.book_file) {
                log::error!("unable to write to user book: {e}");
            }
            let text = format!("removed position from user book ({} moves)", book.len());
            drop(book);
            self.set_status(text);
        } else {
            drop(book);
            self.set_status("position not found in user book".to_string());
        }
    }

    pub fn engine_name(&self, id: EngineId) -> String {
        match self.engines.try_lock() {
            Ok(mut engines) => match engines.slot_mut(id) {
                Some(engine) => engine.name(),
                None => "no engine".to_string(),
            },
            Err(_) => "engine busy".to_string(),
        }
    }

    /// 時計表示の更新イベントを流す
    pub fn emit_clocks(&self) {
        let session = lock_or_recover(&self.session);
        let (black_ms, white_ms) = session.clock.instantaneous(session.color);
        emit(&self.events, UiEvent::Clocks { black_ms, white_ms });
    }

    /// 盤面表示イベントを流す
    pub fn show_board(&self) {
        self.emit_board();
    }
}

fn side_name(side: Color) -> &'static str {
    match side {
        Color::Black => "black",
        Color::White => "white",
    }
}
