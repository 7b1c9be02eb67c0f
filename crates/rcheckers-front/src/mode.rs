//! モード状態機械
//!
//! モードは閉じた 1 つの enum で、遷移は ModeController::request_transition
//! だけが行う。遷移は必ず先に探索キャンセル（上限付き待機）を済ませて
//! からコミットし、その後に入場側の副作用を実行する。ワーカーが走って
//! いても遷移自体は拒否されない: ブロックされるのはコミットであって
//! リクエストではない。

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use rcheckers_core::Board;

use crate::events::{EventSender, UiEvent, emit};
use crate::utils::lock_or_recover;

/// フロントエンドの動作モード。常にちょうど 1 つが有効。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// 人間 vs エンジン
    Normal,
    /// 両側とも人間が入力する（棋譜入力）
    TwoPlayerEntry,
    /// エンジンが自分と連続対局する
    Autoplay,
    /// オープニングスケジュールを使った 2 エンジンのマッチ
    EngineMatch,
    /// 1 局だけの 2 エンジン対局
    EngineVsEngine,
    /// 読み込んだ棋譜を 1 手ずつ解析する
    AnalyzeGame,
    /// 保存された複数棋譜を順に解析する
    AnalyzePdnBatch,
    /// 盤面の変化を監視して注釈だけ付ける（指さない）
    ObserveGame,
    /// ユーザーブックの閲覧
    BookView,
    /// ユーザーブックへの登録
    BookAdd,
    /// テストセットの連続実行
    RunTestSet,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::TwoPlayerEntry => "2player",
            Mode::Autoplay => "autoplay",
            Mode::EngineMatch => "match",
            Mode::EngineVsEngine => "enginegame",
            Mode::AnalyzeGame => "analyze",
            Mode::AnalyzePdnBatch => "analyzepdn",
            Mode::ObserveGame => "observe",
            Mode::BookView => "bookview",
            Mode::BookAdd => "bookadd",
            Mode::RunTestSet => "testset",
        }
    }

    pub fn parse(text: &str) -> Option<Mode> {
        match text.trim() {
            "normal" => Some(Mode::Normal),
            "2player" => Some(Mode::TwoPlayerEntry),
            "autoplay" => Some(Mode::Autoplay),
            "match" => Some(Mode::EngineMatch),
            "enginegame" => Some(Mode::EngineVsEngine),
            "analyze" => Some(Mode::AnalyzeGame),
            "analyzepdn" => Some(Mode::AnalyzePdnBatch),
            "observe" => Some(Mode::ObserveGame),
            "bookview" => Some(Mode::BookView),
            "bookadd" => Some(Mode::BookAdd),
            "testset" => Some(Mode::RunTestSet),
            _ => None,
        }
    }

    /// 自動進行モード（gameover シグナルで終局を扱うモード）か
    pub fn is_automatic(self) -> bool {
        matches!(
            self,
            Mode::Autoplay | Mode::EngineMatch | Mode::EngineVsEngine
        )
    }

    /// 探索結果を盤に反映しないモードか（観戦・解析）
    pub fn is_annotate_only(self) -> bool {
        matches!(
            self,
            Mode::ObserveGame | Mode::AnalyzeGame | Mode::AnalyzePdnBatch
        )
    }
}

/// 遷移時の副作用で必要になる共有物
pub struct TransitionCtx<'a> {
    pub search: &'a crate::search::SearchWorker,
    pub animation: &'a crate::animation::AnimationWorker,
    pub session: &'a Mutex<crate::session::Session>,
    pub book: &'a Mutex<crate::book::UserBook>,
    pub events: &'a EventSender,
}

/// モード値の唯一の所有者
pub struct ModeController {
    mode: Mutex<Mode>,
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeController {
    pub fn new() -> Self {
        Self {
            mode: Mutex::new(Mode::Normal),
        }
    }

    pub fn current(&self) -> Mode {
        *lock_or_recover(&self.mode)
    }

    /// モードを遷移する。必ず探索のキャンセルを先に済ませる。
    pub fn request_transition(&self, new_mode: Mode, ctx: &TransitionCtx<'_>) {
        // 走っている探索を止める（上限付き待機。超過したら進む）
        ctx.search.abort_and_wait();
        // 入場副作用が盤面を書き換えるモードがあるため、アニメーションも畳む
        ctx.animation.cancel_and_wait();

        let old = {
            let mut mode = lock_or_recover(&self.mode);
            let old = *mode;
            *mode = new_mode;
            old
        };
        if old == new_mode {
            return;
        }
        log::info!("mode transition: {} -> {}", old.label(), new_mode.label());

        // 入場側の副作用
        let mut session = lock_or_recover(ctx.session);
        session.status.clear();
        // 前のモードで積まれたエンジン起動依頼は持ち越さない
        session.startengine = false;
        match new_mode {
            Mode::BookView => {
                // ブックの先頭位置をカーソルに据え、盤面に映す
                session.book_cursor = 0;
                let book = lock_or_recover(ctx.book);
                if let Some(entry) = book.entry(0) {
                    session.board = Board::from_bitpos(&entry.pos);
                    session.status = book.describe(0);
                    emit(
                        ctx.events,
                        UiEvent::BoardChanged {
                            board: session.board.clone(),
                            side_to_move: session.color,
                        },
                    );
                } else {
                    session.status = "user book is empty".to_string();
                }
            }
            Mode::EngineMatch | Mode::EngineVsEngine | Mode::AnalyzePdnBatch => {
                session.start_match = true;
                session.gameover = false;
            }
            Mode::AnalyzeGame | Mode::Autoplay | Mode::RunTestSet => {
                session.gameover = false;
            }
            _ => {}
        }
        if !session.status.is_empty() {
            emit(ctx.events, UiEvent::Status(session.status.clone()));
        }
        drop(session);

        emit(ctx.events, UiEvent::ModeChanged(new_mode));
    }
}
