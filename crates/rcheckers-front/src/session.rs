//! 共有セッション状態
//!
//! 盤・棋譜・時計とモード進行フラグを 1 つの構造体にまとめ、単一の
//! Mutex で守る。盤面の書き手は常に 1 箇所:
//! 入力ハンドラ（セットアップ・巻き戻し）、タイムラインの apply/undo、
//! アニメーション完了時のコミットのどれかで、ワーカーフラグの規律で
//! 直列化される。

use rcheckers_core::{Board, ClockModel, Color, GameTimeline};
use rcheckers_engine::{EngineAdapter, ResultCode};

/// 使用するエンジンスロット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineId {
    Primary,
    Secondary,
}

impl EngineId {
    pub fn toggled(self) -> Self {
        match self {
            EngineId::Primary => EngineId::Secondary,
            EngineId::Secondary => EngineId::Primary,
        }
    }
}

/// プライマリ / セカンダリのエンジン実体
#[derive(Default)]
pub struct EngineSlots {
    pub primary: Option<Box<dyn EngineAdapter>>,
    pub secondary: Option<Box<dyn EngineAdapter>>,
}

impl EngineSlots {
    pub fn slot_mut(&mut self, id: EngineId) -> Option<&mut Box<dyn EngineAdapter>> {
        match id {
            EngineId::Primary => self.primary.as_mut(),
            EngineId::Secondary => self.secondary.as_mut(),
        }
    }
}

/// 対局セッション。Mutex<Session> として共有される。
pub struct Session {
    pub board: Board,
    /// 手番
    pub color: Color,
    pub timeline: GameTimeline,
    pub clock: ClockModel,
    /// ステータスバー相当の 1 行テキスト
    pub status: String,
    /// 自動モードで対局終了を知らせる唯一のシグナル
    pub gameover: bool,
    /// 人間の着手後にエンジン起動を依頼するフラグ（Normal モード）
    pub startengine: bool,
    /// 局面が変わった（観戦モードの再探索トリガ）
    pub newposition: bool,
    /// マッチ/バッチ解析の初回初期化がまだ済んでいない
    pub start_match: bool,
    /// 局面ジャンプ直後。次の探索でエンジンに履歴リセットを伝える。
    pub reset_move_history: bool,
    /// 直近の探索でエンジンが申告した結果
    pub last_result: ResultCode,
    pub current_engine: EngineId,
    /// ブック閲覧モードのカーソル
    pub book_cursor: usize,
}

impl Session {
    pub fn new(initial_time_ms: u64, increment_ms: u64) -> Self {
        Self {
            board: Board::start_position(),
            color: Color::Black,
            timeline: GameTimeline::new(Color::Black),
            clock: ClockModel::new(initial_time_ms, increment_ms),
            status: String::new(),
            gameover: false,
            startengine: false,
            newposition: true,
            start_match: false,
            reset_move_history: true,
            last_result: ResultCode::Unknown,
            current_engine: EngineId::Primary,
            book_cursor: 0,
        }
    }

    /// 新規対局。盤・棋譜・フラグを初期化し時計をリセットする。
    pub fn reset_game(&mut self, initial_time_ms: u64) {
        self.board = Board::start_position();
        self.color = Color::Black;
        self.timeline = GameTimeline::new(Color::Black);
        self.clock.reset(initial_time_ms);
        self.gameover = false;
        self.startengine = false;
        self.newposition = true;
        self.reset_move_history = true;
        self.last_result = ResultCode::Unknown;
    }

    /// FEN で指定された局面から開始する
    pub fn reset_to_position(&mut self, board: Board, side: Color, fen: String, initial_time_ms: u64) {
        self.board = board;
        self.color = side;
        self.timeline = GameTimeline::new(side);
        self.timeline.meta.fen = Some(fen);
        self.clock.reset(initial_time_ms);
        self.gameover = false;
        self.startengine = false;
        self.newposition = true;
        self.reset_move_history = true;
        self.last_result = ResultCode::Unknown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_game_clears_flags() {
        let mut session = Session::new(60_000, 0);
        session.gameover = true;
        session.startengine = true;
        session.status = "old".to_string();
        session.reset_game(60_000);
        assert!(!session.gameover);
        assert!(!session.startengine);
        assert!(session.newposition);
        assert_eq!(session.timeline.len(), 0);
        assert_eq!(session.board, Board::start_position());
    }

    #[test]
    fn test_engine_id_toggle() {
        assert_eq!(EngineId::Primary.toggled(), EngineId::Secondary);
        assert_eq!(EngineId::Secondary.toggled(), EngineId::Primary);
    }
}
