//! 棋譜（GameTimeline）
//!
//! カーソル付きの指し手履歴。カーソルより後ろがある状態で追加すると
//! 後続はすべて破棄される（分岐上書き方式、挿入ではない）。

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::moves::MoveRecord;
use crate::types::Color;

/// 1 手分の棋譜エントリ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEntry {
    pub record: MoveRecord,
    pub notation: String,
    #[serde(default)]
    pub comment: String,
    /// 解析モードが書き込む注釈（エンジンのステータス行）
    #[serde(default)]
    pub annotation: String,
}

impl GameEntry {
    pub fn new(record: MoveRecord) -> Self {
        let notation = record.notation();
        Self {
            record,
            notation,
            comment: String::new(),
            annotation: String::new(),
        }
    }
}

/// 対局メタデータ
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameRecord {
    pub black: String,
    pub white: String,
    pub event: String,
    pub result: String,
    /// 初期局面が標準でない場合の FEN
    pub fen: Option<String>,
}

/// カーソル付き指し手履歴
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameTimeline {
    entries: Vec<GameEntry>,
    cursor: usize,
    pub meta: GameRecord,
    /// 対局開始時の手番
    pub start_color: Color,
}

impl Default for GameTimeline {
    fn default() -> Self {
        Self::new(Color::Black)
    }
}

impl GameTimeline {
    pub fn new(start_color: Color) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            meta: GameRecord::default(),
            start_color,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 不変条件: 0 <= cursor <= len
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn entries(&self) -> &[GameEntry] {
        &self.entries
    }

    pub fn entry_mut(&mut self, index: usize) -> Option<&mut GameEntry> {
        self.entries.get_mut(index)
    }

    /// 直前に指された手（カーソルの 1 つ前）
    pub fn last_played_mut(&mut self) -> Option<&mut GameEntry> {
        if self.cursor == 0 {
            None
        } else {
            self.entries.get_mut(self.cursor - 1)
        }
    }

    /// カーソル位置に手を追加する。カーソルより後ろは破棄される。
    pub fn append(&mut self, record: MoveRecord) {
        self.entries.truncate(self.cursor);
        self.entries.push(GameEntry::new(record));
        self.cursor = self.entries.len();
    }

    /// カーソル位置の手を盤に適用して 1 つ進める。
    /// 末尾では何もせず None（エラーではない。呼び出し側が状態行で報告する）。
    pub fn step_forward(&mut self, board: &mut Board) -> Option<&GameEntry> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        let entry = &self.entries[self.cursor];
        board.apply(&entry.record);
        self.cursor += 1;
        Some(&self.entries[self.cursor - 1])
    }

    /// カーソルを 1 つ戻して直前の手を盤から巻き戻す。
    /// 先頭では何もせず None。
    pub fn step_back(&mut self, board: &mut Board) -> Option<&GameEntry> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        let entry = &self.entries[self.cursor];
        board.undo(&entry.record);
        Some(entry)
    }

    /// moveindex から表示用の手数（1 始まり）を求める
    pub fn move_number(&self, index: usize) -> usize {
        1 + index / 2
    }

    /// 後手側の手か（手数表示で "1..." を使うか）
    pub fn is_second_player(&self, index: usize) -> bool {
        let offset = if self.start_color == Color::Black { 0 } else { 1 };
        (index + offset) % 2 == 1
    }
}
