//! ユーザーブック
//!
//! 局面 → 推奨手の小さな表。エントリ数は上限つきで、同じ局面には
//! 後勝ちで上書きする。探索ワーカーがエンジンを呼ぶ前に引く。

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rcheckers_core::{BitPos, MoveRecord};

/// ブックの最大エントリ数
pub const MAX_BOOK_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookEntry {
    pub pos: BitPos,
    pub mv: MoveRecord,
}

/// 追加の結果
#[derive(Debug, PartialEq, Eq)]
pub enum BookAddOutcome {
    Added(usize),
    Replaced(usize),
    Full,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserBook {
    entries: Vec<BookEntry>,
}

impl UserBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&BookEntry> {
        self.entries.get(index)
    }

    /// ブック閲覧モードのステータス行
    pub fn describe(&self, index: usize) -> String {
        match self.entries.get(index) {
            Some(entry) => format!(
                "position {} of {}: {}",
                index + 1,
                self.entries.len(),
                entry.mv.notation()
            ),
            None => "user book is empty".to_string(),
        }
    }

    /// 局面に対応する手を探す
    pub fn lookup(&self, pos: &BitPos) -> Option<MoveRecord> {
        self.entries.iter().find(|e| e.pos == *pos).map(|e| e.mv.clone())
    }

    /// 追加。既存局面は上書き（後勝ち）、上限到達なら拒否。
    pub fn add(&mut self, pos: BitPos, mv: MoveRecord) -> BookAddOutcome {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.pos == pos) {
            existing.mv = mv;
            return BookAddOutcome::Replaced(self.entries.len());
        }
        if self.entries.len() >= MAX_BOOK_ENTRIES {
            return BookAddOutcome::Full;
        }
        self.entries.push(BookEntry { pos, mv });
        BookAddOutcome::Added(self.entries.len())
    }

    /// 指定局面のエントリを削除する
    pub fn remove(&mut self, pos: &BitPos) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.pos != *pos);
        self.entries.len() != before
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read user book {}", path.display()))?;
        let book = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse user book {}", path.display()))?;
        Ok(book)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string(self).context("failed to serialize user book")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write user book {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcheckers_core::{Board, Color, generate_moves};

    fn sample() -> (BitPos, MoveRecord) {
        let board = Board::start_position();
        let mv = generate_moves(&board, Color::Black).remove(0);
        (board.bitpos(), mv)
    }

    #[test]
    fn test_lookup_hits_added_entry() {
        let (pos, mv) = sample();
        let mut book = UserBook::new();
        assert_eq!(book.add(pos, mv.clone()), BookAddOutcome::Added(1));
        assert_eq!(book.lookup(&pos), Some(mv));
    }

    #[test]
    fn test_duplicate_position_is_last_write_wins() {
        let board = Board::start_position();
        let moves = generate_moves(&board, Color::Black);
        let pos = board.bitpos();
        let mut book = UserBook::new();
        book.add(pos, moves[0].clone());
        assert_eq!(book.add(pos, moves[1].clone()), BookAddOutcome::Replaced(1));
        assert_eq!(book.len(), 1);
        assert_eq!(book.lookup(&pos), Some(moves[1].clone()));
    }

    #[test]
    fn test_cap_is_enforced() {
        let (_, mv) = sample();
        let mut book = UserBook::new();
        for i in 0..MAX_BOOK_ENTRIES as u32 {
            let pos = BitPos { bm: i + 1, bk: 0, wm: 0, wk: 0 };
            assert_ne!(book.add(pos, mv.clone()), BookAddOutcome::Full);
        }
        let pos = BitPos { bm: 0, bk: 1, wm: 0, wk: 0 };
        assert_eq!(book.add(pos, mv.clone()), BookAddOutcome::Full);
        assert_eq!(book.len(), MAX_BOOK_ENTRIES);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let (pos, mv) = sample();
        let mut book = UserBook::new();
        book.add(pos, mv.clone());
        book.save(&path).unwrap();
        let loaded = UserBook::load(&path).unwrap();
        assert_eq!(loaded.lookup(&pos), Some(mv));
        // 存在しないファイルは空のブック
        assert!(UserBook::load(&dir.path().join("none.json")).unwrap().is_empty());
    }
}
