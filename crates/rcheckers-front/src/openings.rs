//! オープニングスケジュール
//!
//! エンジンマッチは 3 手オープニングのデッキを順番に消化する。各
//! オープニングは 2 回（先後入れ替えて）対局される。ファイル指定が
//! なければ組み込みの小さなデッキを使う。
//!
//! ファイル形式: 1 行 1 オープニング、"名前: 11-15 23-19 8-11"。
//! 読み込み時に合法手生成で検証する。

use std::path::Path;

use anyhow::{Context, Result, bail};

use rcheckers_core::{Board, Color, GameTimeline};

use crate::gamestore::apply_notated_move;

#[derive(Debug, Clone)]
pub struct Opening {
    pub name: String,
    pub moves: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OpeningSchedule {
    openings: Vec<Opening>,
}

/// 組み込みデッキ（3 手バロット抜粋）
const BUILTIN_DECK: &[&str] = &[
    "11-15 23-19 8-11",
    "11-16 24-19 8-11",
    "9-13 22-18 10-15",
    "12-16 21-17 16-20",
];

impl OpeningSchedule {
    pub fn builtin() -> Self {
        let openings = BUILTIN_DECK
            .iter()
            .map(|line| Opening {
                name: (*line).to_string(),
                moves: line.split_whitespace().map(str::to_string).collect(),
            })
            .collect();
        Self { openings }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read openings {}", path.display()))?;
        let mut openings = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, moves_text) = match line.split_once(':') {
                Some((name, rest)) => (name.trim().to_string(), rest),
                None => (line.to_string(), line),
            };
            let moves: Vec<String> = moves_text.split_whitespace().map(str::to_string).collect();
            if moves.is_empty() {
                bail!("{}:{}: empty opening", path.display(), lineno + 1);
            }
            let opening = Opening { name, moves };
            opening
                .setup()
                .with_context(|| format!("{}:{}: invalid opening", path.display(), lineno + 1))?;
            openings.push(opening);
        }
        if openings.is_empty() {
            bail!("{}: no openings found", path.display());
        }
        Ok(Self { openings })
    }

    pub fn len(&self) -> usize {
        self.openings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.openings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Opening> {
        self.openings.get(index)
    }
}

impl Opening {
    /// オープニング消化後の盤・手番・棋譜を作る
    pub fn setup(&self) -> Result<(Board, Color, GameTimeline)> {
        let mut board = Board::start_position();
        let mut color = Color::Black;
        let mut timeline = GameTimeline::new(Color::Black);
        for notation in &self.moves {
            let record = apply_notated_move(&mut board, color, notation)
                .with_context(|| format!("opening '{}'", self.name))?;
            timeline.append(record);
            color = color.opponent();
        }
        Ok((board, color, timeline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_deck_is_legal() {
        let schedule = OpeningSchedule::builtin();
        assert!(!schedule.is_empty());
        for i in 0..schedule.len() {
            let opening = schedule.get(i).unwrap();
            let (_, color, timeline) = opening.setup().unwrap();
            assert_eq!(timeline.len(), 3, "ballot openings are three plies");
            // 3 手消化後は白番
            assert_eq!(color, Color::White);
        }
    }

    #[test]
    fn test_load_schedule_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openings.txt");
        std::fs::write(&path, "# comment\nold 14th: 11-15 23-19 8-11\n\n9-13 22-18 10-15\n")
            .unwrap();
        let schedule = OpeningSchedule::load(&path).unwrap();
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule.get(0).unwrap().name, "old 14th");
    }

    #[test]
    fn test_load_rejects_illegal_opening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openings.txt");
        std::fs::write(&path, "bad: 11-20\n").unwrap();
        assert!(OpeningSchedule::load(&path).is_err());
    }
}
