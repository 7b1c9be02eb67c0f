//! 保存棋譜データベース（JSONL）
//!
//! バッチ解析の入力とマッチの対局保存に使う。1 行 1 局。指し手は
//! 数値表記で持ち、読み込み時に合法手生成で実体の MoveRecord へ
//! 復元する（表記のトークナイズ自体は moves::parse_notation に委譲）。

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use rcheckers_core::{Board, Color, GameTimeline, MoveRecord, generate_moves, moves::parse_notation};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredGame {
    #[serde(default)]
    pub black: String,
    #[serde(default)]
    pub white: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub result: String,
    /// 初期局面。省略時は標準配置・黒番。
    #[serde(default)]
    pub fen: Option<String>,
    /// 数値表記の指し手列
    pub moves: Vec<String>,
}

/// 表記に合う合法手を適用する。from/to の一致する最初の候補を使う。
pub fn apply_notated_move(
    board: &mut Board,
    color: Color,
    notation: &str,
) -> Result<MoveRecord> {
    let Some((from, to, _capture)) = parse_notation(notation) else {
        bail!("unparsable move notation: {notation}");
    };
    let candidates = generate_moves(board, color);
    let Some(record) = candidates.into_iter().find(|m| m.from == from && m.to == to) else {
        bail!("move {notation} is not legal in this position");
    };
    board.apply(&record);
    Ok(record)
}

impl StoredGame {
    /// タイムラインから保存形式を作る
    pub fn from_timeline(timeline: &GameTimeline) -> Self {
        Self {
            black: timeline.meta.black.clone(),
            white: timeline.meta.white.clone(),
            event: timeline.meta.event.clone(),
            result: timeline.meta.result.clone(),
            fen: timeline.meta.fen.clone(),
            moves: timeline.entries().iter().map(|e| e.notation.clone()).collect(),
        }
    }

    /// 保存棋譜を盤・手番・タイムラインに展開する。
    /// カーソルは先頭（0）に置かれ、盤は初期局面のまま返す。
    pub fn replay(&self) -> Result<(Board, Color, GameTimeline)> {
        let (start_board, start_color) = match &self.fen {
            Some(fen) => Board::from_fen(fen).with_context(|| format!("bad FEN: {fen}"))?,
            None => (Board::start_position(), Color::Black),
        };

        let mut board = start_board.clone();
        let mut color = start_color;
        let mut timeline = GameTimeline::new(start_color);
        timeline.meta.black = self.black.clone();
        timeline.meta.white = self.white.clone();
        timeline.meta.event = self.event.clone();
        timeline.meta.result = self.result.clone();
        timeline.meta.fen = self.fen.clone();

        for notation in &self.moves {
            let record = apply_notated_move(&mut board, color, notation)
                .with_context(|| format!("while replaying {notation}"))?;
            timeline.append(record);
            color = color.opponent();
        }
        // カーソルを先頭へ戻す（appendで末尾まで進んでいる）
        let mut rewind_board = board;
        while timeline.step_back(&mut rewind_board).is_some() {}
        debug_assert_eq!(rewind_board, start_board);
        Ok((rewind_board, start_color, timeline))
    }
}

/// JSONL ファイルから全棋譜を読む
pub fn load_games(path: &Path) -> Result<Vec<StoredGame>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read game database {}", path.display()))?;
    let mut games = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let game: StoredGame = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: bad game record", path.display(), lineno + 1))?;
        games.push(game);
    }
    Ok(games)
}

/// 1 局追記する（マッチの対局保存）
pub fn append_game(path: &Path, game: &StoredGame) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let line = serde_json::to_string(game).context("failed to serialize game")?;
    writeln!(file, "{line}").with_context(|| format!("failed to append to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_standard_opening() {
        let game = StoredGame {
            moves: vec!["11-15".into(), "23-19".into(), "8-11".into()],
            ..Default::default()
        };
        let (board, color, timeline) = game.replay().unwrap();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.cursor(), 0);
        assert_eq!(color, Color::Black);
        assert_eq!(board, Board::start_position());
    }

    #[test]
    fn test_replay_rejects_illegal_move() {
        let game = StoredGame {
            moves: vec!["11-19".into()],
            ..Default::default()
        };
        assert!(game.replay().is_err());
    }

    #[test]
    fn test_replay_from_fen() {
        let game = StoredGame {
            fen: Some("B:W18:B15".into()),
            moves: vec!["15x22".into()],
            ..Default::default()
        };
        let (_, color, timeline) = game.replay().unwrap();
        assert_eq!(color, Color::Black);
        assert_eq!(timeline.len(), 1);
        assert!(timeline.entries()[0].record.is_capture());
    }

    #[test]
    fn test_jsonl_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.jsonl");
        let game = StoredGame {
            black: "Material 1.0".into(),
            white: "Material 1.0".into(),
            result: "1/2-1/2".into(),
            moves: vec!["11-15".into(), "23-19".into()],
            ..Default::default()
        };
        append_game(&path, &game).unwrap();
        append_game(&path, &game).unwrap();
        let games = load_games(&path).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[1].moves.len(), 2);
    }
}
