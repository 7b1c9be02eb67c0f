//! 盤面（Board）と FEN 入出力
//!
//! Board の変更は `apply` / `undo` のみで行う。探索・アニメーション用の
//! 一時コピーは Clone で取る。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::moves::MoveRecord;
use crate::types::{Color, Piece, PieceKind, Square};

/// FEN 解析エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("empty FEN string")]
    Empty,
    #[error("invalid side to move: {0}")]
    BadSide(String),
    #[error("invalid square number: {0}")]
    BadSquare(String),
    #[error("square {0} listed twice")]
    DuplicateSquare(u8),
    #[error("missing piece section")]
    MissingSection,
}

/// ビットボード表現。盤面の等価判定とユーザーブックのキーに使う。
/// bm/bk = 黒の man/king、wm/wk = 白の man/king。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitPos {
    pub bm: u32,
    pub bk: u32,
    pub wm: u32,
    pub wk: u32,
}

/// 8×8 盤。ダークマス 32 マスのみ駒が乗る。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [Option<Piece>; Square::NUM],
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl Board {
    /// 空の盤
    pub fn empty() -> Self {
        Self {
            cells: [None; Square::NUM],
        }
    }

    /// 標準初期配置（黒 1..=12、白 21..=32）
    pub fn start_position() -> Self {
        let mut board = Self::empty();
        for n in 1..=12u8 {
            board.set(Square::new(n).unwrap(), Some(Piece::man(Color::Black)));
        }
        for n in 21..=32u8 {
            board.set(Square::new(n).unwrap(), Some(Piece::man(Color::White)));
        }
        board
    }

    #[inline]
    pub fn get(&self, sq: Square) -> Option<Piece> {
        self.cells[(sq.number() - 1) as usize]
    }

    #[inline]
    pub fn set(&mut self, sq: Square, piece: Option<Piece>) {
        self.cells[(sq.number() - 1) as usize] = piece;
    }

    /// 指定色の駒数
    pub fn count(&self, color: Color) -> usize {
        self.cells.iter().flatten().filter(|p| p.color == color).count()
    }

    /// ビットボードへ射影する
    pub fn bitpos(&self) -> BitPos {
        let mut pos = BitPos {
            bm: 0,
            bk: 0,
            wm: 0,
            wk: 0,
        };
        for sq in Square::all() {
            let Some(piece) = self.get(sq) else { continue };
            let bit = sq.bit();
            match (piece.color, piece.kind) {
                (Color::Black, PieceKind::Man) => pos.bm |= bit,
                (Color::Black, PieceKind::King) => pos.bk |= bit,
                (Color::White, PieceKind::Man) => pos.wm |= bit,
                (Color::White, PieceKind::King) => pos.wk |= bit,
            }
        }
        pos
    }

    /// ビットボードから盤面を復元する（ユーザーブック閲覧用）
    pub fn from_bitpos(pos: &BitPos) -> Self {
        let mut board = Self::empty();
        for sq in Square::all() {
            let bit = sq.bit();
            let piece = if pos.bm & bit != 0 {
                Some(Piece::man(Color::Black))
            } else if pos.bk & bit != 0 {
                Some(Piece::king(Color::Black))
            } else if pos.wm & bit != 0 {
                Some(Piece::man(Color::White))
            } else if pos.wk & bit != 0 {
                Some(Piece::king(Color::White))
            } else {
                None
            };
            board.set(sq, piece);
        }
        board
    }

    /// 指し手を適用する。合法手であることは呼び出し側が保証する。
    pub fn apply(&mut self, m: &MoveRecord) {
        self.set(m.from, None);
        for (sq, _) in &m.captures {
            self.set(*sq, None);
        }
        self.set(m.to, Some(m.resulting_piece()));
    }

    /// `apply` の逆操作。`undo(apply(m)) == identity`。
    pub fn undo(&mut self, m: &MoveRecord) {
        self.set(m.to, None);
        for (sq, piece) in &m.captures {
            self.set(*sq, Some(*piece));
        }
        self.set(m.from, Some(m.piece));
    }

    /// PDN 方言の FEN（例 "B:W18,24,K10:B12,K22"）を読み込む
    pub fn from_fen(fen: &str) -> Result<(Board, Color), FenError> {
        let fen = fen.trim().trim_end_matches('.');
        if fen.is_empty() {
            return Err(FenError::Empty);
        }
        let mut parts = fen.split(':');
        let side_part = parts.next().ok_or(FenError::Empty)?.trim();
        let side = match side_part {
            "B" | "b" => Color::Black,
            "W" | "w" => Color::White,
            other => return Err(FenError::BadSide(other.to_string())),
        };

        let mut board = Board::empty();
        let mut sections = 0;
        for section in parts {
            let section = section.trim();
            let Some(color_ch) = section.chars().next() else {
                continue;
            };
            let color = match color_ch {
                'B' | 'b' => Color::Black,
                'W' | 'w' => Color::White,
                other => return Err(FenError::BadSide(other.to_string())),
            };
            sections += 1;
            let body = &section[1..];
            for entry in body.split(',') {
                let entry = entry.trim();
                if entry.is_empty() {
                    continue;
                }
                let (kind, digits) = if let Some(rest) = entry.strip_prefix(['K', 'k']) {
                    (PieceKind::King, rest)
                } else {
                    (PieceKind::Man, entry)
                };
                let n: u8 = digits.parse().map_err(|_| FenError::BadSquare(entry.to_string()))?;
                let sq = Square::new(n).ok_or_else(|| FenError::BadSquare(entry.to_string()))?;
                if board.get(sq).is_some() {
                    return Err(FenError::DuplicateSquare(n));
                }
                board.set(sq, Some(Piece::new(color, kind)));
            }
        }
        if sections == 0 {
            return Err(FenError::MissingSection);
        }
        Ok((board, side))
    }

    /// FEN 文字列を生成する。白セクションを先に出す。
    pub fn to_fen(&self, side: Color) -> String {
        let mut out = String::new();
        out.push(side.letter());
        for color in [Color::White, Color::Black] {
            out.push(':');
            out.push(color.letter());
            let mut first = true;
            for sq in Square::all() {
                let Some(piece) = self.get(sq) else { continue };
                if piece.color != color {
                    continue;
                }
                if !first {
                    out.push(',');
                }
                first = false;
                if piece.is_king() {
                    out.push('K');
                }
                out.push_str(&sq.number().to_string());
            }
        }
        out
    }
}

impl std::fmt::Display for Board {
    /// 8×8 のテキスト盤。b/w = man、B/W = king、. = 空きダークマス。
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..8u8 {
            for col in 0..8u8 {
                let ch = match Square::from_coords(row, col).and_then(|sq| self.get(sq)) {
                    Some(p) => match (p.color, p.kind) {
                        (Color::Black, PieceKind::Man) => 'b',
                        (Color::Black, PieceKind::King) => 'B',
                        (Color::White, PieceKind::Man) => 'w',
                        (Color::White, PieceKind::King) => 'W',
                    },
                    None => {
                        if Square::from_coords(row, col).is_some() {
                            '.'
                        } else {
                            ' '
                        }
                    }
                };
                f.write_str(&ch.to_string())?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::generate_moves;

    #[test]
    fn test_start_position_counts() {
        let board = Board::start_position();
        assert_eq!(board.count(Color::Black), 12);
        assert_eq!(board.count(Color::White), 12);
    }

    #[test]
    fn test_fen_roundtrip() {
        let board = Board::start_position();
        let fen = board.to_fen(Color::Black);
        let (parsed, side) = Board::from_fen(&fen).unwrap();
        assert_eq!(parsed, board);
        assert_eq!(side, Color::Black);
    }

    #[test]
    fn test_fen_kings_and_trailing_dot() {
        let (board, side) = Board::from_fen("W:WK10,21:B1,K32.").unwrap();
        assert_eq!(side, Color::White);
        assert_eq!(board.get(Square::new(10).unwrap()), Some(Piece::king(Color::White)));
        assert_eq!(board.get(Square::new(21).unwrap()), Some(Piece::man(Color::White)));
        assert_eq!(board.get(Square::new(32).unwrap()), Some(Piece::king(Color::Black)));
    }

    #[test]
    fn test_fen_errors() {
        assert_eq!(Board::from_fen(""), Err(FenError::Empty));
        assert!(matches!(Board::from_fen("X:W1:B2"), Err(FenError::BadSide(_))));
        assert!(matches!(Board::from_fen("B:W40:B2"), Err(FenError::BadSquare(_))));
        assert_eq!(Board::from_fen("B:W5,5:B2"), Err(FenError::DuplicateSquare(5)));
        assert_eq!(Board::from_fen("B"), Err(FenError::MissingSection));
    }

    #[test]
    fn test_apply_undo_identity_over_legal_moves() {
        let board = Board::start_position();
        for m in generate_moves(&board, Color::Black) {
            let mut work = board.clone();
            work.apply(&m);
            assert_ne!(work, board);
            work.undo(&m);
            assert_eq!(work, board, "undo(apply({})) must restore the board", m);
        }
    }

    #[test]
    fn test_bitpos_roundtrip() {
        let (board, _) = Board::from_fen("B:W18,24,K10:B12,K22").unwrap();
        assert_eq!(Board::from_bitpos(&board.bitpos()), board);
    }

    #[test]
    fn test_bitpos_distinguishes_kind() {
        let mut a = Board::empty();
        let mut b = Board::empty();
        let sq = Square::new(10).unwrap();
        a.set(sq, Some(Piece::man(Color::Black)));
        b.set(sq, Some(Piece::king(Color::Black)));
        assert_ne!(a.bitpos(), b.bitpos());
    }
}
