//! 指し手（MoveRecord）と数値表記
//!
//! MoveRecord は適用・巻き戻しの両方向に必要な情報をすべて持つ。
//! 取られた駒はマスと駒種のペアで保持し、`Board::undo` が無損失に
//! 復元できるようにする。

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::{Piece, Square};

/// 取られた駒のリスト。多段ジャンプでも 8 を超えることはない。
pub type CaptureList = SmallVec<[(Square, Piece); 8]>;

/// 1 手分の完全な記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    /// 動かした駒（移動前の姿）
    pub piece: Piece,
    /// 取った駒（マスと移動前の駒種）
    pub captures: CaptureList,
    /// この手で成ったか
    pub promoted: bool,
}

impl MoveRecord {
    /// 静かな手（取りなし）
    pub fn quiet(from: Square, to: Square, piece: Piece, promoted: bool) -> Self {
        Self {
            from,
            to,
            piece,
            captures: CaptureList::new(),
            promoted,
        }
    }

    #[inline]
    pub fn is_capture(&self) -> bool {
        !self.captures.is_empty()
    }

    /// 着手後に to に存在する駒
    pub fn resulting_piece(&self) -> Piece {
        if self.promoted { self.piece.crowned() } else { self.piece }
    }

    /// 数値 PDN 表記（"11-15" / "11x18"）
    pub fn notation(&self) -> String {
        let sep = if self.is_capture() { 'x' } else { '-' };
        format!("{}{}{}", self.from, sep, self.to)
    }
}

impl std::fmt::Display for MoveRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.notation())
    }
}

/// "11-15" / "11x18" 形式をマスのペアに分解する
pub fn parse_notation(text: &str) -> Option<(Square, Square, bool)> {
    let text = text.trim();
    let (sep_idx, capture) = match (text.find('x'), text.find('-')) {
        (Some(i), _) => (i, true),
        (None, Some(i)) => (i, false),
        (None, None) => return None,
    };
    let from: u8 = text[..sep_idx].trim().parse().ok()?;
    let to: u8 = text[sep_idx + 1..].trim().parse().ok()?;
    Some((Square::new(from)?, Square::new(to)?, capture))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, PieceKind};

    #[test]
    fn test_notation_roundtrip() {
        let from = Square::new(11).unwrap();
        let to = Square::new(15).unwrap();
        let m = MoveRecord::quiet(from, to, Piece::man(Color::Black), false);
        assert_eq!(m.notation(), "11-15");
        assert_eq!(parse_notation("11-15"), Some((from, to, false)));
        assert_eq!(parse_notation(" 11x18 "), Some((from, Square::new(18).unwrap(), true)));
        assert_eq!(parse_notation("11?15"), None);
        assert_eq!(parse_notation("0-15"), None);
    }

    #[test]
    fn test_resulting_piece() {
        let from = Square::new(28).unwrap();
        let to = Square::new(32).unwrap();
        let mut m = MoveRecord::quiet(from, to, Piece::man(Color::Black), true);
        assert_eq!(m.resulting_piece().kind, PieceKind::King);
        m.promoted = false;
        assert_eq!(m.resulting_piece().kind, PieceKind::Man);
    }
}
