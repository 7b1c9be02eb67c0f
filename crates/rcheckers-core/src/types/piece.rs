//! 駒（man / king）

use serde::{Deserialize, Serialize};

use super::Color;

/// 駒種
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Man,
    King,
}

/// 盤上の駒
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    pub const fn new(color: Color, kind: PieceKind) -> Self {
        Self { color, kind }
    }

    pub const fn man(color: Color) -> Self {
        Self::new(color, PieceKind::Man)
    }

    pub const fn king(color: Color) -> Self {
        Self::new(color, PieceKind::King)
    }

    #[inline]
    pub const fn is_king(self) -> bool {
        matches!(self.kind, PieceKind::King)
    }

    /// 成り（man → king）。king はそのまま。
    pub const fn crowned(self) -> Self {
        Self::new(self.color, PieceKind::King)
    }
}
