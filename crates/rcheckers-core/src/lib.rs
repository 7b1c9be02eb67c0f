//! rcheckers-core: イングリッシュチェッカーの盤面・指し手・棋譜モデル
//!
//! GUI / オーケストレーション層から共有されるドメイン型を提供する。
//! 探索アルゴリズム自体はこの crate には含まれない。

pub mod board;
pub mod clock;
pub mod game;
pub mod movegen;
pub mod moves;
pub mod types;

pub use board::{BitPos, Board, FenError};
pub use clock::{ClockModel, MAX_CLOCK_MS, MIN_CLOCK_MS};
pub use game::{GameEntry, GameRecord, GameTimeline};
pub use movegen::{generate_moves, has_move};
pub use moves::MoveRecord;
pub use types::{Color, Piece, PieceKind, Square};
