//! 組み込みベースラインエンジン（material）
//!
//! マテリアル + モビリティ評価の反復深化ネガマックス。外部エンジンが
//! 未設定でも対局・回帰テストが回るようにするための基準実装で、強さは
//! 二の次。イングリッシュルールの流儀に合わせて「着手後の盤面」を返し、
//! front 側の照合経路を通す。

use std::time::Instant;

use anyhow::Result;

use rcheckers_core::{Board, Color, MoveRecord, generate_moves};

use crate::adapter::{EngineAdapter, EngineError};
use crate::cancel::CancelToken;
use crate::types::{ResultCode, SearchParams, SearchReply};

const MAN_VALUE: i32 = 100;
const KING_VALUE: i32 = 130;
const WIN_SCORE: i32 = 100_000;
const MAX_DEPTH: u32 = 12;
/// キャンセル・締切の確認間隔（ノード数）
const POLL_INTERVAL: u64 = 256;

pub struct MaterialEngine {
    /// "set book N" で設定される擬似ブックレベル（探索には影響しない）
    book_level: u8,
    nodes: u64,
    stopped: bool,
}

impl Default for MaterialEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialEngine {
    pub fn new() -> Self {
        Self {
            book_level: 0,
            nodes: 0,
            stopped: false,
        }
    }

    fn evaluate(board: &Board, side: Color) -> i32 {
        let mut score = 0i32;
        for sq in rcheckers_core::Square::all() {
            let Some(piece) = board.get(sq) else { continue };
            let value = if piece.is_king() { KING_VALUE } else { MAN_VALUE };
            if piece.color == side {
                score += value;
            } else {
                score -= value;
            }
        }
        score
    }

    fn negamax(
        &mut self,
        board: &mut Board,
        side: Color,
        depth: u32,
        mut alpha: i32,
        beta: i32,
        cancel: &CancelToken,
        deadline: Instant,
    ) -> i32 {
        self.nodes += 1;
        if self.nodes % POLL_INTERVAL == 0 && (cancel.play_now() || Instant::now() >= deadline) {
            self.stopped = true;
        }
        if self.stopped {
            return Self::evaluate(board, side);
        }

        let moves = generate_moves(board, side);
        if moves.is_empty() {
            // 手番側に手がなければ負け
            return -WIN_SCORE;
        }
        if depth == 0 {
            return Self::evaluate(board, side);
        }

        let mut best = -WIN_SCORE;
        for m in &moves {
            board.apply(m);
            let score =
                -self.negamax(board, side.opponent(), depth - 1, -beta, -alpha, cancel, deadline);
            board.undo(m);
            if score > best {
                best = score;
            }
            if best > alpha {
                alpha = best;
            }
            if alpha >= beta || self.stopped {
                break;
            }
        }
        best
    }

    /// 反復深化のルート。打ち切られた深さの結果は捨て、完了した
    /// 最終深さの最善手を使う（stop-and-use-best）。
    fn search_root(
        &mut self,
        board: &Board,
        side: Color,
        deadline: Instant,
        cancel: &CancelToken,
    ) -> Option<(MoveRecord, i32, u32)> {
        let moves = generate_moves(board, side);
        if moves.is_empty() {
            return None;
        }

        self.nodes = 0;
        self.stopped = false;
        let mut best = (moves[0].clone(), 0i32, 0u32);
        let mut work = board.clone();
        for depth in 1..=MAX_DEPTH {
            let mut iteration_best: Option<(MoveRecord, i32)> = None;
            for m in &moves {
                work.apply(m);
                let score = -self.negamax(
                    &mut work,
                    side.opponent(),
                    depth - 1,
                    -WIN_SCORE,
                    WIN_SCORE,
                    cancel,
                    deadline,
                );
                work.undo(m);
                if self.stopped {
                    break;
                }
                if iteration_best.as_ref().is_none_or(|(_, s)| score > *s) {
                    iteration_best = Some((m.clone(), score));
                }
            }
            if let Some((m, score)) = iteration_best {
                if !self.stopped {
                    best = (m, score, depth);
                }
            }
            if self.stopped || cancel.play_now() || Instant::now() >= deadline {
                break;
            }
        }
        Some(best)
    }
}

impl EngineAdapter for MaterialEngine {
    fn compute_move(
        &mut self,
        board: &Board,
        params: &SearchParams,
        cancel: &CancelToken,
    ) -> Result<SearchReply> {
        let started = Instant::now();
        let deadline = started + std::time::Duration::from_millis(params.max_time_ms.max(1));

        let Some((best, score, depth)) = self.search_root(board, params.side, deadline, cancel)
        else {
            return Ok(SearchReply {
                result: ResultCode::Loss,
                board: board.clone(),
                mv: None,
                status: "no move in this position".to_string(),
            });
        };

        if cancel.aborted() {
            return Ok(SearchReply {
                result: ResultCode::Unknown,
                board: board.clone(),
                mv: None,
                status: "search aborted".to_string(),
            });
        }

        let mut after = board.clone();
        after.apply(&best);
        let result = if generate_moves(&after, params.side.opponent()).is_empty() {
            ResultCode::Win
        } else {
            ResultCode::Unknown
        };

        let status = format!(
            "best={} depth={} eval={:+} nodes={} time={:.2}s",
            best.notation(),
            depth,
            score,
            self.nodes,
            started.elapsed().as_secs_f64(),
        );
        log::debug!("material: {status}");

        Ok(SearchReply {
            result,
            board: after,
            mv: Some(best),
            status,
        })
    }

    fn send_command(&mut self, command: &str) -> Result<String, EngineError> {
        let command = command.trim();
        if let Some(rest) = command.strip_prefix("set book ") {
            let level: u8 = rest
                .trim()
                .parse()
                .map_err(|_| EngineError::Failed(format!("bad book level: {rest}")))?;
            self.book_level = level;
            return Ok(format!("book set to {level}"));
        }
        if let Some(rest) = command.strip_prefix("staticevaluation ") {
            let (board, side) = Board::from_fen(rest)
                .map_err(|e| EngineError::Failed(format!("bad position: {e}")))?;
            return Ok(format!("static evaluation: {:+}", Self::evaluate(&board, side)));
        }
        match command {
            "name" => Ok("Material 1.0".to_string()),
            "about" => Ok("material+mobility baseline engine for rcheckers".to_string()),
            "help" => {
                Ok("commands: name, about, help, get book, set book N, get gametype, \
                    staticevaluation <FEN>"
                    .to_string())
            }
            "get book" => Ok(self.book_level.to_string()),
            "get gametype" => Ok("21".to_string()), // English checkers
            other => Err(EngineError::Unsupported(other.to_string())),
        }
    }
}
