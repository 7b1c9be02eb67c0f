//! 合法手生成（イングリッシュルール）
//!
//! - 取れる手があるときは取る手のみが合法（強制取り）
//! - 多段ジャンプは続けられる限り続ける
//! - man は前方のみ移動・取りが可能、king は全 4 方向
//! - ジャンプ中に最終段へ到達した man はそこで成り、手は終了する
//!
//! 生成順は決定的（マス番号昇順 → 方向順）。エンジンが返した盤面との
//! 照合は「最初に一致した候補」を採用するため、この順序が照合結果を
//! 定義する。

use crate::board::Board;
use crate::moves::{CaptureList, MoveRecord};
use crate::types::{Color, Piece, Square};

const BLACK_MAN_DIRS: [(i8, i8); 2] = [(1, -1), (1, 1)];
const WHITE_MAN_DIRS: [(i8, i8); 2] = [(-1, -1), (-1, 1)];
const KING_DIRS: [(i8, i8); 4] = [(1, -1), (1, 1), (-1, -1), (-1, 1)];

fn dirs_for(piece: Piece) -> &'static [(i8, i8)] {
    if piece.is_king() {
        &KING_DIRS
    } else {
        match piece.color {
            Color::Black => &BLACK_MAN_DIRS,
            Color::White => &WHITE_MAN_DIRS,
        }
    }
}

/// 指定手番の合法手をすべて返す
pub fn generate_moves(board: &Board, color: Color) -> Vec<MoveRecord> {
    let mut jumps = Vec::new();
    for sq in Square::all() {
        let Some(piece) = board.get(sq) else { continue };
        if piece.color != color {
            continue;
        }
        collect_jumps(board, sq, piece, &mut jumps);
    }
    if !jumps.is_empty() {
        return jumps;
    }

    let mut moves = Vec::new();
    for sq in Square::all() {
        let Some(piece) = board.get(sq) else { continue };
        if piece.color != color {
            continue;
        }
        for &(dr, dc) in dirs_for(piece) {
            let Some(to) = sq.offset(dr, dc) else { continue };
            if board.get(to).is_some() {
                continue;
            }
            let promoted = !piece.is_king() && to.row() == color.crown_row();
            moves.push(MoveRecord::quiet(sq, to, piece, promoted));
        }
    }
    moves
}

/// 合法手が 1 手でも存在するか
pub fn has_move(board: &Board, color: Color) -> bool {
    !generate_moves(board, color).is_empty()
}

fn collect_jumps(board: &Board, origin: Square, piece: Piece, out: &mut Vec<MoveRecord>) {
    // 取られた駒は作業盤から即時に外す。同じ駒を二度跳ぶ手は生成されない。
    let mut scratch = board.clone();
    scratch.set(origin, None);
    let mut captures = CaptureList::new();
    extend_jumps(&mut scratch, origin, origin, piece, &mut captures, out);
}

fn extend_jumps(
    scratch: &mut Board,
    origin: Square,
    current: Square,
    piece: Piece,
    captures: &mut CaptureList,
    out: &mut Vec<MoveRecord>,
) {
    let mut extended = false;
    for &(dr, dc) in dirs_for(piece) {
        let Some(mid) = current.offset(dr, dc) else { continue };
        let Some(land) = current.offset(2 * dr, 2 * dc) else {
            continue;
        };
        let Some(victim) = scratch.get(mid) else { continue };
        if victim.color == piece.color || scratch.get(land).is_some() {
            continue;
        }

        extended = true;
        scratch.set(mid, None);
        captures.push((mid, victim));
        if !piece.is_king() && land.row() == piece.color.crown_row() {
            // 成った時点でジャンプは打ち切り
            out.push(MoveRecord {
                from: origin,
                to: land,
                piece,
                captures: captures.clone(),
                promoted: true,
            });
        } else {
            extend_jumps(scratch, origin, land, piece, captures, out);
        }
        captures.pop();
        scratch.set(mid, Some(victim));
    }

    if !extended && current != origin {
        out.push(MoveRecord {
            from: origin,
            to: current,
            piece,
            captures: captures.clone(),
            promoted: false,
        });
    }
}
