//! 対局時計（フィッシャー式インクリメンタル時間）
//!
//! 手番側の残り時間だけが減り、着手後に増分が戻る。非手番側の時計は
//! 凍結される。残り時間は表示・持ち時間配分の両方で使うため、
//! 下限 1ms / 上限 MAX_CLOCK_MS にクランプする。

use std::time::Instant;

use crate::types::Color;

/// 残り時間の上限（16bit×0.1s に収まる範囲、エンジン連携の都合）
pub const MAX_CLOCK_MS: u64 = 6_553_500;
/// 残り時間の下限。持ち時間配分の除数に使うため 0 にはしない。
pub const MIN_CLOCK_MS: u64 = 1;

/// 1 手あたりの持ち時間は残りの 1/4（単手での旗落ち対策ヒューリスティック）
const BUDGET_DIVISOR: u64 = 4;

#[derive(Debug, Clone)]
pub struct ClockModel {
    remaining_ms: [u64; Color::NUM],
    pub increment_ms: u64,
    /// 現在の手番側の時計が動き始めた時刻
    turn_started: Option<Instant>,
}

fn clamp_ms(ms: u64) -> u64 {
    ms.clamp(MIN_CLOCK_MS, MAX_CLOCK_MS)
}

impl ClockModel {
    pub fn new(initial_ms: u64, increment_ms: u64) -> Self {
        let initial = clamp_ms(initial_ms);
        Self {
            remaining_ms: [initial; Color::NUM],
            increment_ms: increment_ms.min(MAX_CLOCK_MS),
            turn_started: None,
        }
    }

    /// 新規対局・時計リセット
    pub fn reset(&mut self, initial_ms: u64) {
        let initial = clamp_ms(initial_ms);
        self.remaining_ms = [initial; Color::NUM];
        self.turn_started = Some(Instant::now());
    }

    #[inline]
    pub fn remaining_ms(&self, side: Color) -> u64 {
        self.remaining_ms[side.index()]
    }

    /// 手番側の時計を今から動かす
    pub fn begin_turn(&mut self) {
        self.turn_started = Some(Instant::now());
    }

    /// 現手番の消費時間（ms）。時計が動いていなければ 0。
    pub fn elapsed_in_turn(&self) -> u64 {
        self.turn_started.map(|t| t.elapsed().as_millis() as u64).unwrap_or(0)
    }

    /// 着手後の清算: remaining += increment - elapsed（下限・上限クランプ）。
    /// 非手番側の値には触れない。
    pub fn charge(&mut self, side: Color, elapsed_ms: u64) {
        let current = self.remaining_ms[side.index()];
        let next = current.saturating_sub(elapsed_ms).saturating_add(self.increment_ms);
        self.remaining_ms[side.index()] = clamp_ms(next);
    }

    /// インクリメンタル時間での 1 手あたりの思考上限
    pub fn budget_ms(&self, side: Color) -> u64 {
        clamp_ms(self.remaining_ms[side.index()] / BUDGET_DIVISOR)
    }

    /// 表示用の現在値。手番側は経過分を差し引いた瞬時値を返す。
    pub fn instantaneous(&self, side_to_move: Color) -> (u64, u64) {
        let elapsed = self.elapsed_in_turn();
        let mut black = self.remaining_ms[Color::Black.index()];
        let mut white = self.remaining_ms[Color::White.index()];
        match side_to_move {
            Color::Black => black = black.saturating_sub(elapsed),
            Color::White => white = white.saturating_sub(elapsed),
        }
        (black, white)
    }
}
