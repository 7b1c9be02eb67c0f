//! UI イベントチャネル
//!
//! 描画側（盤面ウィジェット・ステータスバー相当）はこの crate の外に
//! いる。状態変化はすべてイベントとして流し、受け手がいなくても
//! 送信失敗は無視する。

use crossbeam_channel::Sender;

use rcheckers_core::{Board, Color, MoveRecord};

use crate::mode::Mode;

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// ステータス行の更新
    Status(String),
    /// 盤面の確定変更（アニメーション完了・巻き戻し・新規対局）
    BoardChanged { board: Board, side_to_move: Color },
    /// アニメーション 1 フレーム
    AnimationFrame { record: MoveRecord, step: u32, steps: u32 },
    /// 時計表示の更新
    Clocks { black_ms: u64, white_ms: u64 },
    ModeChanged(Mode),
    GameOver(String),
}

pub type EventSender = Sender<UiEvent>;

/// 受け手が既にいない場合は黙って捨てる
pub fn emit(tx: &EventSender, event: UiEvent) {
    let _ = tx.send(event);
}
