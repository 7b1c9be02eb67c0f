//! エンジン境界の型

use rcheckers_core::{Board, Color, MoveRecord};
use serde::{Deserialize, Serialize};

/// エンジンが申告する終局判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    Win,
    Loss,
    Draw,
    Unknown,
}

/// インクリメンタル時間制御の情報（手番側の残りと増分）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeArgs {
    pub remaining_ms: u64,
    pub increment_ms: u64,
}

/// 1 回の探索依頼
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub side: Color,
    /// 思考時間の上限（ms）
    pub max_time_ms: u64,
    /// 直前に局面がジャンプした（棋譜続行でない）ことをエンジンへ通知
    pub reset_history: bool,
    /// インクリメンタル時間制御のとき Some
    pub time_args: Option<TimeArgs>,
}

/// 探索結果。
///
/// イングリッシュルールではエンジンは着手後の盤面を返し、指し手の
/// 構造は front 側の照合で復元する。盤面を返さない変種ルールの
/// エンジンは mv に構造化された指し手を入れ、そちらが信頼される。
#[derive(Debug, Clone)]
pub struct SearchReply {
    pub result: ResultCode,
    /// 着手後の盤面
    pub board: Board,
    /// 構造化された指し手（変種ルール用、English では None で良い）
    pub mv: Option<MoveRecord>,
    /// 人間可読のステータス行（評価値・深さ等）
    pub status: String,
}
