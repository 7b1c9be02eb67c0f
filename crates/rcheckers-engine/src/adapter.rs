//! EngineAdapter トレイト
//!
//! エンジンが公開するのは「探索 1 回」と「テキストコマンド」の 2 窓口だけ。
//! compute_move は長時間ブロックし得るため、必ず専用スレッドから呼ぶこと。

use anyhow::Result;
use thiserror::Error;

use rcheckers_core::Board;

use crate::cancel::CancelToken;
use crate::types::{SearchParams, SearchReply};

/// send_command の失敗
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// コマンド未対応。呼び出し側は「機能なし」として扱い、エラーにしない。
    #[error("command not supported: {0}")]
    Unsupported(String),
    #[error("engine command failed: {0}")]
    Failed(String),
}

/// 探索エンジン境界。
pub trait EngineAdapter: Send {
    /// 1 回の探索。cancel はエンジン自身の粒度でポーリングされる。
    fn compute_move(
        &mut self,
        board: &Board,
        params: &SearchParams,
        cancel: &CancelToken,
    ) -> Result<SearchReply>;

    /// テキストコマンド窓口。既知コマンド: "name" "about" "help"
    /// "get book" "set book N" "get gametype" "staticevaluation <FEN>"
    fn send_command(&mut self, command: &str) -> Result<String, EngineError>;

    /// 表示用のエンジン名
    fn name(&mut self) -> String {
        self.send_command("name").unwrap_or_else(|_| "unknown engine".to_string())
    }
}
