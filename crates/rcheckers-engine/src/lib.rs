//! rcheckers-engine: 探索エンジン境界
//!
//! フロントエンドから見たエンジンは「盤面と持ち時間を渡すと結果と
//! ステータス文字列を返す不透明な関数」と「テキストコマンドの窓口」の
//! 2 本だけ。協調的キャンセルは CancelToken 経由で通知する。

pub mod adapter;
pub mod cancel;
pub mod material;
pub mod types;

pub use adapter::{EngineAdapter, EngineError};
pub use cancel::CancelToken;
pub use material::MaterialEngine;
pub use types::{ResultCode, SearchParams, SearchReply, TimeArgs};
