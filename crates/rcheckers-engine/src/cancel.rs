//! 協調的キャンセルトークン
//!
//! 2 本の独立した信号を持つ:
//! - play_now: 今すぐ最善手を返して探索を終えよ（結果は使われる）
//! - abort:    結果を破棄せよ（盤面は変更されない）
//!
//! どちらもエンジン側が自分の粒度でポーリングする。オーケストレータは
//! 探索スレッドを強制終了しない。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct Inner {
    play_now: AtomicBool,
    abort: AtomicBool,
}

/// クローン可能なキャンセルハンドル
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 「今すぐ指せ」。探索は現時点の最善手で打ち切る。
    pub fn request_play_now(&self) {
        self.inner.play_now.store(true, Ordering::Release);
    }

    /// 「中断して結果を捨てよ」。play_now も同時に立てて復帰を早める。
    pub fn request_abort(&self) {
        self.inner.abort.store(true, Ordering::Release);
        self.inner.play_now.store(true, Ordering::Release);
    }

    /// 次の探索に備えて両フラグを下ろす
    pub fn clear(&self) {
        self.inner.play_now.store(false, Ordering::Release);
        self.inner.abort.store(false, Ordering::Release);
    }

    #[inline]
    pub fn play_now(&self) -> bool {
        self.inner.play_now.load(Ordering::Acquire)
    }

    #[inline]
    pub fn aborted(&self) -> bool {
        self.inner.abort.load(Ordering::Acquire)
    }
}
