//! アニメーションワーカー
//!
//! 1 手分の盤面遷移を時間をかけて再生し、最後に共有盤面へ論理的な
//! 着手をちょうど 1 回だけ反映する。再生中は animating フラグが立ち、
//! 新しい探索や入力はフラグ規律で拒否される。
//!
//! 盤面を書き換える操作（巻き戻し・新規対局・FEN セット）は必ず
//! cancel_and_wait で再生の完了を待ってから進むこと。キャンセルは
//! 残りフレームを飛ばすだけで、論理的な着手の反映は省略されない。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rcheckers_core::MoveRecord;

use crate::events::{EventSender, UiEvent, emit};
use crate::session::Session;
use crate::status::WorkerStatus;
use crate::utils::lock_or_recover;

/// 1 手の再生フレーム数
const ANIMATION_STEPS: u32 = 8;
/// cancel_and_wait の安全上限。論理反映は必ず走るので実際には瞬時。
const CANCEL_WAIT_BOUND: Duration = Duration::from_secs(5);

pub struct AnimationWorker {
    status: Arc<WorkerStatus>,
    session: Arc<Mutex<Session>>,
    events: EventSender,
    cancel: AtomicBool,
    /// マッチの早指し設定では再生を省略する
    enabled: AtomicBool,
    duration_ms: u64,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AnimationWorker {
    pub fn new(
        status: Arc<WorkerStatus>,
        session: Arc<Mutex<Session>>,
        events: EventSender,
        duration_ms: u64,
    ) -> Self {
        Self {
            status,
            session,
            events,
            cancel: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
            duration_ms,
            handle: Mutex::new(None),
        }
    }

    /// 再生の有効/無効（モード遷移が切り替える）
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// 1 手を再生する。前提: animating ではないこと。
    pub fn play(self: &Arc<Self>, record: MoveRecord) {
        if self.status.animating() {
            log::error!("animation dispatched while a playback is in flight, ignoring");
            return;
        }
        self.reclaim();
        self.cancel.store(false, Ordering::Release);
        self.status.set_animating(true);

        let worker = Arc::clone(self);
        let spawn_record = record.clone();
        let spawned = std::thread::Builder::new()
            .name("animation-worker".to_string())
            .spawn(move || worker.run(spawn_record));
        match spawned {
            Ok(handle) => {
                *lock_or_recover(&self.handle) = Some(handle);
            }
            Err(e) => {
                log::error!("failed to spawn animation thread: {e}");
                // スレッドが立たなくても論理反映は落とせない
                self.commit(&record);
                self.status.set_animating(false);
            }
        }
    }

    fn run(&self, record: MoveRecord) {
        let steps = if self.enabled.load(Ordering::Acquire) && self.duration_ms > 0 {
            ANIMATION_STEPS
        } else {
            0
        };
        if steps > 0 {
            let frame = Duration::from_millis(self.duration_ms / u64::from(steps));
            for step in 1..=steps {
                if self.cancel.load(Ordering::Acquire) {
                    break;
                }
                emit(
                    &self.events,
                    UiEvent::AnimationFrame {
                        record: record.clone(),
                        step,
                        steps,
                    },
                );
                std::thread::sleep(frame);
            }
        }
        self.commit(&record);
        self.status.set_animating(false);
    }

    /// 論理的な着手の反映。全経路でちょうど 1 回だけ呼ばれる。
    fn commit(&self, record: &MoveRecord) {
        let mut session = lock_or_recover(&self.session);
        session.board.apply(record);
        session.color = session.color.opponent();
        session.newposition = true;
        emit(
            &self.events,
            UiEvent::BoardChanged {
                board: session.board.clone(),
                side_to_move: session.color,
            },
        );
    }

    /// 再生を畳んで完了を待つ。盤面を書き換える操作の前に必須。
    pub fn cancel_and_wait(&self) {
        if !self.status.animating() {
            return;
        }
        self.cancel.store(true, Ordering::Release);
        let t0 = Instant::now();
        while self.status.animating() {
            if t0.elapsed() > CANCEL_WAIT_BOUND {
                log::error!("animation did not finish within {CANCEL_WAIT_BOUND:?}");
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        self.reclaim();
    }

    fn reclaim(&self) {
        let mut slot = lock_or_recover(&self.handle);
        if slot.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = slot.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcheckers_core::{Board, Color, generate_moves};

    fn setup(duration_ms: u64) -> (Arc<AnimationWorker>, crossbeam_channel::Receiver<UiEvent>) {
        let status = Arc::new(WorkerStatus::new());
        let session = Arc::new(Mutex::new(Session::new(60_000, 0)));
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = Arc::new(AnimationWorker::new(status, session, tx, duration_ms));
        (worker, rx)
    }

    fn wait_idle(worker: &AnimationWorker) {
        let t0 = Instant::now();
        while worker.status.animating() {
            assert!(t0.elapsed() < Duration::from_secs(5), "animation stuck");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_play_applies_move_exactly_once_at_end() {
        let (worker, _rx) = setup(0);
        let record = {
            let session = lock_or_recover(&worker.session);
            generate_moves(&session.board, session.color).remove(0)
        };
        worker.play(record.clone());
        wait_idle(&worker);

        let session = lock_or_recover(&worker.session);
        let mut expected = Board::start_position();
        expected.apply(&record);
        assert_eq!(session.board, expected);
        assert_eq!(session.color, Color::White);
        assert!(session.newposition);
    }

    #[test]
    fn test_cancel_still_commits_the_move() {
        let (worker, _rx) = setup(500);
        let record = {
            let session = lock_or_recover(&worker.session);
            generate_moves(&session.board, session.color).remove(0)
        };
        worker.play(record.clone());
        assert!(worker.status.animating());
        worker.cancel_and_wait();
        assert!(!worker.status.animating());

        let session = lock_or_recover(&worker.session);
        let mut expected = Board::start_position();
        expected.apply(&record);
        assert_eq!(session.board, expected, "logical mutation must not be skipped");
    }

    #[test]
    fn test_frames_are_emitted_when_enabled() {
        let (worker, rx) = setup(40);
        let record = {
            let session = lock_or_recover(&worker.session);
            generate_moves(&session.board, session.color).remove(0)
        };
        worker.play(record);
        wait_idle(&worker);
        let frames = rx.try_iter().filter(|e| matches!(e, UiEvent::AnimationFrame { .. })).count();
        assert_eq!(frames as u32, ANIMATION_STEPS);
    }

    #[test]
    fn test_disabled_playback_skips_frames() {
        let (worker, rx) = setup(40);
        worker.set_enabled(false);
        let record = {
            let session = lock_or_recover(&worker.session);
            generate_moves(&session.board, session.color).remove(0)
        };
        worker.play(record);
        wait_idle(&worker);
        let frames = rx.try_iter().filter(|e| matches!(e, UiEvent::AnimationFrame { .. })).count();
        assert_eq!(frames, 0);
    }
}
