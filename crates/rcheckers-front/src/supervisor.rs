//! スーパーバイザループ
//!
//! 10ms 周期の常駐スレッド。どのワーカーも忙しくないときだけ、現在の
//! モードに応じたプロトコルを 1 ステップ進める。自動モードの終局は
//! 共有の gameover フラグだけを見る。モード値はここでは変更せず、
//! すべて Control 経由で遷移する。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};

use rcheckers_engine::ResultCode;

use crate::analysis::AnalysisReport;
use crate::control::Control;
use crate::gamestore::{StoredGame, append_game, load_games};
use crate::mode::Mode;
use crate::openings::OpeningSchedule;
use crate::session::EngineId;
use crate::stats::{MatchStats, append_progress};
use crate::testset;
use crate::utils::lock_or_recover;

/// ループ周期。おおよそ毎秒 100 回まわる。
const TICK: Duration = Duration::from_millis(10);
/// 時計表示を更新する周期（tick 数）
const CLOCK_TICKS: u32 = 100;

struct SupervisorState {
    last_mode: Mode,
    tick: u32,
    // エンジンマッチ
    stats: MatchStats,
    game_number: u32,
    move_count: u32,
    engine_names: (String, String),
    // 解析
    analysis_started: bool,
    batch_games: Vec<StoredGame>,
    batch_index: usize,
    // テストセット
    testset_positions: Vec<String>,
    testset_index: usize,
    testset_loaded: bool,
}

impl SupervisorState {
    fn new() -> Self {
        Self {
            last_mode: Mode::Normal,
            tick: 0,
            stats: MatchStats::default(),
            game_number: 0,
            move_count: 0,
            engine_names: (String::new(), String::new()),
            analysis_started: false,
            batch_games: Vec::new(),
            batch_index: 0,
            testset_positions: Vec::new(),
            testset_index: 0,
            testset_loaded: false,
        }
    }
}

pub struct Supervisor {
    control: Arc<Control>,
    shutdown: Arc<AtomicBool>,
    openings: OpeningSchedule,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(control: Arc<Control>, shutdown: Arc<AtomicBool>) -> Self {
        let openings = match &control.opts.openings_file {
            Some(path) => match OpeningSchedule::load(path) {
                Ok(schedule) => schedule,
                Err(e) => {
                    log::error!("could not load openings, falling back to builtin deck: {e}");
                    OpeningSchedule::builtin()
                }
            },
            None => OpeningSchedule::builtin(),
        };
        Self {
            control,
            shutdown,
            openings,
            state: SupervisorState::new(),
        }
    }

    pub fn spawn(control: Arc<Control>, shutdown: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
        let supervisor = Self::new(control, shutdown);
        std::thread::Builder::new()
            .name("supervisor".to_string())
            .spawn(move || supervisor.run())
            .context("failed to spawn supervisor thread")
    }

    pub fn run(mut self) {
        loop {
            std::thread::sleep(TICK);
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            self.state.tick = self.state.tick.wrapping_add(1);
            if self.state.tick % CLOCK_TICKS == 0 && self.control.opts.use_incremental_time {
                // 時計表示のための周期 tick は busy でも打つ
                self.control.emit_clocks();
            }

            // ワーカーが動いている間は何もしない
            if self.control.status.any_busy() {
                continue;
            }

            let mode = self.control.mode.current();
            if mode != self.state.last_mode {
                self.state.last_mode = mode;
                self.state.analysis_started = false;
                self.state.testset_loaded = false;
            }

            match mode {
                Mode::Normal => self.step_normal(),
                Mode::TwoPlayerEntry | Mode::BookView | Mode::BookAdd => {}
                Mode::Autoplay => self.step_autoplay(),
                Mode::EngineVsEngine => self.step_engine_game(),
                Mode::EngineMatch => self.step_match(),
                Mode::AnalyzeGame => self.step_analyze_game(),
                Mode::AnalyzePdnBatch => self.step_analyze_batch(),
                Mode::ObserveGame => self.step_observe(),
                Mode::RunTestSet => self.step_testset(),
            }
        }
        log::debug!("supervisor loop stopped");
    }

    /// 入力ハンドラが仕込んだ startengine フラグを拾って 1 回だけ探索
    fn step_normal(&mut self) {
        let should_start = {
            let mut session = lock_or_recover(&self.control.session);
            if session.startengine {
                session.startengine = false;
                true
            } else {
                false
            }
        };
        if should_start {
            self.dispatch();
        }
    }

    fn step_autoplay(&mut self) {
        let over = self.consume_gameover();
        if over {
            self.control.set_mode(Mode::Normal);
            self.set_status("game over");
            return;
        }
        self.dispatch();
    }

    fn step_engine_game(&mut self) {
        let over = self.consume_gameover();
        if over {
            lock_or_recover(&self.control.session).current_engine = EngineId::Primary;
            self.control.set_mode(Mode::Normal);
            return;
        }
        let first = {
            let mut session = lock_or_recover(&self.control.session);
            if session.start_match {
                session.start_match = false;
                true
            } else {
                session.current_engine = session.current_engine.toggled();
                false
            }
        };
        if !first {
            let id = lock_or_recover(&self.control.session).current_engine;
            let name = self.control.engine_name(id);
            self.set_status(&name);
        }
        self.dispatch();
    }

    fn step_observe(&mut self) {
        let fresh = {
            let mut session = lock_or_recover(&self.control.session);
            session.current_engine = EngineId::Primary;
            if session.newposition {
                session.newposition = false;
                true
            } else {
                false
            }
        };
        if fresh {
            self.dispatch();
        }
    }

    fn step_analyze_game(&mut self) {
        if self.consume_gameover() {
            self.write_analysis_report(1);
            self.control.set_mode(Mode::Normal);
            self.set_status("Game analysis finished!");
            return;
        }
        if !self.state.analysis_started {
            self.state.analysis_started = true;
            lock_or_recover(&self.control.session).current_engine = EngineId::Primary;
            self.control.forward_all();
            self.dispatch();
            return;
        }
        // 解析済みの位置から 1 手戻し、手前の局面を解析する
        self.control.take_back();
        let over = lock_or_recover(&self.control.session).gameover;
        if !over {
            self.dispatch();
        }
    }

    fn step_analyze_batch(&mut self) {
        let first = {
            let mut session = lock_or_recover(&self.control.session);
            if session.start_match {
                session.start_match = false;
                true
            } else {
                false
            }
        };
        if first {
            self.state.batch_index = 0;
            self.state.batch_games = match load_games(&self.control.opts.games_db) {
                Ok(games) => games,
                Err(e) => {
                    log::error!("batch analysis aborted: {e}");
                    self.set_status(&format!("could not load game database: {e}"));
                    self.control.set_mode(Mode::Normal);
                    return;
                }
            };
            if !self.load_batch_game() {
                self.control.set_mode(Mode::Normal);
                return;
            }
            return;
        }

        if self.consume_gameover() {
            self.write_analysis_report(self.state.batch_index + 1);
            self.state.batch_index += 1;
            self.state.analysis_started = false;
            if !self.load_batch_game() {
                self.control.set_mode(Mode::Normal);
                self.set_status("PDN analysis finished!");
            }
            return;
        }

        if !self.state.analysis_started {
            self.state.analysis_started = true;
            lock_or_recover(&self.control.session).current_engine = EngineId::Primary;
            self.control.forward_all();
            self.dispatch();
            return;
        }
        self.control.take_back();
        let over = lock_or_recover(&self.control.session).gameover;
        if !over {
            self.dispatch();
        }
    }

    fn step_testset(&mut self) {
        if !self.state.testset_loaded {
            let path = &self.control.opts.testset_file;
            self.state.testset_positions = match testset::load_positions(path) {
                Ok(positions) => positions,
                Err(e) => {
                    self.set_status(&format!("could not find {}", path.display()));
                    log::error!("test set unavailable: {e}");
                    self.control.set_mode(Mode::Normal);
                    return;
                }
            };
            self.state.testset_index = 0;
            self.state.testset_loaded = true;
            if let Err(e) = testset::start_log(&self.control.opts.testlog_path()) {
                log::error!("could not create test log: {e}");
            }
        }

        let index = self.state.testset_index;
        let Some(fen) = self.state.testset_positions.get(index).cloned() else {
            self.control.set_mode(Mode::Normal);
            self.set_status("test set finished");
            return;
        };
        self.state.testset_index += 1;

        let header = format!("#{}: {}", index + 1, fen);
        if let Err(e) = testset::append_log(&self.control.opts.testlog_path(), &header) {
            log::error!("could not update test log: {e}");
        }
        self.set_status(&header);
        if !self.control.load_fen(&fen) {
            log::error!("test set position {} is invalid, skipping", index + 1);
            return;
        }
        self.dispatch();
    }

    fn step_match(&mut self) {
        let opts = &self.control.opts;
        let first = {
            let mut session = lock_or_recover(&self.control.session);
            if session.start_match {
                session.start_match = false;
                true
            } else {
                false
            }
        };
        if first {
            // stats.json が残っていればマッチを再開する
            self.state.stats = match MatchStats::load(&opts.stats_path()) {
                Ok(stats) => stats,
                Err(e) => {
                    log::error!("could not read match stats, starting fresh: {e}");
                    MatchStats::default()
                }
            };
            self.state.game_number = self.state.stats.games();
            self.state.move_count = 0;
            self.state.engine_names = (
                self.control.engine_name(EngineId::Primary),
                self.control.engine_name(EngineId::Secondary),
            );
            if self.state.game_number > 0 {
                self.set_status(&format!(
                    "resuming match at game #{}, {}",
                    self.state.game_number + 1,
                    self.state.stats.headline()
                ));
            }
            self.next_match_game();
            return;
        }

        // 長引いた対局は打ち切る
        if self.state.move_count > opts.max_game_moves {
            lock_or_recover(&self.control.session).gameover = true;
        }

        if self.consume_gameover() {
            self.record_match_game();
            self.next_match_game();
            return;
        }

        // 1 手進める: 手番と対局番号から担当エンジンを決める
        self.state.move_count += 1;
        let primary_is_black = self.state.game_number % 2 == 1;
        {
            let mut session = lock_or_recover(&self.control.session);
            let black_to_move = session.color == rcheckers_core::Color::Black;
            session.current_engine = if black_to_move == primary_is_black {
                EngineId::Primary
            } else {
                EngineId::Secondary
            };
        }
        self.dispatch();
    }

    /// 終局した対局を集計し、チェックポイントと対局ログを書く
    fn record_match_game(&mut self) {
        let opts = &self.control.opts;
        let (result, acting_primary, timeline) = {
            let session = lock_or_recover(&self.control.session);
            (
                session.last_result,
                session.current_engine == EngineId::Primary,
                session.timeline.clone(),
            )
        };
        let primary_is_black = self.state.game_number % 2 == 1;
        let tally = self.state.stats.record(
            result,
            self.state.move_count,
            opts.max_game_moves,
            acting_primary,
            primary_is_black,
        );

        if let Err(e) = self.state.stats.save(&opts.stats_path()) {
            log::error!("could not checkpoint match stats: {e}");
        }
        if let Err(e) = append_progress(&opts.progress_path(), tally.symbol) {
            log::error!("could not update match progress log: {e}");
        }

        let mut stored = StoredGame::from_timeline(&timeline);
        let (primary, secondary) = self.state.engine_names.clone();
        if primary_is_black {
            stored.black = primary.clone();
            stored.white = secondary.clone();
        } else {
            stored.black = secondary.clone();
            stored.white = primary.clone();
        }
        stored.event = format!("match game #{}", self.state.game_number);
        stored.result = tally.result_string.to_string();
        if let Err(e) = append_game(&opts.match_games_path(), &stored) {
            log::error!("could not save match game: {e}");
        }

        self.set_status(&format!(
            "{} - {}: {}",
            primary,
            secondary,
            self.state.stats.headline()
        ));
    }

    /// 次のスケジュール対局をセットアップする。スケジュールが尽きたら
    /// Normal へ戻る。
    fn next_match_game(&mut self) {
        let opening_index = (self.state.game_number / 2) as usize;
        let Some(opening) = self.openings.get(opening_index) else {
            let headline = self.state.stats.headline();
            self.control.set_mode(Mode::Normal);
            lock_or_recover(&self.control.session).current_engine = EngineId::Primary;
            self.set_status(&format!("match finished: {headline}"));
            return;
        };

        let (board, color, mut timeline) = match opening.setup() {
            Ok(setup) => setup,
            Err(e) => {
                log::error!("opening '{}' failed to set up: {e}", opening.name);
                self.control.set_mode(Mode::Normal);
                return;
            }
        };
        self.state.move_count = 0;
        self.state.game_number += 1;
        let primary_is_black = self.state.game_number % 2 == 1;
        let (primary, secondary) = self.state.engine_names.clone();
        if primary_is_black {
            timeline.meta.black = primary;
            timeline.meta.white = secondary;
        } else {
            timeline.meta.black = secondary;
            timeline.meta.white = primary;
        }
        timeline.meta.event = opening.name.clone();

        let opts = &self.control.opts;
        {
            let mut session = lock_or_recover(&self.control.session);
            session.board = board;
            session.color = color;
            session.timeline = timeline;
            session.clock.reset(opts.initial_time_ms);
            session.gameover = false;
            session.last_result = ResultCode::Unknown;
            session.reset_move_history = true;
            session.newposition = true;
        }
        self.control.show_board();
        log::info!(
            "match game #{} starts with opening '{}'",
            self.state.game_number,
            opening.name
        );
    }

    fn load_batch_game(&mut self) -> bool {
        let Some(game) = self.state.batch_games.get(self.state.batch_index) else {
            return false;
        };
        match game.replay() {
            Ok((board, color, timeline)) => {
                let mut session = lock_or_recover(&self.control.session);
                session.board = board;
                session.color = color;
                session.timeline = timeline;
                session.gameover = false;
                session.reset_move_history = true;
                session.newposition = true;
                true
            }
            Err(e) => {
                log::error!("stored game #{} is invalid: {e}", self.state.batch_index + 1);
                self.set_status(&format!("stored game #{} is invalid", self.state.batch_index + 1));
                false
            }
        }
    }

    fn write_analysis_report(&self, game_number: usize) {
        let report = {
            let session = lock_or_recover(&self.control.session);
            AnalysisReport::from_timeline(&session.timeline)
        };
        let path = self.control.opts.analysis_path(game_number);
        match report.write(&path) {
            Ok(()) => log::info!("analysis report written to {}", path.display()),
            Err(e) => log::error!("could not write analysis report: {e}"),
        }
    }

    fn consume_gameover(&self) -> bool {
        let mut session = lock_or_recover(&self.control.session);
        if session.gameover {
            session.gameover = false;
            true
        } else {
            false
        }
    }

    /// starting フラグを立ててから探索を依頼する。フラグはワーカーが
    /// 実際に走り出した時点で下ろされる。
    fn dispatch(&self) {
        self.control.status.set_starting(true);
        self.control.play();
    }

    fn set_status(&self, text: &str) {
        let mut session = lock_or_recover(&self.control.session);
        session.status = text.to_string();
        crate::events::emit(&self.control.events, crate::events::UiEvent::Status(text.to_string()));
    }
}
