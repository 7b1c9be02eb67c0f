//! 実行オプション
//!
//! TOML ファイルから読み、時間系の値は読み込み時にクランプする。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rcheckers_core::{MAX_CLOCK_MS, MIN_CLOCK_MS};

/// イングリッシュチェッカーのゲームタイプコード
pub const GT_ENGLISH: u8 = 21;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// フィッシャー式インクリメンタル時間制御を使うか
    pub use_incremental_time: bool,
    /// 初期持ち時間（ms）
    pub initial_time_ms: u64,
    /// 1 手ごとの増分（ms）
    pub increment_ms: u64,
    /// 固定レベル時の 1 手あたり思考時間（ms）
    pub level_ms: u64,
    /// レベル時間を厳密に使い切るようエンジンへ指示する
    pub exact_time: bool,
    /// ユーザーブックを探索前に引くか
    pub user_book: bool,
    /// エンジンのステータス行を指し手コメントとして保存する
    pub add_comment: bool,
    /// マッチでプライマリエンジンの持ち時間を半分にするハンデ
    pub handicap: bool,
    /// アニメーション 1 手の所要時間（ms、0 で無効）
    pub animation_ms: u64,
    /// 探索キャンセル待ちの上限（ms）。超過したら競合操作を強行する。
    pub cancel_wait_ms: u64,
    /// これを超えた対局は引き分け扱い（unknown）で打ち切る
    pub max_game_moves: u32,
    /// ゲームタイプコード。GT_ENGLISH なら盤面照合で指し手を復元する。
    pub gametype: u8,
    /// マッチ成果物（stats.json / match_progress.txt / games.jsonl）の置き場
    pub match_dir: PathBuf,
    /// 解析レポート・テストログの置き場
    pub docs_dir: PathBuf,
    /// テストセット（1 行 1 FEN）
    pub testset_file: PathBuf,
    /// オープニングスケジュール。未指定なら組み込みのデッキを使う。
    pub openings_file: Option<PathBuf>,
    /// バッチ解析が読む棋譜データベース（JSONL）
    pub games_db: PathBuf,
    /// ユーザーブックの保存先
    pub book_file: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            use_incremental_time: false,
            initial_time_ms: 300_000,
            increment_ms: 2_000,
            level_ms: 1_000,
            exact_time: false,
            user_book: true,
            add_comment: false,
            handicap: false,
            animation_ms: 400,
            cancel_wait_ms: 1_000,
            max_game_moves: 200,
            gametype: GT_ENGLISH,
            match_dir: PathBuf::from("match"),
            docs_dir: PathBuf::from("docs"),
            testset_file: PathBuf::from("testset.txt"),
            openings_file: None,
            games_db: PathBuf::from("games.jsonl"),
            book_file: PathBuf::from("book.json"),
        }
    }
}

impl Options {
    /// TOML ファイルから読む。存在しなければデフォルト。
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("options file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut opts: Options = toml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        opts.clamp_times();
        Ok(opts)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("failed to serialize options")?;
        std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// 時間系の入力を安全な範囲へ丸める
    pub fn clamp_times(&mut self) {
        self.initial_time_ms = self.initial_time_ms.clamp(MIN_CLOCK_MS, MAX_CLOCK_MS);
        self.increment_ms = self.increment_ms.min(MAX_CLOCK_MS);
        self.level_ms = self.level_ms.clamp(MIN_CLOCK_MS, MAX_CLOCK_MS);
        self.cancel_wait_ms = self.cancel_wait_ms.clamp(10, 60_000);
    }

    pub fn stats_path(&self) -> PathBuf {
        self.match_dir.join("stats.json")
    }

    pub fn progress_path(&self) -> PathBuf {
        self.match_dir.join("match_progress.txt")
    }

    pub fn match_games_path(&self) -> PathBuf {
        self.match_dir.join("games.jsonl")
    }

    pub fn testlog_path(&self) -> PathBuf {
        self.docs_dir.join("testlog.txt")
    }

    pub fn analysis_path(&self, game_number: usize) -> PathBuf {
        self.docs_dir.join(format!("analysis{game_number}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let mut opts = Options::default();
        opts.initial_time_ms = u64::MAX;
        opts.level_ms = 0;
        opts.cancel_wait_ms = 0;
        opts.clamp_times();
        assert_eq!(opts.initial_time_ms, MAX_CLOCK_MS);
        assert_eq!(opts.level_ms, MIN_CLOCK_MS);
        assert_eq!(opts.cancel_wait_ms, 10);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let opts = Options::load(Path::new("/nonexistent/rcheckers.toml")).unwrap();
        assert_eq!(opts.gametype, GT_ENGLISH);
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.toml");
        let mut opts = Options::default();
        opts.use_incremental_time = true;
        opts.animation_ms = 0;
        opts.save(&path).unwrap();
        let loaded = Options::load(&path).unwrap();
        assert!(loaded.use_incremental_time);
        assert_eq!(loaded.animation_ms, 0);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let opts: Options = toml::from_str("level_ms = 500\n").unwrap();
        assert_eq!(opts.level_ms, 500);
        assert!(opts.user_book);
    }
}
