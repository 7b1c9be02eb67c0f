//! マッチ統計
//!
//! 勝敗は「プライマリエンジンから見た」集計で、先手（黒）を持った
//! 対局の勝敗も別に数える。1 局終わるごとに stats.json へ書き出し、
//! match_progress.txt に記号を 1 つ追記する。既存の stats.json が
//! あればマッチはそこから再開される。

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rcheckers_engine::ResultCode;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub unknowns: u32,
    /// プライマリが黒番（先手）で勝った数
    pub black_wins: u32,
    /// プライマリが黒番で負けた数
    pub black_losses: u32,
}

/// 1 局分の記録結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameTally {
    /// match_progress.txt へ追記する記号
    pub symbol: char,
    /// PDN 形式の結果文字列（"1-0" など）
    pub result_string: &'static str,
}

impl MatchStats {
    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.draws + self.unknowns
    }

    /// 1 局の結果を数える。
    ///
    /// - result は最後に指したエンジンの申告（acting_primary がその主体か）
    /// - primary_is_black はこの局でプライマリが黒番だったか
    /// - 手数超過は結果によらず unknown
    pub fn record(
        &mut self,
        result: ResultCode,
        move_count: u32,
        max_moves: u32,
        acting_primary: bool,
        primary_is_black: bool,
    ) -> GameTally {
        if move_count > max_moves {
            self.unknowns += 1;
            return GameTally {
                symbol: '?',
                result_string: "*",
            };
        }

        // Win/Loss はプライマリ視点に正規化する
        let primary_won = match (result, acting_primary) {
            (ResultCode::Win, true) | (ResultCode::Loss, false) => Some(true),
            (ResultCode::Win, false) | (ResultCode::Loss, true) => Some(false),
            (ResultCode::Draw, _) => None,
            (ResultCode::Unknown, _) => {
                self.unknowns += 1;
                return GameTally {
                    symbol: '?',
                    result_string: "*",
                };
            }
        };

        match primary_won {
            None => {
                self.draws += 1;
                GameTally {
                    symbol: '=',
                    result_string: "1/2-1/2",
                }
            }
            Some(true) => {
                self.wins += 1;
                if primary_is_black {
                    self.black_wins += 1;
                }
                GameTally {
                    symbol: '+',
                    result_string: if primary_is_black { "1-0" } else { "0-1" },
                }
            }
            Some(false) => {
                self.losses += 1;
                if primary_is_black {
                    self.black_losses += 1;
                }
                GameTally {
                    symbol: '-',
                    result_string: if primary_is_black { "0-1" } else { "1-0" },
                }
            }
        }
    }

    /// ウィンドウタイトル相当の 1 行表示
    pub fn headline(&self) -> String {
        format!(
            "W-L-D:{}-{}-{}",
            self.wins,
            self.losses,
            self.draws + self.unknowns
        )
    }

    /// チェックポイントから読む。ファイルがなければ空の統計。
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read stats {}", path.display()))?;
        let stats = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse stats {}", path.display()))?;
        Ok(stats)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("failed to serialize stats")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write stats {}", path.display()))?;
        Ok(())
    }
}

/// マッチ進行ログへ記号を 1 つ追記する（追記専用）
pub fn append_progress(path: &Path, symbol: char) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    write!(file, "{symbol}").with_context(|| format!("failed to append to {}", path.display()))?;
    Ok(())
}
