//! 解析レポート
//!
//! 解析モードが書き込んだ注釈を (表記, 注釈) の列としてファイルに
//! 残す。1 局 1 ファイルの JSON。

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rcheckers_core::GameTimeline;

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub event: String,
    pub black: String,
    pub white: String,
    pub result: String,
    pub generated_at: String,
    pub moves: Vec<AnalyzedMove>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzedMove {
    pub notation: String,
    #[serde(default)]
    pub annotation: String,
}

impl AnalysisReport {
    pub fn from_timeline(timeline: &GameTimeline) -> Self {
        Self {
            event: timeline.meta.event.clone(),
            black: timeline.meta.black.clone(),
            white: timeline.meta.white.clone(),
            result: timeline.meta.result.clone(),
            generated_at: chrono::Local::now().to_rfc3339(),
            moves: timeline
                .entries()
                .iter()
                .map(|e| AnalyzedMove {
                    notation: e.notation.clone(),
                    annotation: e.annotation.clone(),
                })
                .collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcheckers_core::{Board, Color, generate_moves};

    #[test]
    fn test_report_preserves_order_and_annotations() {
        let mut board = Board::start_position();
        let mut color = Color::Black;
        let mut timeline = GameTimeline::new(Color::Black);
        for _ in 0..3 {
            let m = generate_moves(&board, color).remove(0);
            board.apply(&m);
            timeline.append(m);
            color = color.opponent();
        }
        timeline.entry_mut(0).unwrap().annotation = "best=9-13 depth=5".to_string();
        timeline.entry_mut(2).unwrap().annotation = "best=10-14 depth=5".to_string();

        let report = AnalysisReport::from_timeline(&timeline);
        assert_eq!(report.moves.len(), 3);
        assert_eq!(report.moves[0].annotation, "best=9-13 depth=5");
        assert!(report.moves[1].annotation.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis").join("analysis1.json");
        report.write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: AnalysisReport = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded.moves[2].annotation, "best=10-14 depth=5");
    }
}
