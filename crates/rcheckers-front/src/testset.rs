//! テストセット実行の入出力
//!
//! テストセットは 1 行 1 FEN のテキスト。実行ログは追記専用で、
//! 局面ヘッダと探索ワーカーのステータス行が並ぶ。

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// テストセットを読む。空行と # コメントは無視する。
pub fn load_positions(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not find test set {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// テストログを空にして開始する
pub fn start_log(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, "").with_context(|| format!("failed to create {}", path.display()))?;
    Ok(())
}

/// テストログへ 1 行追記する
pub fn append_log(path: &Path, line: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("failed to append to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_positions_skips_blank_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testset.txt");
        std::fs::write(&path, "# set 1\nB:W18:B15\n\nW:W21:B1\n").unwrap();
        let positions = load_positions(&path).unwrap();
        assert_eq!(positions, vec!["B:W18:B15".to_string(), "W:W21:B1".to_string()]);
    }

    #[test]
    fn test_log_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testlog.txt");
        start_log(&path).unwrap();
        append_log(&path, "#1: B:W18:B15").unwrap();
        append_log(&path, "best=15x22 depth=3 eval=+130").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("#1:"));
        assert_eq!(text.lines().count(), 2);
        // start_log は既存の内容を消す
        start_log(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_testset_is_an_error() {
        assert!(load_positions(Path::new("/nonexistent/testset.txt")).is_err());
    }
}
