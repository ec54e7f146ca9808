//! 操作流水账
//!
//! 追加式、按行的文本审计日志：每笔成交（买入/卖出）写一行，带本地时间戳。
//! 只追加，不改写，不删除。

use std::io::Write;
use std::path::{Path, PathBuf};

/// 追加式操作日志：`[2026-08-06 12:00:00] 文本` 一行一笔
#[derive(Debug, Clone)]
pub struct OperationsLog {
    path: PathBuf,
}

impl OperationsLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一行操作记录；父目录不存在时自动创建
    pub fn append(&self, text: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = format!(
            "[{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            text
        );
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_only_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = OperationsLog::new(dir.path().join("operations.log"));

        log.append("u1 卖出信息: a, 3 信用点").unwrap();
        log.append("u2 买入信息: a, 3 信用点").unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.starts_with('[')));
        assert!(lines[1].contains("买入"));
    }
}
