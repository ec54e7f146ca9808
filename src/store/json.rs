//! JSON 记录存储
//!
//! 每个逻辑集合一个文件，整结构读入/整结构写出；文件缺失时用调用方提供的空形状
//! 初始化并落盘。写入走「临时文件 + rename」，后续读取看不到半成品。

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// 目录级 JSON 存储：按集合名读写整个结构
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 加载集合；文件不存在时写入 init 产生的空形状并返回它
    pub fn load_or_init<T>(&self, name: &str, init: impl FnOnce() -> T) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let path = self.dir.join(name);
        if !path.exists() {
            let value = init();
            self.write_atomic(&path, &value)?;
            return Ok(value);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// 整结构覆盖写出集合
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> anyhow::Result<()> {
        self.write_atomic(&self.dir.join(name), value)
    }

    /// 写临时文件再 rename；父目录不存在时自动创建
    fn write_atomic<T: Serialize>(&self, path: &Path, value: &T) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_initialized_with_empty_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let users: HashMap<String, i64> = store.load_or_init("users.json", HashMap::new).unwrap();
        assert!(users.is_empty());
        // 空形状已落盘
        assert!(dir.path().join("users.json").exists());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let mut table = HashMap::new();
        table.insert("u1".to_string(), 42i64);
        store.save("balances.json", &table).unwrap();

        let loaded: HashMap<String, i64> =
            store.load_or_init("balances.json", HashMap::new).unwrap();
        assert_eq!(loaded.get("u1"), Some(&42));
    }

    #[test]
    fn test_unknown_keys_preserved() {
        // 整结构 round-trip：结构体之外的键通过 flatten 的 extra 保留
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        #[derive(serde::Serialize, serde::Deserialize)]
        struct Rec {
            name: String,
            #[serde(flatten)]
            extra: serde_json::Map<String, serde_json::Value>,
        }

        std::fs::write(
            dir.path().join("rec.json"),
            r#"{"name":"a","future_field":7}"#,
        )
        .unwrap();
        let rec: Rec = store.load_or_init("rec.json", || unreachable!()).unwrap();
        store.save("rec.json", &rec).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("rec.json")).unwrap())
                .unwrap();
        assert_eq!(raw["future_field"], 7);
    }
}
