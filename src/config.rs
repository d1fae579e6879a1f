use std::path::PathBuf;

use serde::Deserialize;

use crate::{error::ConfigError, level::Level, period::Rotation};

/// ロガーの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// ログファイルを作成するディレクトリ
    pub log_directory: PathBuf,
    /// 出力する最低のログレベル
    pub log_level: Level,
    /// ログファイル名。最初の`.`より前の部分だけをファイル名に使用する。
    pub file_name: String,
    /// ファイルを切り替えるタイミング
    pub rotate_by: Rotation,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from("./logs"),
            log_level: Level::Debug,
            file_name: String::from("logit-pro.log"),
            rotate_by: Rotation::Daily,
        }
    }
}

impl Config {
    /// ログファイル名から拡張子を除いた名前を返却する。
    pub fn base_name(&self) -> &str {
        base_name(&self.file_name)
    }

    /// 部分的な設定を統合した設定を返却する。
    ///
    /// 統合した結果が不正な場合はエラーを返却し、`self`は変更しない。
    pub fn merged(&self, partial: &PartialConfig) -> Result<Config, ConfigError> {
        let mut merged = self.clone();
        if let Some(log_directory) = &partial.log_directory {
            merged.log_directory = log_directory.clone();
        }
        if let Some(log_level) = partial.log_level {
            merged.log_level = log_level;
        }
        if let Some(file_name) = &partial.file_name {
            merged.file_name = file_name.clone();
        }
        if let Some(rotate_by) = partial.rotate_by {
            merged.rotate_by = rotate_by;
        }
        merged.validate()?;

        Ok(merged)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_name();
        if base.is_empty() || base.contains(['/', '\\']) {
            return Err(ConfigError::InvalidFileName(self.file_name.clone()));
        }

        Ok(())
    }
}

/// 一部の項目だけを指定する設定
///
/// `None`の項目は、統合するときに現在の値を維持する。
/// TOMLから読み込む場合、キーは`logDirectory`、`logLevel`、`fileName`、`rotateBy`で、
/// それ以外のキーはエラーになる。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialConfig {
    pub log_directory: Option<PathBuf>,
    pub log_level: Option<Level>,
    pub file_name: Option<String>,
    pub rotate_by: Option<Rotation>,
}

impl PartialConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// TOML形式の文字列から部分的な設定を読み込む。
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn log_directory(mut self, log_directory: impl Into<PathBuf>) -> Self {
        self.log_directory = Some(log_directory.into());
        self
    }

    pub fn log_level(mut self, log_level: Level) -> Self {
        self.log_level = Some(log_level);
        self
    }

    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn rotate_by(mut self, rotate_by: Rotation) -> Self {
        self.rotate_by = Some(rotate_by);
        self
    }
}

fn base_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(PathBuf::from("./logs"), config.log_directory);
        assert_eq!(Level::Debug, config.log_level);
        assert_eq!("logit-pro", config.base_name());
        assert_eq!(Rotation::Daily, config.rotate_by);
    }

    #[test]
    fn test_base_name_uses_portion_before_first_dot() {
        assert_eq!("app", base_name("app.log"));
        assert_eq!("app", base_name("app.2025.log"));
        assert_eq!("app", base_name("app"));
    }

    #[test]
    fn test_merge_keeps_unspecified_fields() {
        let config = Config::default();
        let merged = config
            .merged(&PartialConfig::new().log_level(Level::Warn))
            .unwrap();
        assert_eq!(Level::Warn, merged.log_level);
        assert_eq!(config.file_name, merged.file_name);
        assert_eq!(config.log_directory, merged.log_directory);
        assert_eq!(config.rotate_by, merged.rotate_by);
    }

    #[test]
    fn test_merge_rejects_invalid_file_name() {
        let config = Config::default();
        for name in [".log", "", "nested/app.log"] {
            let result = config.merged(&PartialConfig::new().file_name(name));
            assert!(matches!(result, Err(ConfigError::InvalidFileName(_))));
        }
    }

    #[test]
    fn test_from_toml_str() {
        let partial = PartialConfig::from_toml_str(
            r#"
            logDirectory = "./mylogs"
            logLevel = "error"
            fileName = "myapp.log"
            rotateBy = "weekly"
            "#,
        )
        .unwrap();
        assert_eq!(
            PartialConfig::new()
                .log_directory("./mylogs")
                .log_level(Level::Error)
                .file_name("myapp.log")
                .rotate_by(Rotation::Weekly),
            partial
        );
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_keys() {
        let result = PartialConfig::from_toml_str(r#"maxSize = 1024"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_level() {
        let result = PartialConfig::from_toml_str(r#"logLevel = "fatal""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
