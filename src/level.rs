use std::{fmt, str::FromStr};

use serde::Deserialize;

use crate::error::ConfigError;

/// ログレベル
///
/// 列挙子の順序が重大度の順序であり、後ろの列挙子ほど重大度が高い。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// 重大度の低い順に並べたすべてのログレベル
    pub const ALL: [Level; 4] = [Level::Debug, Level::Info, Level::Warn, Level::Error];

    /// 設定で使用する小文字の名前を返却する。
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }

    /// ログ行に埋め込む大文字のタグを返却する。
    pub fn tag(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    /// `threshold`が設定されているとき、このレベルのメッセージを出力するか確認する。
    pub fn passes(&self, threshold: Level) -> bool {
        *self >= threshold
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownLevel(s.to_string()))
    }
}
