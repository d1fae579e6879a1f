use std::{io, path::PathBuf};

use thiserror::Error;

/// ログの書き込みに失敗したときのエラー
///
/// 呼び出し元に返却されるエラーで、ログファイルに何も記録されなかったことを示す。
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to create log directory `{}`: {source}", path.display())]
    CreateDirectory { path: PathBuf, source: io::Error },

    #[error("failed to create log file `{}`: {source}", path.display())]
    CreateFile { path: PathBuf, source: io::Error },

    #[error("failed to append to log file `{}`: {source}", path.display())]
    Append { path: PathBuf, source: io::Error },
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::CreateDirectory { source, .. }
            | Error::CreateFile { source, .. }
            | Error::Append { source, .. } => source.kind(),
        };
        io::Error::new(kind, err)
    }
}

/// ログファイルの切り替えに失敗したときのエラー
///
/// 呼び出し元には返却せず、診断用のシンクに報告したあと、ログの書き込みを継続する。
#[derive(Debug, Error)]
pub enum RotationError {
    #[error("failed to inspect log file `{}`: {source}", path.display())]
    Inspect { path: PathBuf, source: io::Error },

    #[error("failed to archive log file `{}` to `{}`: {source}", from.display(), to.display())]
    Archive {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// 設定が不正なときのエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown log level `{0}`; expected one of debug, info, warn, error")]
    UnknownLevel(String),

    #[error("unknown rotation `{0}`; expected one of daily, weekly, monthly, yearly")]
    UnknownRotation(String),

    #[error("invalid log file name `{0}`")]
    InvalidFileName(String),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
