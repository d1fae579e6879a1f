//! LogIt Pro
//!
//! ----------------------------------------------------------------------------
//!
//! このクレートには、`RotatingLogger`構造体が含まれており、この構造体は、
//! レベル付きのログを、期間ごとに切り替えるローカルのファイルに記録することを目的としている。
//! 記録したログは、同じ書式でコンソールにも出力する。
//!
//! `RotatingLogger`は、以下いずれかの期間でログファイルを切り替える。
//!
//! - 日毎
//! - 週毎（日曜日始まり）
//! - 月毎
//! - 年毎
//!
//! ログファイル名は`{ファイル名}-{期間の種類}-{期間のラベル}.log`となる。
//! ファイルの切り替えはタイマーを使用せず、ログを記録するたびに判定する。
//! 現在の期間のパスに過去の期間に作成されたファイルがある場合、`RotatingLogger`は、
//! そのファイルを作成された期間の名前に変更してから、新しいファイルを作成する。
//!
//! `RotatingLogger`は`tracing-subscriber`の`MakeWriter`を実装しているため、
//! `fmt`レイヤーの出力先としても使用できる。

pub mod appenders;
pub mod clock;
pub mod config;
pub mod error;
pub mod level;
pub mod period;

pub use appenders::{RollingWriter, RotatingLogger};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, PartialConfig};
pub use error::{ConfigError, Error, RotationError};
pub use level::Level;
pub use period::{log_file_path, period_label, Rotation};
