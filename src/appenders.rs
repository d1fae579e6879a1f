use std::{
    fmt::{self, Debug},
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, OnceLock, PoisonError},
};

use regex::Regex;
use time::{OffsetDateTime, UtcOffset};
use tracing_subscriber::fmt::MakeWriter;

use crate::{
    clock::{Clock, SystemClock},
    config::{Config, PartialConfig},
    error::{ConfigError, Error, RotationError},
    level::Level,
    period::{format_timestamp, log_file_name, log_file_path, parse_timestamp, period_label},
};

/// ファイル作成時に書き込むヘッダ行のパターン
///
/// 2番目のグループがファイルを作成した日時。
const HEADER_PATTERN: &str = r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) \[INFO\] Log file created on (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\r?\n?$";

/// ヘッダ行を探すときに読み込む最大バイト数
const HEADER_READ_LIMIT: u64 = 256;

type Diagnostics = Box<dyn Fn(&RotationError) + Send + Sync>;

/// 期間ごとにログファイルを切り替えながらログを記録するロガー
///
/// ログを記録するたびに、現在の期間のログファイルを決定する。そのパスに過去の期間に
/// 作成されたファイルがある場合は、そのファイルを作成された期間の名前に変更（アーカイブ）
/// してから、新しいファイルを作成する。
///
/// 記録したログは、コンソールにも同じ書式で出力する。
pub struct RotatingLogger {
    clock: Box<dyn Clock>,
    diagnostics: Diagnostics,
    state: Mutex<State>,
}

struct State {
    config: Config,
    console: Option<Box<dyn Write + Send>>,
}

/// `tracing-subscriber`の`fmt`レイヤーが書き込むライター
///
/// 書式化済みのバイト列を現在の期間のログファイルに追記する。
#[derive(Debug)]
pub struct RollingWriter<'a>(&'a RotatingLogger);

impl RotatingLogger {
    /// `RotatingLogger`を作成する。
    ///
    /// # 引数
    ///
    /// * config: ロガーの設定。
    ///
    /// # 戻り値
    ///
    /// ホストのローカル時刻を使用して、標準出力にログを複製する`RotatingLogger`インスタンス。
    pub fn new(config: Config) -> RotatingLogger {
        Self {
            clock: Box::new(SystemClock::new()),
            diagnostics: Box::new(|err| eprintln!("error during log file rotation: {}", err)),
            state: Mutex::new(State {
                config,
                console: Some(Box::new(io::stdout())),
            }),
        }
    }

    /// 現在日時を提供する時計を置き換える。
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// ログを複製するコンソールを置き換える。
    pub fn with_console(mut self, console: impl Write + Send + 'static) -> Self {
        self.state_mut().console = Some(Box::new(console));
        self
    }

    /// コンソールへの複製を止める。
    pub fn without_console(mut self) -> Self {
        self.state_mut().console = None;
        self
    }

    /// ファイルの切り替えに失敗したときの報告先を置き換える。
    pub fn with_diagnostics(
        mut self,
        diagnostics: impl Fn(&RotationError) + Send + Sync + 'static,
    ) -> Self {
        self.diagnostics = Box::new(diagnostics);
        self
    }

    /// 現在の設定を返却する。
    pub fn config(&self) -> Config {
        self.lock().config.clone()
    }

    /// 部分的な設定を現在の設定に統合する。
    ///
    /// 指定されていない項目は現在の値を維持する。統合した設定が不正な場合は、
    /// 設定を変更せずにエラーを返却する。
    pub fn configure(&self, partial: &PartialConfig) -> Result<(), ConfigError> {
        let mut state = self.lock();
        state.config = state.config.merged(partial)?;

        Ok(())
    }

    /// 現在の期間のログファイルパスを返却する。
    pub fn current_path(&self) -> PathBuf {
        let state = self.lock();
        let config = &state.config;

        log_file_path(
            &config.log_directory,
            config.base_name(),
            config.rotate_by,
            &self.clock.now(),
        )
    }

    /// ログを記録する。
    ///
    /// 設定されたログレベルより低いレベルのログは、何もせずに破棄する。
    ///
    /// # 引数
    ///
    /// * level: ログレベル。
    /// * message: メッセージ。
    ///
    /// # 戻り値
    ///
    /// ディレクトリ、ファイルの作成、またはログの追記に失敗した場合はエラー。
    /// ファイルの切り替えの失敗は診断用の報告先に報告し、ログの追記を継続する。
    pub fn log(&self, level: Level, message: &str) -> Result<(), Error> {
        let mut rotation_failure = None;
        let result = {
            let mut guard = self.lock();
            let State { config, console } = &mut *guard;
            if !level.passes(config.log_level) {
                return Ok(());
            }

            let now = self.clock.now();
            let line = format_entry(&now, level, message);
            let result = append_to_period_file(
                config,
                &*self.clock,
                &now,
                format!("{}\n", line).as_bytes(),
                &mut rotation_failure,
            );
            if result.is_ok() {
                if let Some(console) = console.as_mut() {
                    let _ = writeln!(console, "{}", line).and_then(|()| console.flush());
                }
            }
            result
        };
        self.report(rotation_failure);

        result
    }

    /// `Debug`レベルのログを記録する。
    pub fn debug(&self, message: &str) -> Result<(), Error> {
        self.log(Level::Debug, message)
    }

    /// `Info`レベルのログを記録する。
    pub fn info(&self, message: &str) -> Result<(), Error> {
        self.log(Level::Info, message)
    }

    /// `Warn`レベルのログを記録する。
    pub fn warn(&self, message: &str) -> Result<(), Error> {
        self.log(Level::Warn, message)
    }

    /// `Error`レベルのログを記録する。
    pub fn error(&self, message: &str) -> Result<(), Error> {
        self.log(Level::Error, message)
    }

    /// 書式化済みのバイト列を、レベルによる選別とコンソールへの複製をせずに追記する。
    fn append_raw(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut rotation_failure = None;
        let result = {
            let state = self.lock();
            let now = self.clock.now();
            append_to_period_file(
                &state.config,
                &*self.clock,
                &now,
                bytes,
                &mut rotation_failure,
            )
        };
        self.report(rotation_failure);

        result
    }

    fn report(&self, rotation_failure: Option<RotationError>) {
        if let Some(err) = rotation_failure {
            (self.diagnostics)(&err);
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RotatingLogger {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Debug for RotatingLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingLogger")
            .field("config", &self.lock().config)
            .finish_non_exhaustive()
    }
}

impl<'a> MakeWriter<'a> for RotatingLogger {
    type Writer = RollingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RollingWriter(self)
    }
}

impl io::Write for RollingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.append_raw(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// ログエントリを`YYYY-MM-DD HH:mm:ss [LEVEL] message`の形式にする。
fn format_entry(now: &OffsetDateTime, level: Level, message: &str) -> String {
    format!("{} [{}] {}", format_timestamp(now), level.tag(), message)
}

/// 新しく作成したログファイルの先頭に書き込むヘッダ行を作成する。
fn format_header(now: &OffsetDateTime) -> String {
    let timestamp = format_timestamp(now);
    format!("{} [INFO] Log file created on {}\n", timestamp, timestamp)
}

/// 現在の期間のログファイルにバイト列を追記する。
///
/// ファイルの切り替えに失敗した場合は、`rotation_failure`にエラーを設定して追記を継続する。
fn append_to_period_file(
    config: &Config,
    clock: &dyn Clock,
    now: &OffsetDateTime,
    bytes: &[u8],
    rotation_failure: &mut Option<RotationError>,
) -> Result<(), Error> {
    ensure_directory(&config.log_directory)?;

    let path = log_file_path(
        &config.log_directory,
        config.base_name(),
        config.rotate_by,
        now,
    );
    if let Err(err) = archive_if_stale(&path, config, clock, now) {
        *rotation_failure = Some(err);
    }

    let mut file = open_log_file(&path, now)?;
    file.write_all(bytes)
        .map_err(|source| Error::Append { path, source })
}

/// ディレクトリと、存在しない祖先のディレクトリを作成する。
fn ensure_directory(directory: &Path) -> Result<(), Error> {
    fs::create_dir_all(directory).map_err(|source| Error::CreateDirectory {
        path: directory.to_path_buf(),
        source,
    })
}

/// `path`のファイルが過去の期間に作成されていた場合、その期間の名前に変更する。
///
/// # 戻り値
///
/// ファイルの名前を変更した場合は、変更後のパス。
fn archive_if_stale(
    path: &Path,
    config: &Config,
    clock: &dyn Clock,
    now: &OffsetDateTime,
) -> Result<Option<PathBuf>, RotationError> {
    let created = match file_created_at(path, clock, now.offset())? {
        Some(created) => created,
        None => return Ok(None),
    };
    let last_period = period_label(&created, config.rotate_by);
    if last_period == period_label(now, config.rotate_by) {
        return Ok(None);
    }

    let archive = archive_path(config, &last_period);
    fs::rename(path, &archive).map_err(|source| RotationError::Archive {
        from: path.to_path_buf(),
        to: archive.clone(),
        source,
    })?;

    Ok(Some(archive))
}

/// ログファイルが作成された日時を返却する。
///
/// 先頭行がヘッダ行であれば、ヘッダに記録された日時を返却する。ヘッダ行がない場合は、
/// ファイルの最終更新日時を、その時点のローカル時刻に変換して代用する。
/// ファイルが存在しない場合は`None`を返却する。
fn file_created_at(
    path: &Path,
    clock: &dyn Clock,
    offset: UtcOffset,
) -> Result<Option<OffsetDateTime>, RotationError> {
    let inspect = |source| RotationError::Inspect {
        path: path.to_path_buf(),
        source,
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(inspect(err)),
    };

    let mut first_line = Vec::new();
    BufReader::new((&file).take(HEADER_READ_LIMIT))
        .read_until(b'\n', &mut first_line)
        .map_err(inspect)?;
    if let Some(created) = header_timestamp(&first_line, offset) {
        return Ok(Some(created));
    }

    let modified = file
        .metadata()
        .and_then(|metadata| metadata.modified())
        .map_err(inspect)?;

    let modified = OffsetDateTime::from(modified);

    Ok(Some(modified.to_offset(clock.offset_at(modified))))
}

/// ヘッダ行から、ファイルを作成した日時を取り出す。
fn header_timestamp(line: &[u8], offset: UtcOffset) -> Option<OffsetDateTime> {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    let header = HEADER.get_or_init(|| {
        Regex::new(HEADER_PATTERN)
            .expect("Unable to compile the header pattern; this is a bug in logit-pro")
    });

    let line = std::str::from_utf8(line).ok()?;
    let captures = header.captures(line)?;

    parse_timestamp(captures.get(2)?.as_str(), offset)
}

/// 過去の期間のファイルを保存するパスを返却する。
///
/// その期間の名前のファイルが既に存在する場合は、存在しない連番付きの名前を返却する。
fn archive_path(config: &Config, label: &str) -> PathBuf {
    let mut sequence = 0;
    loop {
        let candidate = config.log_directory.join(log_file_name(
            config.base_name(),
            config.rotate_by,
            label,
            sequence,
        ));
        if !candidate.exists() {
            return candidate;
        }
        sequence += 1;
    }
}

/// ログファイルを追記モードで開く。
///
/// ファイルが存在しない場合は作成して、ヘッダ行を書き込む。
fn open_log_file(path: &Path, now: &OffsetDateTime) -> Result<File, Error> {
    let create_file = |source| Error::CreateFile {
        path: path.to_path_buf(),
        source,
    };

    match OpenOptions::new().append(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(format_header(now).as_bytes())
                .map_err(create_file)?;
            Ok(file)
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| Error::Append {
                path: path.to_path_buf(),
                source,
            }),
        Err(err) => Err(create_file(err)),
    }
}
