//! ログインフラモジュール
//!
//! 各行の先頭に `[<レベル>] [PID:<pid>] [<ファイル名>:<行番号>] ` を付けて出力する。
//! 呼び出し元の位置は`#[track_caller]`で取得する。
//!
//! ```no_run
//! use svc_base::{log_info, LoggerSlot};
//!
//! static LOGGER: LoggerSlot = LoggerSlot::new();
//!
//! LOGGER.init("debug", "");
//! log_info!(LOGGER, "ロガーを初期化しました");
//! LOGGER.increase_log_level("error");
//! LOGGER.release();
//! ```

use crate::error::LoggerError;
use crate::rotation::{RotatingFile, RotationPolicy};
use crate::severity::{Emission, Severity};
use std::fmt;
use std::io::{self, Write};
use std::panic::Location;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::Dispatch;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt as tracing_fmt, reload, Registry};

/// ISO-8601形式（ミリ秒・タイムゾーン付き）
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// ローカル時刻のタイムスタンプ
struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", chrono::Local::now().format(TIMESTAMP_FORMAT))
    }
}

/// コンソール出力先（フラッシュ用に共有する）
struct SharedConsole<W>(Arc<W>);

impl<'a, W> MakeWriter<'a> for SharedConsole<W>
where
    W: MakeWriter<'a>,
{
    type Writer = W::Writer;

    fn make_writer(&'a self) -> Self::Writer {
        W::make_writer(&self.0)
    }
}

type FlushFn = Box<dyn Fn() + Send + Sync>;

/// ロガー設定
#[derive(Debug, Clone, Default)]
pub struct LoggerConfig {
    /// 最低出力レベル
    pub level: Severity,
    /// ログファイルパス（Noneならコンソールのみ）
    pub file: Option<PathBuf>,
    /// ファイルのローテーション方針
    pub rotation: RotationPolicy,
}

impl LoggerConfig {
    /// レベル名とパスから設定を作成
    ///
    /// パスが空文字列ならコンソールのみに出力する。
    pub fn from_args(level: &str, path: &str) -> Self {
        Self {
            level: Severity::from_level_name(level),
            file: (!path.is_empty()).then(|| PathBuf::from(path)),
            rotation: RotationPolicy::default(),
        }
    }
}

type FilterHandle = reload::Handle<LevelFilter, Registry>;

struct LoggerInner {
    dispatch: Dispatch,
    filter: FilterHandle,
    file: Option<RotatingFile>,
    flush_console: FlushFn,
    pid: String,
    released: AtomicBool,
}

/// ロガー
///
/// 複製しても同じ出力先とレベルを共有する。
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .field("file", &self.inner.file.as_ref().map(RotatingFile::path))
            .field("pid", &self.inner.pid)
            .finish()
    }
}

impl Logger {
    /// 標準出力に出力するロガーを作成
    pub fn new(config: &LoggerConfig) -> Result<Self, LoggerError> {
        Self::with_console_writer(config, io::stdout)
    }

    /// 任意のコンソール出力先でロガーを作成
    pub fn with_console_writer<W>(config: &LoggerConfig, console: W) -> Result<Self, LoggerError>
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let file = config
            .file
            .as_deref()
            .map(|path| RotatingFile::open(path, &config.rotation))
            .transpose()?;
        Ok(Self::assemble(config.level, console, file))
    }

    fn assemble<W>(level: Severity, console: W, file: Option<RotatingFile>) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let console = Arc::new(console);
        let flush_console: FlushFn = {
            let console = Arc::clone(&console);
            Box::new(move || {
                let _ = W::make_writer(&console).flush();
            })
        };
        let console = SharedConsole(console);

        // ファイル指定時はコンソールとファイルの両方に出力
        let writer = match &file {
            Some(file) => BoxMakeWriter::new(console.and(file.clone())),
            None => BoxMakeWriter::new(console),
        };

        let (level_filter, filter) = reload::Layer::new(level.as_level_filter());
        let subscriber = Registry::default().with(level_filter).with(
            tracing_fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_timer(LocalTimestamp)
                .with_writer(writer),
        );

        Self {
            inner: Arc::new(LoggerInner {
                dispatch: Dispatch::new(subscriber),
                filter,
                file,
                flush_console,
                pid: std::process::id().to_string(),
                released: AtomicBool::new(false),
            }),
        }
    }

    /// グローバルなtracingの出力先として登録
    ///
    /// ライブラリ内部の`tracing`マクロもこのロガーに出力される。
    pub fn install_global(&self) -> Result<(), LoggerError> {
        tracing::dispatcher::set_global_default(self.inner.dispatch.clone())
            .map_err(|_| LoggerError::GlobalAlreadySet)
    }

    /// 現在の最低出力レベル
    pub fn level(&self) -> Severity {
        self.inner
            .filter
            .with_current(|filter| Severity::from_level_filter(*filter))
            .unwrap_or_default()
    }

    /// ログレベルを変更
    ///
    /// 引き上げを想定しているが、引き下げ要求も拒否せずそのまま適用する。
    pub fn increase_log_level(&self, level: &str) {
        let severity = Severity::from_level_name(level);
        // 呼び出し箇所のキャッシュはスコープ内のディスパッチャで再計算される
        tracing::dispatcher::with_default(&self.inner.dispatch, || {
            // サブスクライバはinnerが保持しているため失敗しない
            let _ = self
                .inner
                .filter
                .modify(|filter| *filter = severity.as_level_filter());
        });
    }

    /// バッファ済みの出力をすべて書き出す
    ///
    /// 以降の出力も受け付けるが、出力先によっては失われることがある。
    pub fn release(&self) {
        // ロガーは呼び出し元にエラーを返さない
        (self.inner.flush_console)();
        if let Some(file) = &self.inner.file {
            let _ = file.flush();
        }
        self.inner.released.store(true, Ordering::SeqCst);
    }

    /// `release`済みかどうか
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    #[track_caller]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.emit(Emission::Debug, Location::caller(), args);
    }

    #[track_caller]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.emit(Emission::Info, Location::caller(), args);
    }

    #[track_caller]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.emit(Emission::Warn, Location::caller(), args);
    }

    #[track_caller]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.emit(Emission::Error, Location::caller(), args);
    }

    /// 出力後にパニックする
    #[track_caller]
    pub fn panic(&self, args: fmt::Arguments<'_>) -> ! {
        self.emit(Emission::Panic, Location::caller(), args);
        panic!("{}", args);
    }

    /// 出力後にプロセスを終了する（終了コード1）
    #[track_caller]
    pub fn fatal(&self, args: fmt::Arguments<'_>) -> ! {
        self.emit(Emission::Fatal, Location::caller(), args);
        self.release();
        std::process::exit(1);
    }

    fn emit(&self, emission: Emission, location: &Location<'_>, args: fmt::Arguments<'_>) {
        let line = format!(
            "{}{}",
            format_prefix(emission, &self.inner.pid, location),
            args
        );

        // レベル判定はサブスクライバ側のフィルタに任せる
        tracing::dispatcher::with_default(&self.inner.dispatch, || {
            match emission.severity() {
                Severity::Debug => tracing::debug!("{}", line),
                Severity::Info => tracing::info!("{}", line),
                Severity::Warn => tracing::warn!("{}", line),
                Severity::Error => tracing::error!("{}", line),
            }
        });
    }
}

/// 行頭のプレフィックスを生成
fn format_prefix(emission: Emission, pid: &str, location: &Location<'_>) -> String {
    let file = location.file();
    let file_name = file.rsplit(['/', '\\']).next().unwrap_or(file);
    format!(
        "[{}] [PID:{}] [{}:{}] ",
        emission.label(),
        pid,
        file_name,
        location.line()
    )
}

/// プロセス全体で1つのロガーを保持する枠
///
/// 最初の`init`だけが有効になり、以降の呼び出しは無視される。
/// 初期化前の出力はすべて何もしない。
#[derive(Debug, Default)]
pub struct LoggerSlot {
    cell: OnceLock<Logger>,
}

impl LoggerSlot {
    /// 未初期化の枠を作成
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// ロガーを初期化
    ///
    /// この呼び出しで初期化された場合はtrueを返す。
    /// ログファイルを開けない場合はコンソールのみで初期化する。
    pub fn init(&self, level: &str, path: &str) -> bool {
        let initialized = self.init_with(&LoggerConfig::from_args(level, path), io::stdout);
        if initialized {
            if let Some(logger) = self.get() {
                let _ = logger.install_global();
            }
        }
        initialized
    }

    /// 設定とコンソール出力先を指定して初期化
    pub fn init_with<W>(&self, config: &LoggerConfig, console: W) -> bool
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let mut initialized = false;
        self.cell.get_or_init(|| {
            initialized = true;
            build_or_fallback(config, console)
        });
        initialized
    }

    /// 初期化済みのロガー
    pub fn get(&self) -> Option<&Logger> {
        self.cell.get()
    }

    /// 初期化済みかどうか
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// `release`済みかどうか
    pub fn is_released(&self) -> bool {
        self.get().is_some_and(Logger::is_released)
    }

    /// 現在の最低出力レベル（未初期化ならNone）
    pub fn level(&self) -> Option<Severity> {
        self.get().map(Logger::level)
    }

    /// ログレベルを変更（未初期化なら何もしない）
    pub fn increase_log_level(&self, level: &str) {
        if let Some(logger) = self.get() {
            logger.increase_log_level(level);
        }
    }

    /// 出力をすべて書き出す（未初期化なら何もしない）
    pub fn release(&self) {
        if let Some(logger) = self.get() {
            logger.release();
        }
    }

    /// スコープを抜けるとき（パニック時を含む）に`release`するガードを返す
    pub fn release_on_drop(&self) -> ReleaseGuard<'_> {
        ReleaseGuard { slot: self }
    }

    #[track_caller]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        if let Some(logger) = self.get() {
            logger.debug(args);
        }
    }

    #[track_caller]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        if let Some(logger) = self.get() {
            logger.info(args);
        }
    }

    #[track_caller]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        if let Some(logger) = self.get() {
            logger.warn(args);
        }
    }

    #[track_caller]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        if let Some(logger) = self.get() {
            logger.error(args);
        }
    }

    /// 初期化済みなら出力後にパニックする
    #[track_caller]
    pub fn panic(&self, args: fmt::Arguments<'_>) {
        if let Some(logger) = self.get() {
            logger.panic(args);
        }
    }

    /// 初期化済みなら出力後にプロセスを終了する
    #[track_caller]
    pub fn fatal(&self, args: fmt::Arguments<'_>) {
        if let Some(logger) = self.get() {
            logger.fatal(args);
        }
    }
}

/// スコープ終了時にロガーを`release`する
#[must_use = "ガードを破棄するとすぐにreleaseされる"]
pub struct ReleaseGuard<'a> {
    slot: &'a LoggerSlot,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.slot.release();
    }
}

fn build_or_fallback<W>(config: &LoggerConfig, console: W) -> Logger
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let file = config
        .file
        .as_deref()
        .map(|path| RotatingFile::open(path, &config.rotation));

    match file {
        Some(Err(e)) => {
            let logger = Logger::assemble(config.level, console, None);
            logger.warn(format_args!(
                "ログファイルを開けないためコンソールのみに出力します: {}",
                e
            ));
            logger
        }
        Some(Ok(file)) => Logger::assemble(config.level, console, Some(file)),
        None => Logger::assemble(config.level, console, None),
    }
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)+) => {
        $logger.debug(::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)+) => {
        $logger.info(::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)+) => {
        $logger.warn(::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)+) => {
        $logger.error(::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_panic {
    ($logger:expr, $($arg:tt)+) => {
        $logger.panic(::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_fatal {
    ($logger:expr, $($arg:tt)+) => {
        $logger.fatal(::std::format_args!($($arg)+))
    };
}
