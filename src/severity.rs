//! ログレベルモジュール

use std::fmt;
use tracing_subscriber::filter::LevelFilter;

/// ログの重要度（Debug < Info < Warn < Error）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Severity {
    /// レベル名から重要度を決定
    ///
    /// "debug" / "info" / "error" 以外はすべて Info として扱う。
    /// "warn" も Info になる点に注意。
    pub fn from_level_name(name: &str) -> Self {
        match name {
            "debug" => Severity::Debug,
            "info" => Severity::Info,
            "error" => Severity::Error,
            _ => Severity::Info,
        }
    }

    /// tracingのフィルタに変換
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            Severity::Debug => LevelFilter::DEBUG,
            Severity::Info => LevelFilter::INFO,
            Severity::Warn => LevelFilter::WARN,
            Severity::Error => LevelFilter::ERROR,
        }
    }

    /// tracingのフィルタから逆変換
    pub fn from_level_filter(filter: LevelFilter) -> Self {
        if filter >= LevelFilter::DEBUG {
            Severity::Debug
        } else if filter == LevelFilter::INFO {
            Severity::Info
        } else if filter == LevelFilter::WARN {
            Severity::Warn
        } else {
            Severity::Error
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 出力関数の種類
///
/// Panic と Fatal は Error として出力される。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    Debug,
    Info,
    Warn,
    Error,
    Panic,
    Fatal,
}

impl Emission {
    /// 出力時に判定される重要度
    pub fn severity(self) -> Severity {
        match self {
            Emission::Debug => Severity::Debug,
            Emission::Info => Severity::Info,
            Emission::Warn => Severity::Warn,
            Emission::Error | Emission::Panic | Emission::Fatal => Severity::Error,
        }
    }

    /// プレフィックスに埋め込むラベル
    pub fn label(self) -> &'static str {
        match self {
            Emission::Debug => "Debug",
            Emission::Info => "Info",
            Emission::Warn => "Warn",
            Emission::Error => "Error",
            Emission::Panic => "Panic",
            Emission::Fatal => "Fatal",
        }
    }
}
