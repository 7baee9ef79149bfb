//! エラー型定義モジュール

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 設定エラー
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ファイルの候補パスが指定されていません")]
    NoPathsAvailable,

    #[error("設定ファイルを開けません: {attempted:?}")]
    NoReadablePath { attempted: Vec<PathBuf> },

    #[error("設定ファイルの解析エラー ({}): {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

/// デコードエラー
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IOエラー: {0}")]
    IoError(#[from] io::Error),

    #[error("YAML解析エラー: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("TOML解析エラー: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// ロガーエラー
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("IOエラー: {0}")]
    IoError(#[from] io::Error),

    #[error("無効なログファイルパス: {}", .0.display())]
    InvalidLogPath(PathBuf),

    #[error("ログファイルを開けません ({}): {reason}", path.display())]
    FileSinkError { path: PathBuf, reason: String },

    #[error("グローバルロガーは既に設定されています")]
    GlobalAlreadySet,
}
