//! CLIモジュール

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use svc_base::{config, log_debug, log_error, log_info, log_panic, log_warn, LoggerSlot};

/// デモで読み込むサービス設定
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// ログレベル
    #[serde(rename = "LogLevel")]
    pub log_level: String,
    /// 待ち受けアドレス
    #[serde(rename = "IPAddr")]
    pub ip_addr: String,
    /// 待ち受けポート
    #[serde(rename = "Port")]
    pub port: u32,
}

/// svc-base - 設定ローダーとロガーのデモ
#[derive(Parser, Debug)]
#[command(name = "svc-base")]
#[command(about = "設定ローダーとロガーのデモ", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// サブコマンド
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 各レベルのログを出力
    LogDemo {
        /// ログレベル（debug / info / error）
        #[arg(short, long, default_value = "debug")]
        level: String,

        /// ログファイルパス（省略時はコンソールのみ）
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// 最後にPanicレベルのログを出力する
        #[arg(long)]
        panic: bool,
    },
    /// 設定ファイルを読み込んで表示
    ConfigDemo {
        /// 設定ファイルの候補（複数指定可、先頭から順に試す）
        #[arg(short, long = "config")]
        config: Vec<PathBuf>,

        /// ログレベル（debug / info / error）
        #[arg(short, long, default_value = "debug")]
        level: String,
    },
}

/// CLIエントリポイント
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let logger = LoggerSlot::new();
    // パニックで抜けた場合もreleaseする
    let _release = logger.release_on_drop();

    match cli.command {
        Commands::LogDemo { level, file, panic } => {
            let path = file
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            logger.init(&level, &path);
            log_demo(&logger, panic);
            Ok(())
        }
        Commands::ConfigDemo { config, level } => {
            logger.init(&level, "");
            config_demo(&logger, config)
        }
    }
}

fn log_demo(logger: &LoggerSlot, end_with_panic: bool) {
    log_info!(logger, "ロガーを初期化しました");

    log_debug!(logger, "デバッグログです");
    log_info!(logger, "情報ログです");
    log_warn!(logger, "警告ログです");
    log_error!(logger, "エラーログです");

    // ログレベルを引き上げ
    logger.increase_log_level("info");

    log_debug!(logger, "デバッグログです");
    log_info!(logger, "情報ログです");
    log_warn!(logger, "警告ログです");
    log_error!(logger, "エラーログです");

    if end_with_panic {
        log_panic!(logger, "パニックログです");
    }
}

fn config_demo(logger: &LoggerSlot, candidates: Vec<PathBuf>) -> Result<()> {
    let candidates = if candidates.is_empty() {
        config::default_candidates("svc-base", "example.yaml")
    } else {
        candidates
    };

    match config::load::<ServiceConfig, _>(&candidates) {
        Ok(service_config) => {
            log_info!(logger, "設定を読み込みました: {:?}", service_config);
            Ok(())
        }
        Err(e) => {
            log_error!(logger, "設定の読み込みに失敗しました: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use svc_base::LoggerConfig;
    use tempfile::TempDir;

    #[test]
    fn test_log_demo_defaults() {
        let cli = Cli::try_parse_from(["svc-base", "log-demo"]);
        assert!(cli.is_ok());

        if let Commands::LogDemo { level, file, panic } = cli.unwrap().command {
            assert_eq!(level, "debug");
            assert_eq!(file, None);
            assert!(!panic);
        } else {
            panic!("Expected LogDemo command");
        }
    }

    #[test]
    fn test_log_demo_with_args() {
        let cli = Cli::try_parse_from([
            "svc-base",
            "log-demo",
            "--level",
            "error",
            "--file",
            "/tmp/svc.log",
            "--panic",
        ]);
        assert!(cli.is_ok());

        if let Commands::LogDemo { level, file, panic } = cli.unwrap().command {
            assert_eq!(level, "error");
            assert_eq!(file, Some(PathBuf::from("/tmp/svc.log")));
            assert!(panic);
        } else {
            panic!("Expected LogDemo command");
        }
    }

    #[test]
    fn test_config_demo_multiple_candidates() {
        let cli = Cli::try_parse_from([
            "svc-base",
            "config-demo",
            "-c",
            "/missing.yaml",
            "--config",
            "./example.yaml",
        ]);
        assert!(cli.is_ok());

        if let Commands::ConfigDemo { config, level } = cli.unwrap().command {
            assert_eq!(
                config,
                vec![PathBuf::from("/missing.yaml"), PathBuf::from("./example.yaml")]
            );
            assert_eq!(level, "debug");
        } else {
            panic!("Expected ConfigDemo command");
        }
    }

    #[test]
    fn test_unknown_command() {
        let cli = Cli::try_parse_from(["svc-base", "serve"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_config_demo_loads_service_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("example.yaml");
        fs::write(&path, "LogLevel: debug\nIPAddr: 127.0.0.1\nPort: 8080\n").unwrap();

        // 未初期化のロガーでも動作する
        let logger = LoggerSlot::new();
        let result = config_demo(&logger, vec![PathBuf::from("/missing.yaml"), path]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_demo_reports_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        let logger = LoggerSlot::new();

        let result = config_demo(&logger, vec![temp_dir.path().join("missing.yaml")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_demo_panic_still_releases() {
        let logger = LoggerSlot::new();
        logger.init_with(&LoggerConfig::from_args("debug", ""), io::sink);

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _release = logger.release_on_drop();
            log_demo(&logger, true);
        }));

        assert!(result.is_err());
        assert!(logger.is_released());
    }

    #[test]
    fn test_demo_config_shape() {
        let config: ServiceConfig =
            serde_yaml::from_str("LogLevel: debug\nIPAddr: 127.0.0.1\nPort: 8080\n").unwrap();
        assert_eq!(
            config,
            ServiceConfig {
                log_level: "debug".to_string(),
                ip_addr: "127.0.0.1".to_string(),
                port: 8080,
            }
        );
    }
}
