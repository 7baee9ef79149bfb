//! 設定モジュール
//!
//! 候補パスを先頭から順に開き、最初に開けたファイルを型付きの設定へ読み込む。
//! 解析に失敗した場合は後続の候補を試さない。

use crate::error::{ConfigError, DecodeError};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// 設定ファイルの形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
}

impl Format {
    /// 拡張子から形式を判定（.toml以外はYAML）
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
            _ => Format::Yaml,
        }
    }
}

/// 候補パスから設定を読み込む
pub fn load<T, P>(candidates: &[P]) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    if candidates.is_empty() {
        return Err(ConfigError::NoPathsAvailable);
    }

    let Some((path, file)) = open_first(candidates) else {
        let attempted: Vec<PathBuf> = candidates
            .iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        error!("設定ファイルを開けませんでした: {:?}", attempted);
        return Err(ConfigError::NoReadablePath { attempted });
    };
    info!("設定ファイルを開きました: {}", path.display());

    decode(Format::from_path(path), file).map_err(|source| {
        error!(
            "設定ファイルの解析に失敗しました: {} ({})",
            path.display(),
            source
        );
        ConfigError::Decode {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// 候補パスから読み込んだ設定で`target`を上書きする
///
/// 失敗時は`target`を変更しない。
pub fn load_into<T, P>(candidates: &[P], target: &mut T) -> Result<(), ConfigError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    *target = load(candidates)?;
    Ok(())
}

/// 標準的な設定ファイルの探索順
///
/// 1. カレントディレクトリ
/// 2. ユーザー設定ディレクトリ（~/.config/<app>など）
/// 3. ホームディレクトリ（~/.<app>）
/// 4. /etc/<app>
pub fn default_candidates(app: &str, file_name: &str) -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(".").join(file_name)];

    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join(app).join(file_name));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(format!(".{}", app)).join(file_name));
    }
    candidates.push(PathBuf::from("/etc").join(app).join(file_name));

    candidates
}

/// 最初に開けた候補を返す
fn open_first<P: AsRef<Path>>(candidates: &[P]) -> Option<(&Path, File)> {
    candidates.iter().find_map(|candidate| {
        let path = candidate.as_ref();
        File::open(path).ok().map(|file| (path, file))
    })
}

/// ファイルの内容をデコード（ファイルはここで閉じられる）
fn decode<T: DeserializeOwned>(format: Format, mut file: File) -> Result<T, DecodeError> {
    match format {
        Format::Yaml => Ok(serde_yaml::from_reader(file)?),
        Format::Toml => {
            let mut content = String::new();
            file.read_to_string(&mut content)?;
            Ok(toml::from_str(&content)?)
        }
    }
}
