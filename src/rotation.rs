//! ログファイルローテーションモジュール

use crate::error::LoggerError;
use logroller::{LogRoller, LogRollerBuilder, Rotation, RotationSize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tracing_subscriber::fmt::MakeWriter;

/// ローテーション方針（圧縮は行わない）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// 1ファイルあたりの最大サイズ（MB）
    pub max_size_mb: u64,
    /// 保持するバックアップ数
    pub max_backups: u64,
    /// バックアップの保持日数
    pub max_age_days: u64,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size_mb: 10,
            max_backups: 5,
            max_age_days: 30,
        }
    }
}

impl RotationPolicy {
    fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days * 24 * 60 * 60)
    }
}

/// ローテーション付きログファイル
///
/// 複製しても同じファイルを共有する。
#[derive(Clone)]
pub struct RotatingFile {
    path: PathBuf,
    inner: Arc<Mutex<LogRoller>>,
}

impl RotatingFile {
    /// ログファイルを開く
    ///
    /// 親ディレクトリを作成し、保持期間を過ぎたバックアップを削除してから開く。
    pub fn open(path: &Path, policy: &RotationPolicy) -> Result<Self, LoggerError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| LoggerError::InvalidLogPath(path.to_path_buf()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        fs::create_dir_all(&dir)?;
        prune_expired(&dir, file_name, policy.max_age())?;

        let dir_name = dir.to_string_lossy().into_owned();
        let roller = LogRollerBuilder::new(dir_name.as_str(), file_name)
            .rotation(Rotation::SizeBased(RotationSize::MB(policy.max_size_mb)))
            .max_keep_files(policy.max_backups)
            .build()
            .map_err(|e| LoggerError::FileSinkError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            inner: Arc::new(Mutex::new(roller)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// バッファ済みの出力を書き出す
    pub fn flush(&self) -> io::Result<()> {
        self.lock().flush()
    }

    fn lock(&self) -> MutexGuard<'_, LogRoller> {
        // 書き込み中のパニックでロックが汚染されてもログは継続する
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingFileWriter { guard: self.lock() }
    }
}

/// 1イベント分の書き込みハンドル
pub struct RotatingFileWriter<'a> {
    guard: MutexGuard<'a, LogRoller>,
}

impl Write for RotatingFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard.flush()
    }
}

/// `<file>.<N>`または`<file>.pending.<N>`形式のバックアップ名か判定
fn is_backup_name(name: &str, file_name: &str) -> bool {
    let Some(suffix) = name
        .strip_prefix(file_name)
        .and_then(|rest| rest.strip_prefix('.'))
    else {
        return false;
    };
    let index = suffix.strip_prefix("pending.").unwrap_or(suffix);
    !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit())
}

/// 保持期間を過ぎたバックアップを削除
///
/// 現在のログファイル自体は削除しない。個別の削除失敗は無視する。
fn prune_expired(dir: &Path, file_name: &str, max_age: Duration) -> io::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_backup_name(name, file_name) {
            continue;
        }

        let expired = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > max_age);

        if expired && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn set_age(path: &Path, days: u64) {
        let file = File::options().write(true).open(path).unwrap();
        let modified = SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60);
        file.set_modified(modified).unwrap();
    }

    fn read_logs(dir: &Path, file_name: &str) -> String {
        let mut content = String::new();
        for entry in fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            if entry.file_name().to_string_lossy().starts_with(file_name) {
                content.push_str(&fs::read_to_string(entry.path()).unwrap());
            }
        }
        content
    }

    #[test]
    fn test_default_policy() {
        let policy = RotationPolicy::default();
        assert_eq!(policy.max_size_mb, 10);
        assert_eq!(policy.max_backups, 5);
        assert_eq!(policy.max_age_days, 30);
        assert_eq!(policy.max_age(), Duration::from_secs(30 * 86400));
    }

    #[test]
    fn test_prune_expired_removes_old_backups_only() {
        let temp_dir = TempDir::new().unwrap();
        let active = temp_dir.path().join("app.log");
        let old_backup = temp_dir.path().join("app.log.1");
        let fresh_backup = temp_dir.path().join("app.log.2");
        let unrelated = temp_dir.path().join("other.log");
        for path in [&active, &old_backup, &fresh_backup, &unrelated] {
            fs::write(path, "line\n").unwrap();
        }
        set_age(&active, 40);
        set_age(&old_backup, 40);
        set_age(&unrelated, 40);

        let removed =
            prune_expired(temp_dir.path(), "app.log", Duration::from_secs(30 * 86400)).unwrap();

        assert_eq!(removed, 1);
        assert!(active.exists());
        assert!(!old_backup.exists());
        assert!(fresh_backup.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_prune_expired_keeps_files_sharing_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let bak = temp_dir.path().join("app.log.bak");
        let logger_txt = temp_dir.path().join("app.logger.txt");
        let numbered = temp_dir.path().join("app.log.12");
        let pending = temp_dir.path().join("app.log.pending.3");
        for path in [&bak, &logger_txt, &numbered, &pending] {
            fs::write(path, "line\n").unwrap();
            set_age(path, 40);
        }

        let removed =
            prune_expired(temp_dir.path(), "app.log", Duration::from_secs(30 * 86400)).unwrap();

        assert_eq!(removed, 2);
        assert!(bak.exists());
        assert!(logger_txt.exists());
        assert!(!numbered.exists());
        assert!(!pending.exists());
    }

    #[test]
    fn test_is_backup_name() {
        assert!(is_backup_name("app.log.1", "app.log"));
        assert!(is_backup_name("app.log.pending.7", "app.log"));
        assert!(!is_backup_name("app.log", "app.log"));
        assert!(!is_backup_name("app.log.", "app.log"));
        assert!(!is_backup_name("app.log.bak", "app.log"));
        assert!(!is_backup_name("app.log.pending.", "app.log"));
        assert!(!is_backup_name("app.logger.txt", "app.log"));
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("nested").join("app.log");

        let file = RotatingFile::open(&path, &RotationPolicy::default()).unwrap();
        assert_eq!(file.path(), path.as_path());
        assert!(path.parent().unwrap().exists());
    }

    #[test]
    fn test_open_rejects_path_without_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("..");

        let result = RotatingFile::open(&path, &RotationPolicy::default());
        assert!(matches!(result, Err(LoggerError::InvalidLogPath(_))));
    }

    #[test]
    fn test_writes_through_make_writer() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        let file = RotatingFile::open(&path, &RotationPolicy::default()).unwrap();

        {
            let mut writer = file.make_writer();
            writer.write_all(b"first line\n").unwrap();
        }
        // 複製したハンドルも同じファイルへ書き込む
        let cloned = file.clone();
        cloned.make_writer().write_all(b"second line\n").unwrap();
        file.flush().unwrap();

        let content = read_logs(temp_dir.path(), "app.log");
        assert!(content.contains("first line"));
        assert!(content.contains("second line"));
    }
}
