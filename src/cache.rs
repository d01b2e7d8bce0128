use color_eyre::Result;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const LOG_FILE: &str = "txdash.log";
pub const RECENT_UPLOADS_FILE: &str = "recent_uploads_history.txt";

/// Most recent uploads remembered by the upload prompt.
pub const RECENT_UPLOADS_LIMIT: usize = 20;

/// Files removed by `--clear-cache`
const CACHE_FILES: &[&str] = &[LOG_FILE, RECENT_UPLOADS_FILE];

/// Manages cache directory and cache file operations
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Cache manager rooted at `cache_dir` (primarily for testing)
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn log_file(&self) -> PathBuf {
        self.cache_file(LOG_FILE)
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Remove every known cache file. Failures on individual files are reported and skipped.
    pub fn clear_all(&self) -> Result<()> {
        for filename in CACHE_FILES {
            let file_path = self.cache_file(filename);
            if file_path.exists() {
                if let Err(e) = fs::remove_file(&file_path) {
                    eprintln!("Warning: Could not remove cache file {}: {}", filename, e);
                }
            }
        }
        Ok(())
    }

    /// Previously uploaded paths, most recent last
    pub fn load_recent_uploads(&self) -> Result<Vec<String>> {
        let history_file = self.cache_file(RECENT_UPLOADS_FILE);
        if !history_file.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(fs::File::open(&history_file)?);
        let mut history = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                history.push(line);
            }
        }
        Ok(history)
    }

    /// Move `path` to the end of the recent-uploads list, dropping the oldest
    /// entries past [`RECENT_UPLOADS_LIMIT`].
    pub fn record_upload(&self, path: &Path) -> Result<()> {
        let entry = path.display().to_string();
        let mut history = self.load_recent_uploads()?;
        history.retain(|p| p != &entry);
        history.push(entry);
        let skip = history.len().saturating_sub(RECENT_UPLOADS_LIMIT);

        self.ensure_cache_dir()?;
        let mut file = fs::File::create(self.cache_file(RECENT_UPLOADS_FILE))?;
        for entry in &history[skip..] {
            writeln!(file, "{}", entry)?;
        }
        Ok(())
    }

    pub fn most_recent_upload(&self) -> Option<String> {
        self.load_recent_uploads().ok()?.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn record_upload_dedupes_and_orders() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::with_dir(dir.path().join("txdash"));
        assert!(cache.load_recent_uploads().unwrap().is_empty());

        cache.record_upload(Path::new("/data/a.csv")).unwrap();
        cache.record_upload(Path::new("/data/b.xlsx")).unwrap();
        cache.record_upload(Path::new("/data/a.csv")).unwrap();

        assert_eq!(
            cache.load_recent_uploads().unwrap(),
            vec!["/data/b.xlsx".to_string(), "/data/a.csv".to_string()]
        );
        assert_eq!(cache.most_recent_upload().as_deref(), Some("/data/a.csv"));
    }

    #[test]
    fn record_upload_keeps_limit() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::with_dir(dir.path().to_path_buf());
        for i in 0..(RECENT_UPLOADS_LIMIT + 5) {
            cache.record_upload(Path::new(&format!("/f{}.csv", i))).unwrap();
        }
        let history = cache.load_recent_uploads().unwrap();
        assert_eq!(history.len(), RECENT_UPLOADS_LIMIT);
        assert_eq!(history[0], "/f5.csv");
    }

    #[test]
    fn clear_all_removes_known_files() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::with_dir(dir.path().to_path_buf());
        cache.record_upload(Path::new("/a.csv")).unwrap();
        fs::write(cache.log_file(), "log").unwrap();
        cache.clear_all().unwrap();
        assert!(!cache.log_file().exists());
        assert!(cache.most_recent_upload().is_none());
    }
}
