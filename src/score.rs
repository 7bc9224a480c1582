use std::fs;
use std::path::PathBuf;

/// Best-distance persistence. One plain number, read once at construction,
/// written on every new best.
pub trait ScoreStore {
    fn load(&self) -> f64;
    fn save(&mut self, best: f64);
}

/// File-backed store: a single decimal number in a dotfile. A missing or
/// unreadable file reads as 0, and a failed write loses nothing but the
/// record.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        FileStore { path }
    }

    pub fn at_default_path() -> Self {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        FileStore::new(home.join(".paper_wings_highscore"))
    }
}

impl ScoreStore for FileStore {
    fn load(&self) -> f64 {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0)
    }

    fn save(&mut self, best: f64) {
        let _ = fs::write(&self.path, format!("{best}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> FileStore {
        let path = std::env::temp_dir().join(format!(
            "paper_wings_test_{}_{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        FileStore::new(path)
    }

    #[test]
    fn missing_file_reads_zero() {
        let store = temp_store("missing");
        assert_eq!(store.load(), 0.0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut store = temp_store("roundtrip");
        store.save(42.3);
        assert!((store.load() - 42.3).abs() < 1e-9);
        let _ = fs::remove_file(&store.path);
    }

    #[test]
    fn garbage_contents_read_zero() {
        let store = temp_store("garbage");
        fs::write(&store.path, "not a number").unwrap();
        assert_eq!(store.load(), 0.0);
        let _ = fs::remove_file(&store.path);
    }
}
