use crate::core::Observation;
use crate::utils::error::Result;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Append-only CSV log of every observed listing.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, observation: &Observation) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_empty)
            .from_writer(file);
        writer.serialize(observation)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn observation(price: f64, new_low: bool) -> Observation {
        Observation {
            observed_at: Utc::now(),
            title: "Kojo, le Dragon".to_string(),
            price,
            url: "https://example.com/kojo".to_string(),
            new_low,
        }
    }

    #[test]
    fn test_header_written_once() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::new(temp_dir.path().join("history/prices.csv"));

        log.append(&observation(5.0, true)).unwrap();
        log.append(&observation(5.0, false)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "observed_at,title,price,url,new_low");
        assert!(lines[1].contains("\"Kojo, le Dragon\""));
        assert!(lines[1].ends_with(",true"));
        assert!(lines[2].ends_with(",false"));
    }
}
