//! End-of-run reporting

use std::path::{Path, PathBuf};

/// One failed input with its error kind and human-readable reason
#[derive(Debug, Clone)]
pub struct FailureEntry {
    pub input: String,
    pub kind: &'static str,
    pub reason: String,
}

/// Summary of one pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<FailureEntry>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Failed fraction of the attempted batch, 0.0 for an empty run
    pub fn failure_ratio(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.failures.len() as f64 / self.attempted as f64
    }
}

/// Write the failed inputs to `failures-<zip>.txt` in the root folder,
/// one tab-separated `input  kind  reason` line each.
pub fn write_failure_report(
    root_folder: &Path,
    zip_code: &str,
    report: &RunReport,
) -> std::io::Result<PathBuf> {
    let path = root_folder.join(format!("failures-{zip_code}.txt"));

    let mut contents = String::new();
    for failure in &report.failures {
        contents.push_str(&format!(
            "{}\t{}\t{}\n",
            failure.input, failure.kind, failure.reason
        ));
    }

    std::fs::write(&path, contents)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_ratio_handles_empty_runs() {
        let report = RunReport {
            attempted: 0,
            succeeded: 0,
            failures: vec![],
        };
        assert_eq!(report.failure_ratio(), 0.0);
    }

    #[test]
    fn writes_one_line_per_failure() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport {
            attempted: 3,
            succeeded: 1,
            failures: vec![
                FailureEntry {
                    input: "123 MAIN ST".to_string(),
                    kind: "resolution",
                    reason: "resolution failed: no candidate".to_string(),
                },
                FailureEntry {
                    input: "456 OAK AVE".to_string(),
                    kind: "filtered",
                    reason: "filtered out: not residential".to_string(),
                },
            ],
        };

        let path = write_failure_report(dir.path(), "33132", &report).unwrap();
        assert_eq!(path.file_name().unwrap(), "failures-33132.txt");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("123 MAIN ST\tresolution\t"));
        assert!(lines[1].contains("not residential"));
    }
}
