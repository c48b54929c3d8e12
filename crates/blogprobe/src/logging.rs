use crate::prelude::{eprintln, *};
use colored::Colorize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Scoped run log. Carries its own indent depth instead of stashing it in
/// thread-local state; `section` hands back a child log one level deeper, so
/// nesting follows lexical structure.
#[derive(Clone)]
pub struct RunLog {
    indent: usize,
    sink: Option<Arc<Mutex<File>>>,
}

impl RunLog {
    /// A root log, optionally teeing errors into a file.
    pub fn new(error_log: Option<&Path>) -> Result<RunLog> {
        let sink = match error_log {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| eyre!("Failed to open error log {}: {}", path.display(), e))?;
                Some(Arc::new(Mutex::new(file)))
            }
            None => None,
        };
        Ok(RunLog { indent: 0, sink })
    }

    /// Log a heading and return a log nested one level deeper for the
    /// section's duration.
    pub fn section(&self, title: &str) -> RunLog {
        self.info(title);
        RunLog {
            indent: self.indent + 1,
            sink: self.sink.clone(),
        }
    }

    pub fn info(&self, message: &str) {
        eprintln!("{:width$}{message}", "", width = self.indent * 2);
    }

    pub fn error(&self, message: &str) {
        eprintln!(
            "{:width$}{} {message}",
            "",
            "error:".red().bold(),
            width = self.indent * 2
        );
        if let Some(sink) = &self.sink {
            if let Ok(mut file) = sink.lock() {
                let _ = writeln!(file, "error: {message}");
            }
        }
    }
}
