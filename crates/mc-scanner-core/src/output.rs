use crate::error::Result;
use crate::policy::ReportWriter;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Where run output goes, chosen from the shape of the `--out` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Text reports written into a directory, created if needed.
    Directory(PathBuf),
    /// A JSON results file; no text report.
    Json(PathBuf),
    /// Text reports stored as entries of a new zip archive.
    Zip(PathBuf),
}

impl OutputTarget {
    pub fn from_path(path: &Path) -> Self {
        let has_ext = |ext: &str| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        };
        if has_ext("json") {
            OutputTarget::Json(path.to_path_buf())
        } else if path.is_dir() || !has_ext("zip") {
            OutputTarget::Directory(path.to_path_buf())
        } else {
            OutputTarget::Zip(path.to_path_buf())
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, OutputTarget::Json(_))
    }

    pub fn path(&self) -> &Path {
        match self {
            OutputTarget::Directory(path) | OutputTarget::Json(path) | OutputTarget::Zip(path) => {
                path
            }
        }
    }
}

fn report_name(run: usize) -> String {
    match run {
        0 => "results.txt".to_string(),
        n => format!("results.{}.txt", n),
    }
}

enum Sink {
    Directory(PathBuf),
    Json(PathBuf),
    Zip(ZipWriter<File>),
}

/// An opened output target. Opened once per process and shared by every
/// run of a loop; a zip archive is finalized by [`OutputSink::finish`].
pub struct OutputSink {
    target: OutputTarget,
    sink: Sink,
}

impl OutputSink {
    pub fn open(target: OutputTarget) -> Result<Self> {
        let sink = match &target {
            OutputTarget::Directory(dir) => {
                if !dir.as_os_str().is_empty() {
                    fs::create_dir_all(dir)?;
                }
                Sink::Directory(dir.clone())
            }
            OutputTarget::Json(path) => {
                create_parent(path)?;
                Sink::Json(path.clone())
            }
            OutputTarget::Zip(path) => {
                create_parent(path)?;
                Sink::Zip(ZipWriter::new(File::create(path)?))
            }
        };
        debug!("Writing output to {:?}", target);
        Ok(Self { target, sink })
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    /// The text report for run `run` (0-based), or `None` in JSON mode.
    pub fn report_writer(&mut self, run: usize) -> Result<Option<ReportWriter<'_>>> {
        match &mut self.sink {
            Sink::Json(_) => Ok(None),
            Sink::Directory(dir) => {
                let file = File::create(dir.join(report_name(run)))?;
                Ok(Some(Box::new(BufWriter::new(file))))
            }
            Sink::Zip(zip) => {
                zip.start_file(report_name(run), SimpleFileOptions::default())?;
                Ok(Some(Box::new(zip)))
            }
        }
    }

    /// A fresh JSON file for the current run, or `None` outside JSON mode.
    pub fn json_writer(&self) -> Result<Option<BufWriter<File>>> {
        match &self.sink {
            Sink::Json(path) => Ok(Some(BufWriter::new(File::create(path)?))),
            _ => Ok(None),
        }
    }

    pub fn finish(self) -> Result<()> {
        if let Sink::Zip(zip) = self.sink {
            zip.finish()?;
        }
        Ok(())
    }
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}
