use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{MarkerStyle, TargetTable, TestTarget, resolve_target_path};
use crate::marker::{SignatureAnchor, marker_follows, render_marker, splice_marker};
use crate::store::replace_file;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub root: PathBuf,
    pub dry_run: bool,
    /// Treat a marker already sitting under the signature as success instead
    /// of inserting a duplicate.
    pub skip_marked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    AlreadyMarked,
}

#[derive(Debug)]
pub enum MarkError {
    FileNotFound(PathBuf),
    FunctionNotFound { name: String, path: PathBuf },
    Read { path: PathBuf, source: io::Error },
    Write { path: PathBuf, source: io::Error },
    Pattern(regex::Error),
}

impl std::fmt::Display for MarkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileNotFound(path) => write!(f, "File not found: {}", path.display()),
            Self::FunctionNotFound { name, path } => {
                write!(f, "Test function not found: {name} in {}", path.display())
            }
            Self::Read { path, source } => {
                write!(f, "Failed to read {}: {source}", path.display())
            }
            Self::Write { path, source } => {
                write!(f, "Failed to write {}: {source}", path.display())
            }
            Self::Pattern(err) => write!(f, "Invalid signature pattern: {err}"),
        }
    }
}

impl std::error::Error for MarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => Some(source),
            Self::Pattern(err) => Some(err),
            _ => None,
        }
    }
}

impl From<regex::Error> for MarkError {
    fn from(value: regex::Error) -> Self {
        Self::Pattern(value)
    }
}

/// Inserts the skip marker for one test, re-reading the file from disk.
pub fn mark_test(
    path: &Path,
    target: &TestTarget,
    style: &MarkerStyle,
    options: &RunOptions,
) -> Result<MarkOutcome, MarkError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(MarkError::FileNotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(MarkError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let anchor = SignatureAnchor::new(&target.name)?;
    let offset = anchor
        .insertion_offset(&content)
        .ok_or_else(|| MarkError::FunctionNotFound {
            name: target.name.clone(),
            path: path.to_path_buf(),
        })?;

    let marker = render_marker(style, &target.label);
    if options.skip_marked && marker_follows(&content, offset, &marker) {
        return Ok(MarkOutcome::AlreadyMarked);
    }

    let updated = splice_marker(&content, offset, &marker);
    if !options.dry_run {
        replace_file(path, updated.as_bytes()).map_err(|source| MarkError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(MarkOutcome::Marked)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PairOutcome {
    Marked,
    AlreadyMarked,
    FileNotFound,
    FunctionNotFound,
    Failed { message: String },
}

impl PairOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Marked | Self::AlreadyMarked)
    }
}

impl From<&Result<MarkOutcome, MarkError>> for PairOutcome {
    fn from(value: &Result<MarkOutcome, MarkError>) -> Self {
        match value {
            Ok(MarkOutcome::Marked) => Self::Marked,
            Ok(MarkOutcome::AlreadyMarked) => Self::AlreadyMarked,
            Err(MarkError::FileNotFound(_)) => Self::FileNotFound,
            Err(MarkError::FunctionNotFound { .. }) => Self::FunctionNotFound,
            Err(err) => Self::Failed {
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairReport {
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub outcome: PairOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: String,
    pub tests: Vec<PairReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub dry_run: bool,
    pub files: Vec<FileReport>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.attempted
    }
}

/// Walks the table in declared order, one read-modify-write per test.
/// Progress lines go to `out`; the counters live only in the returned summary.
pub fn run_table(
    table: &TargetTable,
    options: &RunOptions,
    out: &mut dyn Write,
) -> io::Result<RunSummary> {
    let mut summary = RunSummary {
        attempted: 0,
        succeeded: 0,
        dry_run: options.dry_run,
        files: Vec::with_capacity(table.files.len()),
    };

    for file in &table.files {
        writeln!(out, "Processing {}:", file.path)?;
        let path = resolve_target_path(&options.root, &file.path);
        let mut report = FileReport {
            path: file.path.clone(),
            tests: Vec::with_capacity(file.tests.len()),
        };

        for target in &file.tests {
            summary.attempted += 1;
            let result = mark_test(&path, target, &table.marker, options);
            match &result {
                Ok(outcome) => {
                    debug!(file = %path.display(), test = %target.name, ?outcome, "marked");
                    summary.succeeded += 1;
                    match outcome {
                        MarkOutcome::Marked => writeln!(out, "  ✅ {}", target.name)?,
                        MarkOutcome::AlreadyMarked => {
                            writeln!(out, "  ✅ {} (already marked)", target.name)?
                        }
                    }
                }
                Err(err) => {
                    warn!(file = %path.display(), test = %target.name, error = %err, "skip marker not inserted");
                    writeln!(out, "⚠️  {err}")?;
                    writeln!(out, "  ❌ {}", target.name)?;
                }
            }
            report.tests.push(PairReport {
                name: target.name.clone(),
                label: target.label.clone(),
                outcome: PairOutcome::from(&result),
            });
        }
        writeln!(out)?;
        summary.files.push(report);
    }

    info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        dry_run = summary.dry_run,
        "run finished"
    );
    write_summary(&summary, out)?;
    Ok(summary)
}

fn write_summary(summary: &RunSummary, out: &mut dyn Write) -> io::Result<()> {
    writeln!(
        out,
        "\nSummary: {}/{} tests marked",
        summary.succeeded, summary.attempted
    )?;
    if summary.all_succeeded() {
        writeln!(out, "✅ All tests successfully marked!")
    } else {
        writeln!(out, "⚠️  {} tests could not be marked", summary.failed())
    }
}
