//! Outcome memory: which strategies bypassed which targets.
//!
//! The in-memory table is an [`OutcomeMemory`]. On disk it is a journal of JSON lines,
//! one per success:
//!
//! ```text
//! {"target":"http://example.com/get","strategy":"url_encoding","recorded_at":"2025-01-01T00:00:00Z"}
//! ```
//!
//! Each report is appended with a single write to a file opened in append mode, so
//! processes that report concurrently never overwrite each other. A file holding a single
//! JSON object mapping targets to strategy lists is read as well.
//!
//! Reading never fails: a missing or unreadable journal gives an empty table and corrupt
//! lines are skipped. Every such problem is returned as a [`PersistenceWarning`] and logged.

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slog::{Discard, Logger, debug, o, warn};

use crate::catalogue::canonical_name;
use crate::error::PersistenceWarning;
use crate::target::TargetKey;

/// Successful strategy names per target key. A name appears once per reported success.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutcomeMemory {
    table: BTreeMap<String, Vec<String>>,
}

impl OutcomeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, target: impl Into<String>, strategy: impl Into<String>) {
        self.table
            .entry(target.into())
            .or_default()
            .push(strategy.into());
    }

    /// Every success recorded against `target`, in recording order.
    pub fn successes_for(&self, target: &str) -> &[String] {
        self.table.get(target).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Total number of recorded successes.
    pub fn len(&self) -> usize {
        self.table.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table.values().all(Vec::is_empty)
    }

    /// Successes per strategy name across all targets.
    pub fn global_counts(&self) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for name in self.table.values().flatten() {
            *counts.entry(name.as_str()).or_default() += 1;
        }
        counts
    }

    /// Successes per strategy name against `target` only.
    pub fn counts_for(&self, target: &str) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for name in self.successes_for(target) {
            *counts.entry(name.as_str()).or_default() += 1;
        }
        counts
    }

    /// Merges a snapshot written by older tooling, whose keys are full request URLs and
    /// whose names may be legacy strategy names.
    fn merge_snapshot(&mut self, snapshot: BTreeMap<String, Vec<String>>) {
        for (target, strategies) in snapshot {
            let target = TargetKey::from_url(&target).map_or(target, |key| key.to_string());
            self.table.entry(target).or_default().extend(
                strategies
                    .iter()
                    .map(|name| canonical_name(name).to_owned()),
            );
        }
    }
}

/// One line of the journal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub target: String,
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JournalEntry {
    Record(JournalRecord),
    Snapshot(BTreeMap<String, Vec<String>>),
}

/// The outcome of reading a journal.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub memory: OutcomeMemory,
    pub warnings: Vec<PersistenceWarning>,
}

/// The journal file backing an [`OutcomeMemory`].
#[derive(Clone)]
pub struct OutcomeStore {
    path: PathBuf,
    log: Logger,
}

impl OutcomeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            log: Logger::root(Discard, o!()),
        }
    }

    pub fn with_logger(mut self, log: Logger) -> Self {
        self.log = log.new(o!("journal" => self.path.display().to_string()));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the journal, logging every warning and returning the (possibly empty) table.
    pub fn load(&self) -> OutcomeMemory {
        let report = self.load_with_report();
        for warning in &report.warnings {
            warn!(self.log, "outcome memory degraded"; "reason" => %warning);
        }
        debug!(self.log, "outcome memory loaded";
            "targets" => report.memory.targets().count(),
            "successes" => report.memory.len());
        report.memory
    }

    /// Reads the journal and returns the table together with every problem encountered.
    pub fn load_with_report(&self) -> LoadReport {
        let text = match std::fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return LoadReport {
                    memory: OutcomeMemory::new(),
                    warnings: vec![PersistenceWarning::Missing {
                        path: self.path.clone(),
                    }],
                };
            }
            Err(source) => {
                return LoadReport {
                    memory: OutcomeMemory::new(),
                    warnings: vec![PersistenceWarning::Unreadable {
                        path: self.path.clone(),
                        source,
                    }],
                };
            }
        };
        parse_journal(&self.path, &text)
    }

    /// Appends one success per strategy in `chain` for `target`.
    ///
    /// All records of one report go out in a single append so that concurrent reporters
    /// interleave whole reports, never parts of lines.
    pub fn record_success<S: AsRef<str>>(
        &self,
        target: &TargetKey,
        chain: &[S],
    ) -> anyhow::Result<()> {
        if chain.is_empty() {
            return Ok(());
        }
        let recorded_at = Some(Utc::now());
        let mut buf = Vec::new();
        for strategy in chain {
            let record = JournalRecord {
                target: target.as_str().to_owned(),
                strategy: strategy.as_ref().to_owned(),
                recorded_at,
            };
            serde_json::to_writer(&mut buf, &record)?;
            buf.push(b'\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&self.path)
            .with_context(|| format!("opening outcome journal {}", self.path.display()))?;
        if !ends_with_newline(&mut file)? {
            buf.insert(0, b'\n');
        }
        file.write_all(&buf)
            .with_context(|| format!("appending to outcome journal {}", self.path.display()))?;

        let names: Vec<&str> = chain.iter().map(AsRef::as_ref).collect();
        debug!(self.log, "recorded success"; "target" => %target, "chain" => ?names);
        Ok(())
    }
}

/// Whether `file` is empty or its last byte is a newline.
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn parse_journal(path: &Path, text: &str) -> LoadReport {
    let mut report = LoadReport::default();

    // Fast path: the whole file is a well-formed stream of records (or one snapshot,
    // possibly pretty-printed over several lines).
    let stream: Result<Vec<JournalEntry>, _> = serde_json::Deserializer::from_str(text)
        .into_iter::<JournalEntry>()
        .collect();
    if let Ok(entries) = stream {
        for entry in entries {
            apply(&mut report.memory, entry);
        }
        return report;
    }

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(line) {
            Ok(entry) => apply(&mut report.memory, entry),
            Err(err) => report.warnings.push(PersistenceWarning::CorruptRecord {
                path: path.to_path_buf(),
                line: index + 1,
                reason: err.to_string(),
            }),
        }
    }
    report
}

fn apply(memory: &mut OutcomeMemory, entry: JournalEntry) {
    match entry {
        JournalEntry::Record(record) => memory.record(record.target, record.strategy),
        JournalEntry::Snapshot(snapshot) => memory.merge_snapshot(snapshot),
    }
}
