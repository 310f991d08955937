// src/sched/ledger.rs

//! Persisted chain priorities learned from previous run durations.
//!
//! The ledger file is plain text with one chain key per line; the line
//! position is the rank (first line = rank 0 = offered to a worker first).
//!
//! After a fully successful run the ranks are recomputed from observed
//! durations and written longest-first, so the slowest chains start first
//! on the next run. With a fixed worker pool that keeps long chains from
//! becoming the tail of the run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::chain::Chain;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::{ChainKey, UNSEEN_RANK};

#[derive(Debug, Clone)]
pub struct PriorityLedger {
    ranks: HashMap<ChainKey, u64>,
    dirty: bool,
    path: PathBuf,
}

impl PriorityLedger {
    /// An empty ledger backed by `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            ranks: HashMap::new(),
            dirty: false,
            path: path.into(),
        }
    }

    /// Load the ledger at `path`.
    ///
    /// A missing, unreadable or corrupt file yields an empty ledger; the run
    /// proceeds with every chain at [`UNSEEN_RANK`].
    pub fn load(fs: &dyn FileSystem, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !fs.exists(&path) {
            debug!(?path, "no priority ledger yet");
            return Self::empty(path);
        }

        let text = match fs.read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(?path, error = %e, "could not read priority ledger; ignoring it");
                return Self::empty(path);
            }
        };

        match parse_ranks(&text) {
            Ok(ranks) => {
                debug!(?path, entries = ranks.len(), "loaded priority ledger");
                Self {
                    ranks,
                    dirty: false,
                    path,
                }
            }
            Err(reason) => {
                warn!(?path, %reason, "priority ledger is corrupt; ignoring it");
                Self::empty(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn rank_of(&self, key: &str) -> Option<u64> {
        self.ranks.get(key).copied()
    }

    /// Set the chain's rank from the ledger, or [`UNSEEN_RANK`] for a chain
    /// the ledger has never recorded.
    pub fn assign(&self, chain: &mut Chain) {
        chain.rank = self.rank_of(&chain.key).unwrap_or(UNSEEN_RANK);
    }

    /// Rebuild ranks from the observed durations of `chains`.
    ///
    /// Chains are ordered by the summed elapsed time of the tasks that ran,
    /// shortest first (stable for equal totals), and numbered from 0. The
    /// ledger only becomes dirty if the resulting mapping changed.
    pub fn recompute(&mut self, chains: &[Chain]) {
        let mut totals: Vec<(&str, chrono::TimeDelta)> = chains
            .iter()
            .map(|c| (c.key.as_str(), c.total_elapsed()))
            .collect();
        totals.sort_by_key(|(_, total)| *total);

        let ranks: HashMap<ChainKey, u64> = totals
            .iter()
            .enumerate()
            .map(|(rank, (key, _))| (key.to_string(), rank as u64))
            .collect();

        if ranks != self.ranks {
            debug!(entries = ranks.len(), "chain priorities changed");
            self.ranks = ranks;
            self.dirty = true;
        }
    }

    /// Write the ledger if it changed since it was loaded or last written.
    ///
    /// Keys are written in descending rank, so the chain with the longest
    /// observed duration lands on the first line. Returns whether a write
    /// happened.
    pub fn persist(&mut self, fs: &dyn FileSystem) -> Result<bool> {
        if !self.dirty {
            debug!(path = ?self.path, "priority ledger unchanged; not writing");
            return Ok(false);
        }

        fs.write(&self.path, self.render().as_bytes())?;
        self.dirty = false;

        info!(path = ?self.path, entries = self.ranks.len(), "wrote priority ledger");
        Ok(true)
    }

    fn render(&self) -> String {
        let mut entries: Vec<(&ChainKey, &u64)> = self.ranks.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let mut out = String::new();
        for (key, _) in entries {
            out.push_str(key);
            out.push('\n');
        }
        out
    }
}

/// Parse ledger text: blank lines are ignored, every other line is a key
/// whose rank is its position among the non-blank lines.
fn parse_ranks(text: &str) -> std::result::Result<HashMap<ChainKey, u64>, String> {
    let mut ranks = HashMap::new();
    for key in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let rank = ranks.len() as u64;
        if ranks.insert(key.to_string(), rank).is_some() {
            return Err(format!("duplicate chain key {key:?}"));
        }
    }
    Ok(ranks)
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeDelta};

    use super::*;
    use crate::chain::{Task, TaskRun, TaskRunner};
    use crate::fs::mock::MockFileSystem;
    use std::future::Future;
    use std::pin::Pin;

    struct Noop;

    impl TaskRunner for Noop {
        fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<TaskRun>> + Send + '_>> {
            Box::pin(async { Ok(TaskRun::passed()) })
        }
    }

    /// A chain whose single task ran for `secs` seconds.
    fn timed_chain(key: &str, secs: i64) -> Chain {
        let start = Local::now();
        let mut task = Task::new("t", Box::new(Noop));
        task.started_at = Some(start);
        task.finished_at = Some(start + TimeDelta::seconds(secs));
        Chain::new(key).with_task(task)
    }

    const PATH: &str = "/suite/.suiterun/priorities";

    #[test]
    fn load_missing_file_is_empty() {
        let fs = MockFileSystem::new();
        let ledger = PriorityLedger::load(&fs, PATH);
        assert!(ledger.is_empty());
        assert!(!ledger.is_dirty());
    }

    #[test]
    fn load_assigns_line_positions() {
        let fs = MockFileSystem::new();
        fs.add_file(PATH, "slow\n\n  medium \nfast\n");
        let ledger = PriorityLedger::load(&fs, PATH);

        assert_eq!(ledger.rank_of("slow"), Some(0));
        assert_eq!(ledger.rank_of("medium"), Some(1));
        assert_eq!(ledger.rank_of("fast"), Some(2));
        assert_eq!(ledger.rank_of("new"), None);
    }

    #[test]
    fn corrupt_ledger_is_treated_as_empty() {
        let fs = MockFileSystem::new();
        fs.add_file(PATH, vec![0xff, 0xfe, b'\n']);
        assert!(PriorityLedger::load(&fs, PATH).is_empty());

        fs.add_file(PATH, "a\nb\na\n");
        assert!(PriorityLedger::load(&fs, PATH).is_empty());
    }

    #[test]
    fn assign_uses_sentinel_for_unseen_chains() {
        let fs = MockFileSystem::new();
        fs.add_file(PATH, "known\n");
        let ledger = PriorityLedger::load(&fs, PATH);

        let mut known = Chain::new("known");
        let mut unseen = Chain::new("unseen");
        ledger.assign(&mut known);
        ledger.assign(&mut unseen);

        assert_eq!(known.rank, 0);
        assert_eq!(unseen.rank, UNSEEN_RANK);
    }

    #[test]
    fn longest_chain_gets_rank_zero_after_round_trip() {
        let fs = MockFileSystem::new();
        let mut ledger = PriorityLedger::load(&fs, PATH);
        let chains = vec![
            timed_chain("A", 10),
            timed_chain("B", 1),
            timed_chain("C", 1),
            timed_chain("D", 1),
            timed_chain("E", 1),
        ];

        ledger.recompute(&chains);
        assert!(ledger.is_dirty());
        assert!(ledger.persist(&fs).unwrap());

        let reloaded = PriorityLedger::load(&fs, PATH);
        assert_eq!(reloaded.rank_of("A"), Some(0));
        assert_eq!(reloaded.len(), 5);
    }

    #[test]
    fn recompute_orders_by_total_duration_and_is_stable() {
        let mut ledger = PriorityLedger::empty(PATH);
        let chains = vec![
            timed_chain("x", 5),
            timed_chain("y", 2),
            timed_chain("z", 5),
        ];

        ledger.recompute(&chains);

        assert_eq!(ledger.rank_of("y"), Some(0));
        assert_eq!(ledger.rank_of("x"), Some(1));
        assert_eq!(ledger.rank_of("z"), Some(2));
        assert_eq!(ledger.render(), "z\nx\ny\n");
    }

    #[test]
    fn unchanged_mapping_is_not_rewritten() {
        let fs = MockFileSystem::new();
        let mut ledger = PriorityLedger::empty(PATH);
        let chains = vec![timed_chain("a", 3), timed_chain("b", 1)];

        ledger.recompute(&chains);
        assert!(ledger.persist(&fs).unwrap());
        assert!(!ledger.persist(&fs).unwrap());

        ledger.recompute(&chains);
        assert!(!ledger.is_dirty());
        assert!(!ledger.persist(&fs).unwrap());
    }

    #[test]
    fn persist_then_load_reproduces_ranks() {
        let fs = MockFileSystem::new();
        let mut ledger = PriorityLedger::empty(PATH);
        ledger.recompute(&[timed_chain("p", 4), timed_chain("q", 9), timed_chain("r", 1)]);
        ledger.persist(&fs).unwrap();

        let first = PriorityLedger::load(&fs, PATH);
        let mut again = first.clone();
        again.dirty = true;
        again.persist(&fs).unwrap();
        let second = PriorityLedger::load(&fs, PATH);

        for key in ["p", "q", "r"] {
            assert_eq!(first.rank_of(key), second.rank_of(key));
        }
        assert_eq!(second.rank_of("q"), Some(0));
        assert_eq!(second.rank_of("r"), Some(2));
    }
}
