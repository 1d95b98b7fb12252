use std::cmp::Ordering;
use std::io;
use std::io::Write;

use crate::contents::PackageFileIndex;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Order {
    Ascending,
    #[default]
    Descending,
}

/// How many ranked entries to keep.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Limit {
    All,
    Top(usize),
}

impl From<i64> for Limit {
    /// Any negative count means "everything".
    fn from(count: i64) -> Self {
        if count < 0 {
            Limit::All
        } else {
            Limit::Top(usize::try_from(count).unwrap_or(usize::MAX))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedEntry {
    /// 1-indexed.
    pub rank: usize,
    pub package: String,
    pub file_count: usize,
}

/// Sort packages by how many files they own, ties broken by package name.
pub fn rank(index: &PackageFileIndex, order: Order, limit: Limit) -> Vec<RankedEntry> {
    let mut counts: Vec<(&str, usize)> = index.counts().collect();

    counts.sort_unstable_by(|(left_name, left), (right_name, right)| {
        let by_count = match order {
            Order::Ascending => left.cmp(right),
            Order::Descending => right.cmp(left),
        };
        match by_count {
            Ordering::Equal => left_name.cmp(right_name),
            other => other,
        }
    });

    let keep = match limit {
        Limit::All => counts.len(),
        Limit::Top(n) => n,
    };

    counts
        .into_iter()
        .take(keep)
        .enumerate()
        .map(|(pos, (package, file_count))| RankedEntry {
            rank: pos + 1,
            package: package.to_string(),
            file_count,
        })
        .collect()
}

pub fn write_report<W: Write>(mut to: W, entries: &[RankedEntry]) -> io::Result<()> {
    if entries.is_empty() {
        return Ok(());
    }

    writeln!(to, "{:<10}\t{:<50}\tFile Count", "No.", "Package Name")?;
    for entry in entries {
        writeln!(
            to,
            "{:<10}\t{:<50}\t{}",
            entry.rank, entry.package, entry.file_count
        )?;
    }
    to.flush()
}
