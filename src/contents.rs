//! Parse _Contents indices_ into a package -> owned files mapping.
//!
//! Each line is `<path><whitespace><section/pkg>[,<section/pkg>...]`. Paths may
//! themselves contain spaces, so only the last whitespace run separates the two.

use std::collections::hash_map;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::io::BufRead;
use std::path::Path;

use log::debug;
use log::info;
use log::warn;

use crate::errors::Error;

/// Marks a path (or an owner) that no real package provides.
pub const EMPTY_PACKAGE: &str = "EMPTY_PACKAGE";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line<'l> {
    Blank,
    Malformed,
    Entry { path: &'l str, packages: &'l str },
}

pub fn parse_line(line: &str) -> Line<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Line::Blank;
    }

    match line.rfind(char::is_whitespace) {
        Some(split) => Line::Entry {
            path: line[..split].trim_end(),
            packages: line[split..].trim_start(),
        },
        None => Line::Malformed,
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Non-blank lines seen.
    pub lines: u64,
    /// (package, path) pairs recorded, before de-duplication.
    pub records: u64,
    /// Lines without a path / package separator.
    pub skipped: u64,
}

impl ParseStats {
    pub fn add(&mut self, other: ParseStats) {
        self.lines += other.lines;
        self.records += other.records;
        self.skipped += other.skipped;
    }
}

/// Which files each package owns, accumulated over one or more indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageFileIndex {
    packages: HashMap<String, HashSet<String>>,
}

impl PackageFileIndex {
    pub fn new() -> Self {
        PackageFileIndex::default()
    }

    pub fn insert<P: Into<String>, F: Into<String>>(&mut self, package: P, path: F) {
        self.packages
            .entry(package.into())
            .or_default()
            .insert(path.into());
    }

    /// Record `path` for every owner in the comma separated `packages`. Returns how many were recorded.
    pub fn add_entry(&mut self, path: &str, packages: &str) -> u64 {
        if path == EMPTY_PACKAGE {
            return 0;
        }

        let mut recorded = 0;
        for package in packages.split(',') {
            let package = package.trim();
            if package.is_empty() || package == EMPTY_PACKAGE {
                continue;
            }
            self.insert(package, path);
            recorded += 1;
        }
        recorded
    }

    /// Parse a whole indice. Malformed lines are counted and skipped.
    pub fn from_reader<R: BufRead>(
        mut reader: R,
        name: &Path,
    ) -> Result<(PackageFileIndex, ParseStats), Error> {
        let mut index = PackageFileIndex::new();
        let mut stats = ParseStats::default();
        let mut buf = Vec::with_capacity(256);
        let mut line_no = 0u64;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| Error::fs("reading", name, e))?;
            if 0 == read {
                break;
            }
            line_no += 1;

            let line = String::from_utf8_lossy(&buf);
            match parse_line(&line) {
                Line::Blank => continue,
                Line::Malformed => {
                    stats.lines += 1;
                    stats.skipped += 1;
                    debug!("{:?}:{}: no package list: {:?}", name, line_no, line.trim());
                }
                Line::Entry { path, packages } => {
                    stats.lines += 1;
                    stats.records += index.add_entry(path, packages);
                }
            }
        }

        if stats.skipped > 0 {
            warn!(
                "{:?}: skipped {} malformed line(s) of {}",
                name, stats.skipped, stats.lines
            );
        }

        Ok((index, stats))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<(PackageFileIndex, ParseStats), Error> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|e| Error::fs("opening", path, e))?;
        let parsed = PackageFileIndex::from_reader(io::BufReader::new(file), path)?;
        info!(
            "Parsed {:?}: {} packages, {} lines",
            path,
            parsed.0.len(),
            parsed.1.lines
        );
        Ok(parsed)
    }

    /// Fold every file, in the order given, into one index.
    pub fn aggregate<I, P>(paths: I) -> Result<(PackageFileIndex, ParseStats), Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut index = PackageFileIndex::new();
        let mut stats = ParseStats::default();
        for path in paths {
            let (file_index, file_stats) = PackageFileIndex::from_file(path)?;
            index.merge(file_index);
            stats.add(file_stats);
        }
        Ok((index, stats))
    }

    /// Union `other` into `self`; a package keeps the files from both sides.
    pub fn merge(&mut self, other: PackageFileIndex) {
        for (package, files) in other.packages {
            match self.packages.entry(package) {
                hash_map::Entry::Occupied(mut existing) => existing.get_mut().extend(files),
                hash_map::Entry::Vacant(slot) => {
                    slot.insert(files);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn files(&self, package: &str) -> Option<&HashSet<String>> {
        self.packages.get(package)
    }

    pub fn file_count(&self, package: &str) -> usize {
        self.files(package).map(HashSet::len).unwrap_or(0)
    }

    /// `(package, file count)`, in no particular order.
    pub fn counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.packages
            .iter()
            .map(|(package, files)| (package.as_str(), files.len()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn parse(text: &str) -> (PackageFileIndex, ParseStats) {
        PackageFileIndex::from_reader(Cursor::new(text), Path::new("test")).unwrap()
    }

    #[test]
    fn split_on_last_whitespace() {
        assert_eq!(
            Line::Entry {
                path: "some/path with spaces.so",
                packages: "libfoo,libbar",
            },
            parse_line("some/path with spaces.so   libfoo,libbar")
        );
        assert_eq!(
            Line::Entry {
                path: "usr/bin/ls",
                packages: "utils/coreutils",
            },
            parse_line("  usr/bin/ls\t\tutils/coreutils \r\n")
        );
        assert_eq!(Line::Blank, parse_line("   \n"));
        assert_eq!(Line::Malformed, parse_line("usr/bin/orphan"));
    }

    #[test]
    fn one_package_per_line() {
        let (index, stats) = parse(
            "usr/bin/a    utils/foo\n\
             usr/bin/b    utils/foo\n\
             usr/bin/c    utils/foo\n\
             usr/bin/d    utils/bar\n",
        );
        assert_eq!(3, index.file_count("utils/foo"));
        assert_eq!(1, index.file_count("utils/bar"));
        assert_eq!(4, stats.lines);
        assert_eq!(4, stats.records);
    }

    #[test]
    fn spaces_in_path_multiple_owners() {
        let (index, _) = parse("some/path with spaces.so   libfoo,libbar\n");
        for package in &["libfoo", "libbar"] {
            let files = index.files(package).unwrap();
            assert_eq!(1, files.len());
            assert!(files.contains("some/path with spaces.so"));
        }
    }

    #[test]
    fn empty_package_is_never_recorded() {
        let (index, stats) = parse(
            "usr/share/doc/x   doc/x,EMPTY_PACKAGE\n\
             EMPTY_PACKAGE     admin/empty\n",
        );
        assert_eq!(1, index.len());
        assert_eq!(None, index.files(EMPTY_PACKAGE));
        assert_eq!(None, index.files("admin/empty"));
        assert_eq!(1, stats.records);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let (index, stats) = parse("\nusr/bin/a utils/foo\ngarbage\n\n usr/bin/b utils/foo");
        assert_eq!(2, index.file_count("utils/foo"));
        assert_eq!(3, stats.lines);
        assert_eq!(1, stats.skipped);
    }

    #[test]
    fn merge_is_a_union() {
        let (mut first, _) = parse("/a   pkg/p\n/shared   pkg/q\n");
        let (second, _) = parse("/b   pkg/p\n/shared   pkg/q\n/c   pkg/r\n");
        first.merge(second);
        assert_eq!(2, first.file_count("pkg/p"));
        assert_eq!(1, first.file_count("pkg/q"));
        assert_eq!(1, first.file_count("pkg/r"));
    }

    #[test]
    fn invalid_utf8_is_tolerated() {
        let (index, stats) = PackageFileIndex::from_reader(
            Cursor::new(&b"usr/share/caf\xe9 text/menu\n"[..]),
            Path::new("test"),
        )
        .unwrap();
        assert_eq!(1, index.file_count("text/menu"));
        assert_eq!(0, stats.skipped);
    }
}
