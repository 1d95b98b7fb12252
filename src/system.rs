use std::panic;
use std::path::Path;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use log::debug;
use log::info;
use url::Url;

use crate::contents::PackageFileIndex;
use crate::contents::ParseStats;
use crate::download::IndiceDownload;
use crate::errors::Error;
use crate::fetch::Fetch;
use crate::listing::RepositoryListing;
use crate::rank;
use crate::rank::Limit;
use crate::rank::Order;
use crate::rank::RankedEntry;

pub const DEFAULT_MIRROR: &str = "http://ftp.uk.debian.org/debian/dists/stable/main/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRIES: u32 = 2;

/// A repository component, and where to keep what's downloaded from it.
pub struct System {
    mirror: Url,
    output_dir: PathBuf,
    reuse_if_exists: bool,
    jobs: usize,
    fetcher: Box<dyn Fetch>,
}

#[derive(Clone, Debug)]
pub struct Stats {
    pub arch: String,
    pub indices: Vec<PathBuf>,
    pub packages: usize,
    pub parse: ParseStats,
    pub entries: Vec<RankedEntry>,
}

impl System {
    pub fn with_fetcher<P: AsRef<Path>>(
        mirror: &str,
        output_dir: P,
        fetcher: Box<dyn Fetch>,
    ) -> Result<Self, Error> {
        let mirror = Url::parse(mirror).map_err(|source| Error::InvalidUrl {
            url: mirror.to_string(),
            source,
        })?;

        Ok(System {
            mirror,
            output_dir: output_dir.as_ref().to_path_buf(),
            reuse_if_exists: false,
            jobs: 1,
            fetcher,
        })
    }

    pub fn set_reuse_if_exists(&mut self, reuse_if_exists: bool) {
        self.reuse_if_exists = reuse_if_exists;
    }

    pub fn set_jobs(&mut self, jobs: usize) {
        self.jobs = jobs.max(1);
    }

    pub fn listing(&self) -> Result<RepositoryListing, Error> {
        RepositoryListing::fetch(&*self.fetcher, &self.mirror)
    }

    /// Download every indice for `arch`, returning the decompressed paths sorted by URL.
    pub fn download(&self, arch: &str) -> Result<Vec<PathBuf>, Error> {
        let mut urls = self.listing()?.select(arch)?;
        urls.sort();
        urls.dedup();
        self.download_urls(&urls)
    }

    fn download_urls(&self, urls: &[Url]) -> Result<Vec<PathBuf>, Error> {
        let download = IndiceDownload::new(&self.output_dir, self.reuse_if_exists);
        let fetcher: &dyn Fetch = &*self.fetcher;

        if self.jobs <= 1 || urls.len() <= 1 {
            return urls
                .iter()
                .map(|url| download.download(fetcher, url))
                .collect();
        }

        let per_thread = (urls.len() + self.jobs - 1) / self.jobs;
        debug!(
            "downloading {} indices on {} threads",
            urls.len(),
            (urls.len() + per_thread - 1) / per_thread
        );

        let download = &download;
        thread::scope(|scope| {
            let workers: Vec<_> = urls
                .chunks(per_thread)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|url| download.download(fetcher, url))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            // joined in spawn order, so results stay in url order
            workers
                .into_iter()
                .flat_map(|worker| {
                    worker
                        .join()
                        .unwrap_or_else(|e| panic::resume_unwind(e))
                })
                .collect()
        })
    }

    /// The whole pipeline: list, select, download, aggregate, rank.
    pub fn stats(&self, arch: &str, order: Order, limit: Limit) -> Result<Stats, Error> {
        let arch = arch.to_lowercase();
        let indices = self.download(&arch)?;
        let (index, parse) = PackageFileIndex::aggregate(&indices)?;
        info!(
            "{}: {} packages across {} indice(s)",
            arch,
            index.len(),
            indices.len()
        );
        let entries = rank::rank(&index, order, limit);

        Ok(Stats {
            arch,
            indices,
            packages: index.len(),
            parse,
            entries,
        })
    }
}
