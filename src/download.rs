use std::fs;
use std::io;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::DateTime;
use chrono::Utc;
use flate2::bufread::MultiGzDecoder;
use log::debug;
use log::info;
use tempfile_fast::PersistableTempFile;
use url::Url;

use crate::errors::Error;
use crate::errors::Phase;
use crate::fetch::Fetch;
use crate::listing::COMPRESSED_SUFFIX;

/// Where an indice, and its decompressed form, live on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalPaths {
    pub compressed: PathBuf,
    pub decompressed: PathBuf,
}

pub struct IndiceDownload {
    output_dir: PathBuf,
    reuse_if_exists: bool,
}

impl IndiceDownload {
    pub fn new<P: AsRef<Path>>(output_dir: P, reuse_if_exists: bool) -> Self {
        IndiceDownload {
            output_dir: output_dir.as_ref().to_path_buf(),
            reuse_if_exists,
        }
    }

    pub fn local_paths(&self, url: &Url) -> Result<LocalPaths, Error> {
        let basename = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::UnsupportedCompression { url: url.clone() })?;

        let stem = basename
            .strip_suffix(COMPRESSED_SUFFIX)
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| Error::UnsupportedCompression { url: url.clone() })?;

        Ok(LocalPaths {
            compressed: self.output_dir.join(basename),
            decompressed: self.output_dir.join(stem),
        })
    }

    /// Make sure the decompressed indice behind `url` is on disk, and return its path.
    ///
    /// With `reuse_if_exists`, an existing decompressed file is returned without
    /// any network access, however old it is.
    pub fn download(&self, fetcher: &dyn Fetch, url: &Url) -> Result<PathBuf, Error> {
        let paths = self.local_paths(url)?;

        if self.reuse_if_exists && paths.decompressed.is_file() {
            log_reuse(&paths.decompressed);
            return Ok(paths.decompressed);
        }

        info!("Downloading: {}", url);
        let fetched = fetcher.fetch(url).map_err(|source| Error::Transport {
            phase: Phase::Indice,
            url: url.clone(),
            source,
        })?;

        fs::create_dir_all(&self.output_dir)
            .map_err(|e| Error::fs("creating directory", &self.output_dir, e))?;

        persist(&self.output_dir, &paths.compressed, |tmp| {
            tmp.write_all(&fetched.bytes)
                .map_err(|e| Error::fs("writing", &paths.compressed, e))
        })?;

        persist(&self.output_dir, &paths.decompressed, |tmp| {
            let compressed = fs::File::open(&paths.compressed)
                .map_err(|e| Error::fs("opening", &paths.compressed, e))?;
            decompress_gz(
                io::BufReader::new(compressed),
                tmp,
                &paths.compressed,
                &paths.decompressed,
            )
        })?;

        if let Some(modified) = fetched.last_modified {
            let file_time = filetime::FileTime::from_unix_time(modified.timestamp(), 0);
            for path in &[&paths.compressed, &paths.decompressed] {
                filetime::set_file_mtime(path, file_time)
                    .map_err(|e| Error::fs("setting modification time of", path.as_path(), e))?;
            }
        }

        debug!("{} -> {:?}", url, paths.decompressed);
        Ok(paths.decompressed)
    }
}

/// Write `dest` through a temporary file in `dir`, renaming it into place only once `fill` succeeds.
fn persist<F>(dir: &Path, dest: &Path, fill: F) -> Result<(), Error>
where
    F: FnOnce(&mut PersistableTempFile) -> Result<(), Error>,
{
    let mut tmp = PersistableTempFile::new_in(dir)
        .map_err(|e| Error::fs("creating temporary file in", dir, e))?;

    fill(&mut tmp)?;

    tmp.persist_by_rename(dest)
        .map_err(|e| Error::fs("persisting", dest, e.error))
}

/// Like `io::copy`, but keeps decoder failures apart from write failures.
fn decompress_gz<R: io::BufRead, W: Write>(
    compressed: R,
    mut out: W,
    from: &Path,
    to: &Path,
) -> Result<(), Error> {
    let mut decoder = MultiGzDecoder::new(compressed);
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = match decoder.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(Error::Decode {
                    path: from.to_path_buf(),
                    source: e,
                })
            }
        };
        out.write_all(&buf[..read])
            .map_err(|e| Error::fs("writing", to, e))?;
    }
    out.flush().map_err(|e| Error::fs("writing", to, e))
}

fn log_reuse(path: &Path) {
    let modified = fs::metadata(path).and_then(|meta| meta.modified());
    match modified {
        Ok(modified) => {
            let modified: DateTime<Utc> = DateTime::from(modified);
            let age = SystemTime::now()
                .duration_since(modified.into())
                .map(|age| age.as_secs() / 3600)
                .unwrap_or(0);
            info!(
                "Reusing {:?} (last modified {}, {}h ago)",
                path,
                modified.to_rfc2822(),
                age
            );
        }
        Err(_) => info!("Reusing {:?}", path),
    }
}
