//! Discover the _Contents indices_ published in a repository directory.
//!
//! Mirrors serve `dists/<suite>/<component>/` as a plain autoindex page, so
//! this is a tolerant scrape for `<a href="Contents-*.gz">`, not an HTML parser.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use log::debug;
use log::info;
use regex::Regex;
use url::Url;

use crate::errors::Error;
use crate::errors::Phase;
use crate::fetch::Fetch;

pub const INDICE_PREFIX: &str = "Contents-";
pub const COMPRESSED_SUFFIX: &str = ".gz";

/// One `Contents-<arch>.gz` link found on a listing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndiceDescriptor {
    pub filename: String,
    pub url: Url,
    pub architecture: String,
}

/// Every indice found at `base`, in page order.
#[derive(Clone, Debug)]
pub struct RepositoryListing {
    pub base: Url,
    pub indices: Vec<IndiceDescriptor>,
}

fn href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["'](?:\./)?(Contents-[^"'/<>\s]+?\.gz)["']"#)
            .expect("static regex")
    })
}

/// `Contents-udeb-amd64.gz` -> `amd64`
pub fn architecture_of(filename: &str) -> Option<&str> {
    let stem = filename.strip_suffix(COMPRESSED_SUFFIX)?;
    let dash = stem.rfind('-')?;
    let arch = &stem[dash + 1..];
    if arch.is_empty() {
        None
    } else {
        Some(arch)
    }
}

fn join(base: &str, filename: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, filename)
    } else {
        format!("{}/{}", base, filename)
    }
}

/// Pull the indice links out of a listing page. Anything unrecognised is ignored.
pub fn scan(base: &Url, html: &str) -> Vec<IndiceDescriptor> {
    href_pattern()
        .captures_iter(html)
        .filter_map(|cap| {
            let filename = cap.get(1)?.as_str();
            if !filename.starts_with(INDICE_PREFIX) {
                // (?i) also lets through "contents-"; the naming convention is case sensitive
                return None;
            }
            let architecture = architecture_of(filename)?.to_lowercase();
            let url = match Url::parse(&join(base.as_str(), filename)) {
                Ok(url) => url,
                Err(e) => {
                    debug!("ignoring link {:?}: {}", filename, e);
                    return None;
                }
            };
            Some(IndiceDescriptor {
                filename: filename.to_string(),
                url,
                architecture,
            })
        })
        .collect()
}

impl RepositoryListing {
    /// Fetch `base` and scan it. An unrecognisable page is an empty listing, not an error.
    pub fn fetch(fetcher: &dyn Fetch, base: &Url) -> Result<RepositoryListing, Error> {
        info!("Listing contents indices at {}", base);
        let page = fetcher.fetch(base).map_err(|source| Error::Transport {
            phase: Phase::Listing,
            url: base.clone(),
            source,
        })?;

        let html = String::from_utf8_lossy(&page.bytes);
        let indices = scan(base, &html);
        debug!("found {} indices at {}", indices.len(), base);

        Ok(RepositoryListing {
            base: base.clone(),
            indices,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Distinct architectures present, sorted.
    pub fn architectures(&self) -> Vec<String> {
        self.indices
            .iter()
            .map(|indice| indice.architecture.clone())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect()
    }

    /// The URLs of every indice for `arch`, compared lower-cased.
    pub fn select(&self, arch: &str) -> Result<Vec<Url>, Error> {
        if self.is_empty() {
            return Err(Error::DiscoveryEmpty {
                url: self.base.clone(),
            });
        }

        let arch = arch.to_lowercase();
        let urls: Vec<Url> = self
            .indices
            .iter()
            .filter(|indice| indice.architecture == arch)
            .map(|indice| indice.url.clone())
            .collect();

        if urls.is_empty() {
            return Err(Error::ArchitectureNotFound {
                arch,
                available: self.architectures(),
            });
        }

        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html>
<head><title>Index of /debian/dists/stable/main/</title></head>
<body>
<pre><a href="../">../</a>
<a href="binary-all/">binary-all/</a>                                        14-Jun-2025 09:12       -
<a href="Contents-all.gz">Contents-all.gz</a>                                    14-Jun-2025 08:01    36M
<a href="Contents-amd64.gz">Contents-amd64.gz</a>                                14-Jun-2025 08:05    12M
<a href="Contents-armel.gz">Contents-armel.gz</a>                                14-Jun-2025 08:06    11M
<a href="Contents-udeb-amd64.gz">Contents-udeb-amd64.gz</a>                      14-Jun-2025 08:07    31K
<a href="Contents-source.gz">Contents-source.gz</a>                              14-Jun-2025 08:09    50M
<a href="Release">Release</a>                                                    14-Jun-2025 09:14   1.2K
</pre></body></html>"#;

    fn base() -> Url {
        Url::parse("http://ftp.uk.debian.org/debian/dists/stable/main/").unwrap()
    }

    #[test]
    fn architecture_from_filename() {
        assert_eq!(Some("amd64"), architecture_of("Contents-amd64.gz"));
        assert_eq!(Some("amd64"), architecture_of("Contents-udeb-amd64.gz"));
        assert_eq!(None, architecture_of("Contents-amd64.xz"));
        assert_eq!(None, architecture_of("Contents-.gz"));
    }

    #[test]
    fn scan_autoindex() {
        let found = scan(&base(), PAGE);
        assert_eq!(5, found.len());
        assert_eq!(
            IndiceDescriptor {
                filename: "Contents-amd64.gz".to_string(),
                url: Url::parse(
                    "http://ftp.uk.debian.org/debian/dists/stable/main/Contents-amd64.gz"
                )
                .unwrap(),
                architecture: "amd64".to_string(),
            },
            found[1]
        );
        assert_eq!("amd64", found[3].architecture);
    }

    #[test]
    fn scan_inserts_separator() {
        let base = Url::parse("http://example.org/debian/dists/sid/main").unwrap();
        let found = scan(&base, r#"<A HREF='./Contents-arm64.gz'>x</A>"#);
        assert_eq!(1, found.len());
        assert_eq!(
            "http://example.org/debian/dists/sid/main/Contents-arm64.gz",
            found[0].url.as_str()
        );
    }

    #[test]
    fn scan_garbage_is_empty() {
        assert!(scan(&base(), "<html><body>403 Forbidden</body></html>").is_empty());
        assert!(scan(&base(), r#"<a href="Packages.gz">"#).is_empty());
        assert!(scan(&base(), "").is_empty());
    }

    #[test]
    fn select_merges_udeb() {
        let listing = RepositoryListing {
            base: base(),
            indices: scan(&base(), PAGE),
        };
        let urls = listing.select("AMD64").unwrap();
        assert_eq!(2, urls.len());
        assert!(urls[1].as_str().ends_with("Contents-udeb-amd64.gz"));
    }

    #[test]
    fn select_missing_arch() {
        let listing = RepositoryListing {
            base: base(),
            indices: scan(&base(), PAGE),
        };
        match listing.select("mips") {
            Err(Error::ArchitectureNotFound { arch, available }) => {
                assert_eq!("mips", arch);
                assert_eq!(vec!["all", "amd64", "armel", "source"], available);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn select_from_empty_listing() {
        let listing = RepositoryListing {
            base: base(),
            indices: Vec::new(),
        };
        assert!(matches!(
            listing.select("amd64"),
            Err(Error::DiscoveryEmpty { .. })
        ));
    }

    #[test]
    fn select_ignores_case_on_both_sides() {
        let page = r#"<a href="Contents-ARM64.gz">Contents-ARM64.gz</a>
<a href="Contents-udeb-Arm64.gz">Contents-udeb-Arm64.gz</a>"#;
        let listing = RepositoryListing {
            base: base(),
            indices: scan(&base(), page),
        };
        assert_eq!(vec!["arm64"], listing.architectures());

        let urls = listing.select("arm64").unwrap();
        assert_eq!(2, urls.len());
        assert!(urls[0].as_str().ends_with("/Contents-ARM64.gz"));
        assert!(urls[1].as_str().ends_with("/Contents-udeb-Arm64.gz"));
        assert_eq!(urls, listing.select("ARM64").unwrap());
    }
}
