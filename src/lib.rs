//! Count which packages in a Debian-style repository own the most files.
//!
//! A _System_ lists the _Contents indices_ of a repository component, downloads
//! the ones for an _Architecture_, and folds them into a _PackageFileIndex_,
//! which can then be ranked.

mod contents;
mod download;
mod errors;
pub mod fetch;
pub mod listing;
pub mod rank;
pub mod system;

pub use crate::contents::parse_line;
pub use crate::contents::Line;
pub use crate::contents::PackageFileIndex;
pub use crate::contents::ParseStats;
pub use crate::contents::EMPTY_PACKAGE;
pub use crate::download::IndiceDownload;
pub use crate::download::LocalPaths;
pub use crate::errors::Error;
pub use crate::errors::Phase;
pub use crate::errors::TransportError;
