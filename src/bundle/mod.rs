//! The bundle pipeline: staging uploaded streams, committing them as
//! metadata plus content-addressed files, and packaging them for download.

pub mod archive;
mod commit;
mod staging;

pub use archive::{MANIFEST_NAME, ManifestEntry, build_archive};
pub use commit::{CommitPipeline, discard_all};
pub use staging::{RandomTokens, StagingArea, TokenSource};
