pub mod content;
pub mod error;
pub mod models;
pub mod scoring;
pub mod stats;
pub mod traits;
pub mod urlutil;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use content::{Decision, Signals};
pub use error::{AppError, ErrorKind};
pub use models::{
    CandidateProfile, Job, JobMatch, NewJob, NewSource, PageType, RawJob, Source, SourceType,
    StatPoint,
};
pub use stats::Counters;
pub use traits::{FetchedPage, JobStore, Matcher, PageFetcher, SourceStore};
