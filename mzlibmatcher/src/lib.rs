//! Run spectral library searches over feature rows or single scans.
//!
//! [`LibraryMatcher`] prepares the selected libraries once, then matches rows in parallel
//! on its own thread pool, attaching the matches to each row.

mod config;
mod driver;
mod progress;
mod selection;

pub use config::{AdvancedConfig, ConfigError, SearchConfig, DEFAULT_CONFIG_FILE, ENV_PREFIX};
pub use driver::{prepare_entries, LibraryMatchError, LibraryMatcher, MatchSummary};
pub use progress::{CancellationToken, MatchProgress, MatchTally};
pub use selection::{AllFragmentScans, FragmentScanSelection, MostSignalsScan};
