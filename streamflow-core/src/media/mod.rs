mod error;
mod executor;
mod probe;
mod thumbnail;

pub use error::{ProbeError, ThumbnailError};
pub use executor::{CommandExecutor, MediaTools, SystemCommandExecutor};
pub use probe::{parse_frame_rate, parse_probe_output, MediaProbe, ProbeResult};
pub use thumbnail::{
    resolve_percentage, SeekTimestamp, ThumbnailGenerator, ThumbnailOptions, DEFAULT_SEEK_SECONDS,
};
