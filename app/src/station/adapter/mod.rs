mod http;
mod state_file;

pub use http::{FetchError, StationHttpClient};
pub use state_file::LastRainStore;
