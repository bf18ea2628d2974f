pub mod gdrive;
pub mod http;

pub use http::HttpFetcher;
