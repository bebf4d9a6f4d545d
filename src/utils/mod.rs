pub mod http;
pub mod shell;
#[cfg(test)]
pub mod log_capture;

pub use http::HttpClient;
