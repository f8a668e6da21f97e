pub mod analysis;
pub mod historical;
pub mod pipeline;
pub mod replay;
pub mod session;
pub mod speech;
pub mod stream_client;

#[cfg(test)]
mod stream_client_tests;
