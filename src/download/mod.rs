pub mod chunk_item;
pub mod chunk_manager;
pub mod chunk_range;
pub mod config;
pub mod downloader;
pub mod error;
pub mod failure;
pub mod logger;
pub mod progress;
pub mod progress_bar;
pub mod transport;
pub mod util;
pub mod worker;
pub mod writer;
