mod file_cache;
mod http_store;

pub use file_cache::FileCache;
pub use http_store::{HttpStore, LoginError, login};
