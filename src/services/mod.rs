pub mod assembler;
pub mod janitor;
pub mod lifecycle;
pub mod probe;
pub mod session;
pub mod storage;
pub mod streaming;
pub mod transcoder;
pub mod video_store;
