//! 동기화 모듈.

pub mod ivs_sync;

pub use ivs_sync::sync_ivs;
