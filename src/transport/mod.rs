pub mod oneshot;
pub mod stream;
