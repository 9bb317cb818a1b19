pub mod access;
pub mod dedup;
pub mod enqueue;
pub mod intake;
pub mod login;
