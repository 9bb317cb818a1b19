pub mod relay;
pub mod telegram;
pub mod updates;
