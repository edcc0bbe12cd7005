pub mod federation;
pub mod health;
pub mod playback;
