pub mod app_state;
pub mod capability;
pub mod errors;
