pub mod cancel;
pub mod config;
pub mod media;
pub mod payloads;
pub mod provider;
pub mod report;
pub mod section;
pub mod selection;
pub mod source;
pub mod state;
pub mod views;
