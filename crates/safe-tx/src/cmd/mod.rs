pub mod config;
pub mod confirm;
pub mod execute;
pub mod info;
pub mod pending;
pub mod propose;
pub mod reject;
pub mod status;
pub mod watch;
