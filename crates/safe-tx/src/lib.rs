pub mod cmd;
pub mod common;
pub mod exit;

mod utils;
