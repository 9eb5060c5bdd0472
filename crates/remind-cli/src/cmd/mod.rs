pub mod config;
pub mod goals;
pub mod run;
