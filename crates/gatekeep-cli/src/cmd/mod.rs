pub mod config;
pub mod init;
pub mod last;
pub mod list;
pub mod run;
pub mod show;
