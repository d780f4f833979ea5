pub mod billing;
pub mod content;
pub mod generation;
pub mod init;
pub mod prompt;
pub mod publish;
pub mod schedule;
pub mod session;
pub mod social_auth;
pub mod titles;
