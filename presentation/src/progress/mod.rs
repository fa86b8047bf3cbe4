//! Live progress rendering while a session runs

pub mod reporter;
