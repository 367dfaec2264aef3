//! Command handlers

pub mod check;
pub mod run;

pub use check::handle_check_command;
pub use run::handle_run_command;
