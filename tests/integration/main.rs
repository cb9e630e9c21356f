//! Integration tests for the denada CLI.
//!
//! These tests run the compiled binary end to end on small synthetic
//! datasets, checking the written tables, FASTAs, and metrics files.

mod helpers;
mod test_bimera_command;
mod test_denoise_command;
mod test_error_paths;
mod test_merge_command;
mod test_pipeline;
