//! CLI command implementations for denada.
//!
//! This module contains all the command implementations for the denada CLI tool.
//! Each submodule implements a specific command (denoise, merge, bimera).
//!
//! # Command Categories
//!
//! ## Denoising
//! - [`denoise`] - Denoise single-end amplicon reads into exact sequence variants
//! - [`merge`] - Denoise paired-end reads and merge overlapping partners
//!
//! ## Filtering
//! - [`bimera`] - Flag and remove bimeric sequences from a sequence table

// Blanket clippy pedantic allows for command implementations.
// These will be removed incrementally as commands are refactored.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unused_self,
    clippy::unnecessary_wraps,
    clippy::similar_names,
    clippy::needless_pass_by_value,
    clippy::match_same_arms,
    clippy::must_use_candidate,
    clippy::items_after_statements,
    clippy::too_many_lines,
    clippy::redundant_else,
    clippy::manual_let_else,
    clippy::needless_continue,
    clippy::redundant_closure_for_method_calls,
    clippy::explicit_iter_loop,
    clippy::uninlined_format_args,
    clippy::map_unwrap_or
)]

pub mod bimera;
pub mod command;
pub mod common;
pub mod denoise;
pub mod merge;
