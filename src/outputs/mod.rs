//! Report output: document handling, rendering, and persistence.
//!
//! # Submodules
//!
//! - [`document`]: owned HTML tree (parse, clone, edit, serialize)
//! - [`html`]: stamps a [`ReportModel`](crate::models::ReportModel) into a template
//! - [`file`]: writes the rendered bytes to the dated report file
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── S_OIL_PSR_03_01_2023.html
//! └── S_OIL_PSR_03_02_2023.html
//! ```

pub mod document;
pub mod file;
pub mod html;
