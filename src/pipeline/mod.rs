//! Pipeline stages for HTML-tree-to-PDF export.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the browser backend can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! walk ──▶ mapper ──▶ render ──▶ write
//! (paths)  (dest+URL) (Chrome)   (atomic)
//! ```
//!
//! 1. [`walk`]   — lazy depth-first enumeration of files under the input root
//! 2. [`mapper`] — destination path and navigable URL for each HTML file
//! 3. [`render`] — navigate, wait for network idle, print to PDF; browser
//!    calls run in `spawn_blocking`
//! 4. [`write`]  — idempotent directory creation and temp-file + rename writes

pub mod mapper;
pub mod render;
pub mod walk;
pub mod write;
