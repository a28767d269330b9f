//! Jinja2-compatible templates for the Open3E bridge
//!
//! The hub renders `value_template` and `command_template` strings itself;
//! this crate exists so the bridge can check those strings before they are
//! published and evaluate write envelopes locally:
//!
//! - `check_syntax(src)` - parse a template without rendering it
//! - `render_command(src, value)` - render a command template for a value
//!   and decode the resulting `{mode, data}` envelope
//!
//! # Filters
//!
//! - `| int` / `| float` - Type conversion with optional default
//! - `| format(args...)` - printf-style formatting (`'%02x' | format(v)`)
//! - `| to_json` - JSON serialization
//! - `| regex_replace(pattern, replacement)` - Regex substitution
//!
//! # Example
//!
//! ```ignore
//! use e3_template::TemplateEngine;
//!
//! let engine = TemplateEngine::new();
//! engine.check_syntax("{{ value | int }}")?;
//! let rendered = engine.render_command(
//!     r#"{"mode": "write", "data": [[396, "{{ value }}"]]}"#,
//!     50,
//! )?;
//! ```

mod engine;
mod error;
mod filters;

pub use engine::{CommandEnvelope, CommandRender, TemplateEngine};
pub use error::{TemplateError, TemplateResult};

// Re-export minijinja Value for convenience
pub use minijinja::Value;
