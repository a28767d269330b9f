//! Template engine for Open3E discovery templates
//!
//! Wraps a minijinja environment configured like the hub's: strict
//! undefined handling and the filters used by shipped datapoint templates.

use crate::error::{TemplateError, TemplateResult};
use crate::filters;
use minijinja::{context, Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A decoded `{mode, data: [[id, value]]}` write envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub mode: String,
    pub data: Vec<(u32, serde_json::Value)>,
}

impl CommandEnvelope {
    /// Payload written for `identifier`, if it is a string
    pub fn data_for(&self, identifier: u32) -> Option<&str> {
        self.data
            .iter()
            .find(|(id, _)| *id == identifier)
            .and_then(|(_, value)| value.as_str())
    }
}

/// Outcome of rendering a command template for one value
#[derive(Debug, Clone, PartialEq)]
pub enum CommandRender {
    /// The template produced a write envelope
    Envelope(CommandEnvelope),
    /// The template rendered to nothing: its guard rejected the value
    Rejected,
}

/// Template engine used for validation and local command rendering
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create a new template engine
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        Self::register_filters(&mut env);

        Self { env }
    }

    fn register_filters(env: &mut Environment<'static>) {
        // Type conversion
        env.add_filter("int", filters::to_int);
        env.add_filter("float", filters::to_float);

        // Formatting
        env.add_filter("format", filters::format);
        env.add_filter("regex_replace", filters::regex_replace);

        // JSON
        env.add_filter("to_json", filters::to_json);
    }

    /// Parse a template without rendering it
    pub fn check_syntax(&self, template: &str) -> TemplateResult<()> {
        // Parsing needs no filters; a scratch environment borrows `template` only
        Environment::new().template_from_str(template).map(|_| ())?;
        Ok(())
    }

    /// Render a template with context variables
    pub fn render_with_context(
        &self,
        template: &str,
        context: impl Serialize,
    ) -> TemplateResult<String> {
        let result = self.env.render_str(template, context)?;
        Ok(result)
    }

    /// Render a command template for `value` and decode the envelope.
    ///
    /// Whitespace-only output means the template's guard rejected the value.
    pub fn render_command(
        &self,
        template: &str,
        value: impl Serialize,
    ) -> TemplateResult<CommandRender> {
        let rendered = self.render_with_context(template, context! { value => value })?;
        let rendered = rendered.trim();

        if rendered.is_empty() {
            debug!("Command template rejected value");
            return Ok(CommandRender::Rejected);
        }

        serde_json::from_str(rendered)
            .map(CommandRender::Envelope)
            .map_err(|e| TemplateError::InvalidEnvelope {
                message: format!("{}: {}", e, rendered),
            })
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_syntax_ok() {
        let engine = TemplateEngine::new();
        assert!(engine.check_syntax("{{ value | int }}").is_ok());
        assert!(engine.check_syntax("plain text").is_ok());
        assert!(engine
            .check_syntax("{% if value == 1 %}on{% else %}off{% endif %}")
            .is_ok());
    }

    #[test]
    fn test_check_syntax_error() {
        let engine = TemplateEngine::new();
        let err = engine.check_syntax("{{ value | int }").unwrap_err();
        assert!(matches!(err, TemplateError::SyntaxError { .. }));
        assert!(engine.check_syntax("{% if value %}").is_err());
    }

    #[test]
    fn test_strict_undefined() {
        let engine = TemplateEngine::new();
        let err = engine
            .render_with_context("{{ missing.attr }}", context! { value => 1 })
            .unwrap_err();
        assert!(matches!(
            err,
            TemplateError::UndefinedVariable { .. } | TemplateError::RenderError { .. }
        ));
    }

    #[test]
    fn test_render_command_envelope() {
        let engine = TemplateEngine::new();
        let render = engine
            .render_command(r#"{"mode": "write", "data": [[396, "{{ value }}"]]}"#, 50)
            .unwrap();
        let CommandRender::Envelope(envelope) = render else {
            panic!("expected envelope");
        };
        assert_eq!(envelope.mode, "write");
        assert_eq!(envelope.data_for(396), Some("50"));
    }

    #[test]
    fn test_render_command_rejected() {
        let engine = TemplateEngine::new();
        let render = engine
            .render_command("{% if value > 10 %}{}{% endif %}", 5)
            .unwrap();
        assert_eq!(render, CommandRender::Rejected);
    }

    #[test]
    fn test_render_command_invalid_json() {
        let engine = TemplateEngine::new();
        let err = engine.render_command("not json {{ value }}", 5).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidEnvelope { .. }));
    }
}
