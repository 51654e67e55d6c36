//! Template rendering with the kdeploy function set.
//!
//! Templates use Jinja syntax. Two functions are registered on top of the
//! builtins:
//!
//! - `default(fallback, value)` yields `value` when it is a non-empty
//!   string and `fallback` otherwise.
//! - `required(value)` fails rendering when `value` is undefined or none.

use minijinja::{Error, ErrorKind, Value};
use tracing::trace;

use crate::environment::Variables;

/// Stage at which rendering failed.
#[derive(Debug)]
pub enum RenderError {
    Parse(Error),
    Execute(Error),
}

/// Template renderer for manifest bodies and override values.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    /// Create a new template renderer.
    pub fn new() -> Self {
        Self
    }

    fn environment<'source>() -> minijinja::Environment<'source> {
        let mut env = minijinja::Environment::new();
        env.add_function("default", default_value);
        env.add_function("required", required_value);
        env
    }

    /// Parse `source` as a template and render it against `variables`.
    pub fn render(&self, source: &str, variables: &Variables) -> Result<String, RenderError> {
        let env = Self::environment();
        let template = env.template_from_str(source).map_err(RenderError::Parse)?;
        trace!(variables = variables.len(), "executing template");
        template.render(variables).map_err(RenderError::Execute)
    }

    /// Check that `source` parses, without rendering it.
    pub fn check(&self, source: &str) -> Result<(), Error> {
        let env = Self::environment();
        env.template_from_str(source).map(|_| ())
    }
}

/// `default(fallback, value)`: anything but a non-empty string falls back.
pub fn default_value(fallback: Value, value: Value) -> Value {
    if value.as_str().is_some_and(|s| !s.is_empty()) {
        value
    } else {
        fallback
    }
}

/// `required(value)`: passes the value through, failing when it is absent.
pub fn required_value(value: Value) -> Result<Value, Error> {
    if value.is_undefined() || value.is_none() {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "missing required value",
        ));
    }
    Ok(value)
}
