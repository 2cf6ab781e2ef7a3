//! Minijinja template rendering for notification messages.
//!
//! Templates see the detection as `event` (every [`NotifyEvent`] field) and
//! the render time as `now`. Templates are arbitrary strings (not
//! pre-registered), so a fresh [`minijinja::Environment`] is created per
//! render call.

use chrono::{SecondsFormat, Utc};
use logeye_core::NotifyEvent;

use crate::traits::{Notification, NotifyError};

pub const DEFAULT_SUBJECT: &str = "[{{ event.level | upper }}] {{ event.title }}";

pub const DEFAULT_BODY: &str = "{{ event.kind }} detection {{ event.rule_id }} from {{ event.source }} at {{ event.time }}\
{% if event.score is defined %} (score {{ event.score | round(2) }}){% endif %}\
{% if event.tags %}\ntags: {{ event.tags | join(', ') }}{% endif %}\n{{ event.body }}";

/// Context data available to notification templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext<'a> {
    pub event: &'a NotifyEvent,
    /// Render timestamp in RFC 3339 format.
    pub now: String,
}

/// Renders notification templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    subject: String,
    body: String,
}

impl TemplateRenderer {
    /// Renderer using the built-in subject and body templates.
    pub fn new() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            body: DEFAULT_BODY.to_string(),
        }
    }

    /// Renderer with custom templates. Both are syntax-checked up front.
    pub fn with_templates(subject: &str, body: &str) -> Result<Self, NotifyError> {
        let renderer = Self {
            subject: subject.to_string(),
            body: body.to_string(),
        };
        renderer.validate(subject)?;
        renderer.validate(body)?;
        Ok(renderer)
    }

    /// Build a configured minijinja environment with custom filters and globals.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("round", round_filter);
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);
        env.add_function("env", env_function);
        env
    }

    /// Render a template string with the given context.
    pub fn render(&self, template_str: &str, ctx: &TemplateContext<'_>) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Check that a template string parses. Does not evaluate it.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }

    /// Render a detection into a deliverable notification.
    pub fn notification(&self, event: &NotifyEvent) -> Result<Notification, NotifyError> {
        let ctx = TemplateContext {
            event,
            now: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        Ok(Notification {
            subject: self.render(&self.subject, &ctx)?,
            body: self.render(&self.body, &ctx)?,
            event: event.clone(),
        })
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom filter: round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

/// Global function: read an environment variable by name, empty when unset.
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}
