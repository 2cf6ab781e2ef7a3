//! Routes detections to configured channels.
//!
//! The dispatcher drops events below the configured minimum level, renders
//! the rest once, and delivers the result to every channel. Individual
//! channel failures don't block other channels.

use std::str::FromStr;
use std::time::Duration;

use logeye_core::config::NotifyConfig;
use logeye_core::{Level, NotifyEvent};

use crate::log::LogNotifier;
use crate::templating::TemplateRenderer;
use crate::traits::{DispatchResult, Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

pub struct Dispatcher {
    channels: Vec<Box<dyn Notifier>>,
    min_level: Level,
    renderer: TemplateRenderer,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Notifier>>, min_level: Level) -> Self {
        Self {
            channels,
            min_level,
            renderer: TemplateRenderer::new(),
        }
    }

    /// Create an empty dispatcher that delivers nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Level::Info)
    }

    /// Log channel always, webhook when a URL is configured.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let min_level = Level::from_str(&config.min_level).map_err(NotifyError::Config)?;

        let mut channels: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier)];
        if let Some(url) = &config.webhook_url {
            let webhook = WebhookNotifier::from_config(url, None, None)?
                .with_timeout(Duration::from_secs(config.webhook_timeout_secs))?;
            channels.push(Box::new(webhook));
        }
        Ok(Self::new(channels, min_level))
    }

    pub fn with_renderer(mut self, renderer: TemplateRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.channel_name()).collect()
    }

    /// Deliver one detection to every channel.
    ///
    /// Returns results for each channel delivery; empty when the event is
    /// below the minimum level or fails to render.
    pub async fn dispatch(&self, event: &NotifyEvent) -> Vec<DispatchResult> {
        if event.level < self.min_level {
            tracing::debug!(
                rule_id = %event.rule_id,
                level = %event.level,
                min_level = %self.min_level,
                "Detection below notify level"
            );
            return Vec::new();
        }

        let notification = match self.renderer.notification(event) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(rule_id = %event.rule_id, error = %e, "Notification rendering failed");
                return Vec::new();
            }
        };

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let start = std::time::Instant::now();
            let result = channel.send(&notification).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::debug!(
                        rule_id = %event.rule_id,
                        channel = channel.channel_name(),
                        duration_ms,
                        "Notification delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        rule_id = %event.rule_id,
                        channel = channel.channel_name(),
                        error = %e,
                        duration_ms,
                        "Notification delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                rule_id: event.rule_id.clone(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }
}
