//! Keyword-driven auto-responses.
//!
//! Evaluation is a pure function over the inbound message body: match the
//! configured rule table, render the winning template, or fall back to a
//! generic reply when the message at least looks domain-relevant. The
//! session worker decides when (and with what delay) the reply is sent.

pub mod quote;

use std::sync::Arc;

use tracing::trace;

use enxame_config::AutoReplyConfig;

pub use quote::{FixedQuote, QuoteSource, RandomQuote};

/// One compiled rule: lowercased keywords plus the reply template.
struct ReplyRule {
    keywords: Vec<String>,
    template: String,
}

/// Evaluates inbound message text against the configured rule table.
pub struct AutoResponder {
    enabled: bool,
    rules: Vec<ReplyRule>,
    trigger_keywords: Vec<String>,
    fallback: Option<String>,
    quotes: Arc<dyn QuoteSource>,
}

impl AutoResponder {
    /// Build from config with the production quote source.
    pub fn from_config(cfg: &AutoReplyConfig) -> Self {
        Self::with_quote_source(cfg, Arc::new(RandomQuote))
    }

    /// Build from config with an injected quote source.
    pub fn with_quote_source(cfg: &AutoReplyConfig, quotes: Arc<dyn QuoteSource>) -> Self {
        Self {
            enabled: cfg.enabled,
            rules: cfg
                .rules
                .iter()
                .map(|r| ReplyRule {
                    keywords: r.keywords.iter().map(|k| k.to_lowercase()).collect(),
                    template: r.template.clone(),
                })
                .collect(),
            trigger_keywords: cfg
                .trigger_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            fallback: cfg.fallback.clone(),
            quotes,
        }
    }

    /// Evaluate a message body. Returns the rendered reply, or `None`
    /// when the message should not be answered.
    ///
    /// Matching is case-insensitive; the first rule whose keyword appears
    /// in the body wins. With no rule match, the fallback is returned
    /// only if a trigger keyword appears — messages that don't look
    /// domain-relevant get no reply at all.
    pub fn evaluate(&self, body: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let lowered = body.to_lowercase();

        for rule in &self.rules {
            if let Some(keyword) = rule.keywords.iter().find(|k| lowered.contains(k.as_str())) {
                trace!(keyword = %keyword, "auto-reply rule matched");
                return Some(self.render(&rule.template, keyword));
            }
        }

        if self.trigger_keywords.iter().any(|k| lowered.contains(k.as_str()))
            && let Some(fallback) = &self.fallback
        {
            trace!("no rule matched, trigger keyword present, using fallback");
            return Some(self.render(fallback, ""));
        }

        None
    }

    fn render(&self, template: &str, commodity: &str) -> String {
        if template.contains("{price}") {
            let price = self.quotes.price(commodity);
            template.replace("{price}", &format!("{price:.2}"))
        } else {
            template.to_string()
        }
    }
}
