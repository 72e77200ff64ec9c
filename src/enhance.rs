//! LLM query enhancement applied before retrieval

use crate::config::Config;
use crate::generation::{self, TextGenerator};
use crate::retry::{with_retry, RetryPolicy};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[async_trait]
pub trait QueryEnhancer: Send + Sync {
    async fn enhance(&self, query: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnhanceMethod {
    /// Fix obvious typos only
    Spell,
    /// Turn a vague description into a specific search query
    Rewrite,
    /// Add synonyms and related terms
    Expand,
}

impl EnhanceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnhanceMethod::Spell => "spell",
            EnhanceMethod::Rewrite => "rewrite",
            EnhanceMethod::Expand => "expand",
        }
    }

    fn prompt(&self, query: &str) -> String {
        match self {
            EnhanceMethod::Spell => format!(
                "Fix any spelling errors in this movie search query.\n\n\
                 Only correct obvious typos. Don't change correctly spelled words.\n\n\
                 Query: \"{query}\"\n\n\
                 If no errors, return the original query.\n\
                 Corrected:"
            ),
            EnhanceMethod::Rewrite => format!(
                "Rewrite this movie search query to be more specific and searchable.\n\n\
                 Original: \"{query}\"\n\n\
                 Consider:\n\
                 - Common movie knowledge (famous actors, popular films)\n\
                 - Genre conventions (horror = scary, animation = cartoon)\n\
                 - Keep it concise (under 10 words)\n\
                 - It should be a search-engine style query that's very specific\n\
                 - Don't use boolean logic\n\n\
                 Examples:\n\
                 - \"that bear movie where leo gets attacked\" -> \"The Revenant Leonardo DiCaprio bear attack\"\n\
                 - \"movie about bear in london with marmalade\" -> \"Paddington London marmalade\"\n\
                 - \"scary movie with bear from few years ago\" -> \"bear horror movie 2015-2020\"\n\n\
                 Rewritten query:"
            ),
            EnhanceMethod::Expand => format!(
                "Expand this movie search query with related terms.\n\n\
                 Add synonyms and related concepts that might appear in movie descriptions.\n\
                 Keep expansions relevant and focused.\n\
                 Return the original query followed by the added terms.\n\n\
                 Examples:\n\
                 - \"scary bear movie\" -> \"scary horror grizzly bear movie terrifying film\"\n\
                 - \"action movie with bear\" -> \"action thriller bear chase fight adventure\"\n\
                 - \"comedy with bear\" -> \"comedy funny bear humor lighthearted\"\n\n\
                 Query: \"{query}\""
            ),
        }
    }
}

pub struct LlmQueryEnhancer {
    generator: Arc<dyn TextGenerator>,
    method: EnhanceMethod,
    retry: RetryPolicy,
}

impl LlmQueryEnhancer {
    pub fn new(generator: Arc<dyn TextGenerator>, method: EnhanceMethod, retry: RetryPolicy) -> Self {
        Self {
            generator,
            method,
            retry,
        }
    }
}

pub fn from_config(method: EnhanceMethod, config: &Config) -> Result<Arc<dyn QueryEnhancer>> {
    Ok(Arc::new(LlmQueryEnhancer::new(
        generation::from_config(&config.generation)?,
        method,
        RetryPolicy::from(&config.retry),
    )))
}

/// Trims whitespace and one pair of surrounding quotes
fn clean_response(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(text)
}

#[async_trait]
impl QueryEnhancer for LlmQueryEnhancer {
    async fn enhance(&self, query: &str) -> Result<String> {
        let prompt = self.method.prompt(query);
        let response = with_retry(&self.retry, "enhance_query", || {
            self.generator.complete(&prompt)
        })
        .await?;

        let enhanced = clean_response(&response);
        if enhanced.is_empty() {
            return Err(Error::ExternalService(format!(
                "{} returned an empty {} enhancement",
                self.generator.provider_name(),
                self.method.as_str()
            )));
        }

        tracing::info!(
            "[ENHANCE] Enhanced query ({}): '{}' -> '{}'",
            self.method.as_str(),
            query,
            enhanced
        );
        Ok(enhanced.to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned responses in order and records every prompt
    pub(crate) struct ScriptedGenerator {
        responses: Mutex<VecDeque<Result<String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn replying(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::ExternalService("script exhausted".to_string())))
        }

        fn provider_name(&self) -> &str {
            "Scripted"
        }
    }

    pub(crate) fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_rewrite_strips_quotes() {
        let generator = Arc::new(ScriptedGenerator::replying(&["  \"Paddington London marmalade\"\n"]));
        let enhancer = LlmQueryEnhancer::new(generator.clone(), EnhanceMethod::Rewrite, fast_retry());

        let enhanced = enhancer.enhance("bear in london with marmalade").await.unwrap();
        assert_eq!(enhanced, "Paddington London marmalade");
        assert!(generator.prompts.lock().unwrap()[0].contains("bear in london with marmalade"));
    }

    #[tokio::test]
    async fn test_rate_limit_retried() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(Error::RateLimited("429".to_string())),
            Ok("bear".to_string()),
        ]));
        let enhancer = LlmQueryEnhancer::new(generator.clone(), EnhanceMethod::Spell, fast_retry());

        assert_eq!(enhancer.enhance("baer").await.unwrap(), "bear");
        assert_eq!(generator.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_response_is_failure() {
        let generator = Arc::new(ScriptedGenerator::replying(&["  "]));
        let enhancer = LlmQueryEnhancer::new(generator, EnhanceMethod::Expand, fast_retry());
        assert!(matches!(
            enhancer.enhance("bear").await,
            Err(Error::ExternalService(_))
        ));
    }
}
