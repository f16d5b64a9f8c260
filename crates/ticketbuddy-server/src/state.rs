//! Shared handler state.

use std::path::PathBuf;
use std::sync::Arc;

use ticketbuddy_classifier::{ChatClient, Classifier, OwnerRoster};
use ticketbuddy_core::{Config, LanguageModel, Secrets};
use ticketbuddy_github::GitHubClient;
use ticketbuddy_storage::Store;
use tracing::{info, warn};

use crate::error::ApiError;

/// Everything a handler may reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub classifier: Classifier,
    pub model: Option<Arc<dyn LanguageModel>>,
    pub github: Option<Arc<GitHubClient>>,
    pub webhook_secret: Option<String>,
    pub log_sample: Option<PathBuf>,
}

impl AppState {
    /// State with only a store; collaborators are attached with the `with_*`
    /// builders.
    pub fn new(store: Store) -> Self {
        Self {
            store,
            classifier: Classifier::new(None),
            model: None,
            github: None,
            webhook_secret: None,
            log_sample: None,
        }
    }

    /// Wire up the collaborators described by the config and environment.
    pub fn from_config(store: Store, config: &Config, secrets: &Secrets) -> Self {
        if config.llm.is_some() && config.language_model().is_none() {
            warn!("[llm] needs both base_url and model; classifying with heuristics only");
        }
        let model: Option<Arc<dyn LanguageModel>> = config.language_model().map(|llm| {
            info!(base_url = %llm.base_url, model = %llm.model, "Language model configured");
            Arc::new(ChatClient::new(
                llm.base_url.clone(),
                llm.model.clone(),
                secrets.llm_api_key.clone(),
            )) as Arc<dyn LanguageModel>
        });

        let github = secrets.github_token.as_ref().map(|token| {
            info!(api_url = %config.github.api_url, "GitHub token configured");
            GitHubClient::with_base_url(config.github.api_url.clone(), token.clone())
        });

        let mut state = Self::new(store)
            .with_model(model)
            .with_roster(OwnerRoster::with_overrides(&config.classifier.owners))
            .with_webhook_secret(secrets.webhook_secret.clone());
        state.github = github.map(Arc::new);
        state.log_sample = config.diagnostics.log_sample.clone();
        state
    }

    pub fn with_model(mut self, model: Option<Arc<dyn LanguageModel>>) -> Self {
        let roster = self.classifier.roster().clone();
        self.classifier = Classifier::new(model.clone()).with_roster(roster);
        self.model = model;
        self
    }

    pub fn with_roster(mut self, roster: OwnerRoster) -> Self {
        self.classifier = self.classifier.with_roster(roster);
        self
    }

    pub fn with_github(mut self, client: GitHubClient) -> Self {
        self.github = Some(Arc::new(client));
        self
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret;
        self
    }

    pub fn with_log_sample(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_sample = Some(path.into());
        self
    }

    /// The GitHub client, or 503 when no token is configured.
    pub fn github(&self) -> Result<&GitHubClient, ApiError> {
        self.github
            .as_deref()
            .ok_or_else(|| ApiError::Unavailable("GitHub token not configured".to_string()))
    }
}
