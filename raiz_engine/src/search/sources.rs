//! The registered search sources.
//!
//! The registries are not integrated yet. Each source waits for a while, to behave like a remote call, and then
//! returns a fixed answer.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::debug;
use serde_json::json;

use crate::{
    db_types::SearchOrder,
    search::{SearchSource, SourceError, SourceOutcome},
};

pub const DEFAULT_SOURCE_DELAY: Duration = Duration::from_secs(1);

pub struct CannedSource {
    name: String,
    delay: Duration,
    outcome: SourceOutcome,
}

impl CannedSource {
    pub fn new<S: Into<String>>(name: S, delay: Duration, outcome: SourceOutcome) -> Self {
        Self { name: name.into(), delay, outcome }
    }
}

#[async_trait]
impl SearchSource for CannedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, order: &SearchOrder) -> Result<SourceOutcome, SourceError> {
        debug!("🔎️ {} searching for '{}' (order #{})", self.name, order.target_name, order.id);
        tokio::time::sleep(self.delay).await;
        Ok(self.outcome.clone())
    }
}

/// The production source set, in registration order.
pub fn default_sources(delay: Duration) -> Vec<Arc<dyn SearchSource>> {
    let registro_civil = SourceOutcome::found(json!({
        "cartorio": "Cartório Central",
        "livro": "Livro 1",
        "folha": "Folha 23"
    }));
    vec![
        Arc::new(CannedSource::new("RegistroCivil.org.br", delay, registro_civil)),
        Arc::new(CannedSource::new("FamilySearch.org", delay, SourceOutcome::not_found())),
        Arc::new(CannedSource::new("TJSP Portal", delay, SourceOutcome::not_found())),
    ]
}
