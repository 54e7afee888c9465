/**
 * Remote Translation Module
 *
 * Online path backed by Lingva (a Google Translate front end without
 * tracking). Instances are tried in order; the first usable answer wins.
 */
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{Lang, AUTO_DETECT};

pub const DEFAULT_INSTANCES: [&str; 2] = ["https://lingva.ml", "https://lingva.lunar.icu"];

/// Online translation service
#[async_trait]
pub trait RemoteTranslator: Send + Sync {
    /// `source` may be `"auto"`; the service resolves it
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct LanguagesResponse {
    languages: Vec<Lang>,
}

pub struct LingvaClient {
    client: reqwest::Client,
    instances: Vec<String>,
}

impl LingvaClient {
    pub fn new() -> Result<Self> {
        Self::with_instances(DEFAULT_INSTANCES.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_instances(instances: Vec<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            instances: instances
                .into_iter()
                .map(|i| i.trim_end_matches('/').to_string())
                .collect(),
        })
    }

    pub fn instances(&self) -> &[String] {
        &self.instances
    }

    /// Languages offered by the first reachable instance, or English/Spanish
    pub async fn languages(&self) -> Vec<Lang> {
        for instance in &self.instances {
            let url = format!("{}/api/v1/languages", instance);
            match self.fetch_languages(&url).await {
                Ok(languages) => return languages,
                Err(e) => log::warn!("[Lingva] {} unavailable: {}", instance, e),
            }
        }
        vec![
            Lang {
                code: "en".to_string(),
                name: "English".to_string(),
            },
            Lang {
                code: "es".to_string(),
                name: "Spanish".to_string(),
            },
        ]
    }

    async fn fetch_languages(&self, url: &str) -> Result<Vec<Lang>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Network(format!("HTTP {}", response.status())));
        }
        let body: LanguagesResponse = response.json().await?;
        Ok(body.languages)
    }

    async fn translate_on(&self, instance: &str, text: &str, source: &str, target: &str) -> Result<String> {
        let url = format!(
            "{}/api/v1/{}/{}/{}",
            instance,
            source,
            target,
            urlencoding::encode(text)
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Network(format!("HTTP {}", response.status())));
        }

        let body = response.text().await?;
        parse_translation(&body)
    }
}

#[async_trait]
impl RemoteTranslator for LingvaClient {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let source = if source.trim().is_empty() { AUTO_DETECT } else { source };

        for instance in &self.instances {
            match self.translate_on(instance, text, source, target).await {
                Ok(translated) => return Ok(translated),
                Err(e) => log::warn!("[Lingva] {} failed: {}", instance, e),
            }
        }

        Err(Error::Network("translation service unavailable".to_string()))
    }
}

/// Instances answer with `{"translation": "..."}` or the bare text
fn parse_translation(body: &str) -> Result<String> {
    if !body.trim_start().starts_with('{') {
        return Ok(body.to_string());
    }

    let fields: HashMap<String, serde_json::Value> = serde_json::from_str(body)
        .map_err(|e| Error::Network(format!("unreadable response: {}", e)))?;
    fields
        .get("translation")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Network("response has no translation".to_string()))
}
