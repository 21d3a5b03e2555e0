use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

use divesite_types::geo::Point;

use crate::state::{AppState, blocking};

/// Reverse geocoder that fills in `geocoding_data` for divesites.
#[derive(Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    url_template: String,
    key: Option<String>,
}

impl Geocoder {
    /// `url_template` holds `{lat}` and `{lng}` placeholders.
    pub fn new(url_template: impl Into<String>, key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building geocoding client")?;
        Ok(Self {
            client,
            url_template: url_template.into(),
            key,
        })
    }

    pub fn url_for(&self, point: Point) -> String {
        let mut url = self
            .url_template
            .replace("{lat}", &point.latitude.to_string())
            .replace("{lng}", &point.longitude.to_string());
        if let Some(key) = &self.key {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str("key=");
            url.push_str(key);
        }
        url
    }

    pub async fn reverse(&self, point: Point) -> Result<serde_json::Value> {
        let value = self
            .client
            .get(self.url_for(point))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }
}

/// Look up and store geocoding data for a site, if a geocoder is configured.
/// Failures are logged and leave the field empty.
pub async fn refresh(state: &AppState, site_id: Uuid, point: Point) -> Option<serde_json::Value> {
    let geocoder = state.geocoder.as_ref()?;

    let data = match geocoder.reverse(point).await {
        Ok(data) => data,
        Err(e) => {
            warn!("Reverse geocoding failed for site {}: {:#}", site_id, e);
            return None;
        }
    };

    let stored = data.clone();
    match blocking(state, move |db| db.set_geocoding_data(site_id, Some(&stored))).await {
        Ok(()) => {
            info!("Stored geocoding data for site {}", site_id);
            Some(data)
        }
        Err(_) => None,
    }
}
