use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CATALOG_URL: &str = "https://api.jikan.moe/v4/seasons/now";

const USER_AGENT: &str = concat!("airing-rs/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
   #[error("catalog responded with status {0}")]
   Status(reqwest::StatusCode),
   #[error(transparent)]
   Request(#[from] reqwest::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeasonResponse {
   pub data: Vec<Anime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anime {
   pub mal_id: i64,
   pub title: String,
   #[serde(default)]
   pub images: Images,
   #[serde(default)]
   pub broadcast: Broadcast,
   pub score: Option<f64>,
}

impl Anime {
   pub fn image_url(&self) -> Option<&str> {
      self.images.jpg.image_url.as_deref()
   }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Images {
   #[serde(default)]
   pub jpg: ImageData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
   pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
   pub day: Option<String>,
   pub time: Option<String>,
   pub timezone: Option<String>,
}

/// Source of the current season's listings.
#[trait_variant::make(ScheduleFetcher: Send)]
pub trait LocalScheduleFetcher {
   /// Fetches the current season once. No retries.
   async fn fetch_season(&self) -> Result<Vec<Anime>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct JikanClient {
   http: Client,
   url: String,
}

impl JikanClient {
   pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
      let http = Client::builder().user_agent(USER_AGENT).build()?;

      Ok(Self {
         http,
         url: url.into(),
      })
   }
}

impl ScheduleFetcher for JikanClient {
   async fn fetch_season(&self) -> Result<Vec<Anime>, FetchError> {
      let response = self.http.get(&self.url).send().await?;

      if !response.status().is_success() {
         return Err(FetchError::Status(response.status()));
      }

      let season: SeasonResponse = response.json().await?;
      log::info!("Fetched {} anime from {}", season.data.len(), self.url);

      Ok(season.data)
   }
}
