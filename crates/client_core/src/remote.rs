use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::Card,
    protocol::{parse_card_list, parse_random_card},
};
use url::Url;

use crate::error::RemoteError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAck {
    pub message: String,
}

/// The authoritative side of the selection.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_random(&self) -> Result<Card, RemoteError>;
    async fn persist(&self, card: &Card) -> Result<StoreAck, RemoteError>;
    async fn list_stored(&self) -> Result<Vec<Card>, RemoteError>;
}

pub struct HttpRemoteStore {
    http: Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(server_url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(server_url)?;
        Ok(Self {
            http: Client::new(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_random(&self) -> Result<Card, RemoteError> {
        let res = self.http.get(self.endpoint("random-card")).send().await?;
        let body = successful(res).await?.bytes().await?;
        Ok(parse_random_card(&body)?)
    }

    async fn persist(&self, card: &Card) -> Result<StoreAck, RemoteError> {
        let res = self
            .http
            .post(self.endpoint("store"))
            .json(card)
            .send()
            .await?;
        let message = successful(res).await?.text().await?;
        Ok(StoreAck { message })
    }

    async fn list_stored(&self) -> Result<Vec<Card>, RemoteError> {
        let res = self.http.get(self.endpoint("stored")).send().await?;
        let body = successful(res).await?.bytes().await?;
        Ok(parse_card_list(&body)?)
    }
}

/// Turns a non-2xx response into [`RemoteError::Rejected`] carrying the body
/// text, which the controller needs for classification.
async fn successful(res: Response) -> Result<Response, RemoteError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
