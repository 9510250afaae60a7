use std::time::Duration;

use log::debug;
use reqwest::Client;

use crate::{
    CommsErr, Result,
    wire::{self, PUBLISH_FIELD, QUERY_FIELD},
};

/// Where the registry lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// The registry's `host[:port]`.
    pub host: String,
    pub query_path: String,
    pub publish_path: String,
    pub timeout: Duration,
}

/// The remote peer keeping the best known model error.
///
/// Callers of `best_rating` treat a failure as "unknown", usually by falling back to
/// `wire::WORST_RATING`, so a failing registry never aborts an activation.
#[trait_variant::make(RemoteRegistry: Send)]
pub trait RemoteRegistryTemplate {
    /// Queries the best error known to the registry.
    ///
    /// # Returns
    /// The error or a `CommsErr` on any transport or parse failure.
    async fn best_rating(&self) -> Result<f64>;

    /// Publishes a model together with its error.
    ///
    /// # Arguments
    /// * `object` - The serialized model.
    /// * `rating` - The error of the model.
    ///
    /// # Returns
    /// An error only if the request could not be completed, the response is not inspected.
    async fn publish(&self, object: &str, rating: f64) -> Result<()>;
}

/// A `RemoteRegistry` spoken to over plain http with form encoded posts.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: Client,
    query_url: String,
    publish_url: String,
}

impl HttpRegistry {
    /// Creates a new `HttpRegistry`.
    ///
    /// # Arguments
    /// * `config` - The registry's address, paths and timeout.
    ///
    /// # Returns
    /// A new `HttpRegistry` or an error if the http client could not be built.
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            query_url: url(&config.host, &config.query_path),
            publish_url: url(&config.host, &config.publish_path),
        })
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    pub fn publish_url(&self) -> &str {
        &self.publish_url
    }
}

impl RemoteRegistry for HttpRegistry {
    async fn best_rating(&self) -> Result<f64> {
        let response = self
            .client
            .post(&self.query_url)
            .form(&[(QUERY_FIELD, wire::query_payload())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CommsErr::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let rating = wire::parse_rating(&body)?;
        debug!(rating = rating; "registry best rating");
        Ok(rating)
    }

    async fn publish(&self, object: &str, rating: f64) -> Result<()> {
        let payload = wire::publish_payload(object, rating)?;

        let response = self
            .client
            .post(&self.publish_url)
            .form(&[(PUBLISH_FIELD, payload)])
            .send()
            .await?;

        debug!(status = response.status().as_u16(), rating = rating; "model published");
        Ok(())
    }
}

fn url(host: &str, path: &str) -> String {
    format!("http://{}/{}", host.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_host_and_path() {
        let config = RegistryConfig {
            host: "example.org:8080/".into(),
            query_path: "/best_rating.php".into(),
            publish_path: "save_neural_network.php".into(),
            timeout: Duration::from_secs(1),
        };
        let registry = HttpRegistry::new(&config).unwrap();

        assert_eq!(registry.query_url(), "http://example.org:8080/best_rating.php");
        assert_eq!(
            registry.publish_url(),
            "http://example.org:8080/save_neural_network.php"
        );
    }
}
