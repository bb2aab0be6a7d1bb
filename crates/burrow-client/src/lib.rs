//! Client SDK for the Burrow coordination server.
//!
//! Wraps the generated gRPC client with token metadata, optional TLS and a
//! stable claimer identity. The identity (`who`) defaults to a random UUID
//! for the lifetime of the client; every lock call uses it.
//!
//! ```no_run
//! # async fn example() -> Result<(), burrow_client::ClientError> {
//! let mut client =
//!     burrow_client::Client::connect("http://127.0.0.1:8080", Default::default()).await?;
//! client.put(&["app", "settings"], "theme", b"dark").await?;
//! let grant = client.claim_lock("migration", None).await?;
//! println!("lease until {}", grant.valid_until);
//! client.release_lock("migration").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tonic::Request;
use tonic::metadata::MetadataValue;
use tonic::metadata::Ascii;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

use burrow_api::convert::{datetime_from_timestamp, duration_to_proto};
use burrow_api::grpc::burrow_client::BurrowClient;
use burrow_api::grpc::{
    DeleteRequest, GetRequest, LockRequest, PutRequest, ReleaseRequest,
};

pub use error::ClientError;

/// Connection options.
#[derive(Clone, Debug, Default)]
pub struct ClientOpts {
    /// Static token sent in the `token` metadata key of every request.
    pub token: Option<String>,
    /// PEM file of the CA to trust. Enables TLS when set.
    pub ca_cert_path: Option<PathBuf>,
    /// Claimer identity for lock calls. Defaults to a random UUID.
    pub who: Option<String>,
}

/// A granted (or refreshed) lease.
#[derive(Clone, Debug)]
pub struct LockGrant {
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

pub struct Client {
    inner: BurrowClient<Channel>,
    token: Option<MetadataValue<Ascii>>,
    who: String,
}

impl Client {
    /// Connects to `endpoint` (e.g. `http://127.0.0.1:8080`, or `https://`
    /// with `ca_cert_path` set).
    pub async fn connect(endpoint: &str, opts: ClientOpts) -> Result<Self, ClientError> {
        let mut builder = Endpoint::from_shared(endpoint.to_string())?;
        if let Some(ca_path) = &opts.ca_cert_path {
            let pem = std::fs::read(ca_path)?;
            let tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem));
            builder = builder.tls_config(tls)?;
        }
        let channel = builder.connect().await?;

        let token = match &opts.token {
            Some(token) => Some(MetadataValue::try_from(token.as_str())?),
            None => None,
        };
        let who = opts
            .who
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        debug!(endpoint, who, "connected");

        Ok(Client {
            inner: BurrowClient::new(channel),
            token,
            who,
        })
    }

    /// The claimer identity used for lock calls.
    pub fn who_am_i(&self) -> &str {
        &self.who
    }

    pub async fn put(
        &mut self,
        buckets: &[&str],
        key: &str,
        value: &[u8],
    ) -> Result<(), ClientError> {
        let request = self.request(PutRequest {
            buckets: buckets.iter().map(|s| s.to_string()).collect(),
            key: key.to_string(),
            value: value.to_vec(),
        });
        self.inner.put(request).await?;
        Ok(())
    }

    pub async fn get(&mut self, buckets: &[&str], key: &str) -> Result<Vec<u8>, ClientError> {
        let request = self.request(GetRequest {
            buckets: buckets.iter().map(|s| s.to_string()).collect(),
            key: key.to_string(),
        });
        let response = self.inner.get(request).await?;
        Ok(response.into_inner().value)
    }

    pub async fn delete(&mut self, buckets: &[&str], key: &str) -> Result<(), ClientError> {
        let request = self.request(DeleteRequest {
            buckets: buckets.iter().map(|s| s.to_string()).collect(),
            key: key.to_string(),
        });
        self.inner.delete(request).await?;
        Ok(())
    }

    /// Claims (or refreshes) the lease named `key`. A denied claim is an
    /// error carrying the current holder; use [`Client::claim_lock_raw`] to
    /// inspect the outcome without an error.
    pub async fn claim_lock(
        &mut self,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<LockGrant, ClientError> {
        let (acquired, grant) = self.claim_lock_raw(key, ttl).await?;
        if !acquired {
            return Err(ClientError::LockNotClaimed {
                key: key.to_string(),
                owner: grant.owner,
            });
        }
        Ok(grant)
    }

    /// Claims (or refreshes) the lease named `key`, returning whether it was
    /// granted along with the current record.
    pub async fn claim_lock_raw(
        &mut self,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<(bool, LockGrant), ClientError> {
        let request = self.request(LockRequest {
            key: key.to_string(),
            who: self.who.clone(),
            ttl: ttl.map(duration_to_proto),
        });
        let response = self.inner.claim_lock(request).await?.into_inner();
        let created_at = response
            .created_at
            .as_ref()
            .and_then(datetime_from_timestamp)
            .ok_or(ClientError::MissingField("created_at"))?;
        let valid_until = response
            .valid_until
            .as_ref()
            .and_then(datetime_from_timestamp)
            .ok_or(ClientError::MissingField("valid_until"))?;
        Ok((
            response.acquired,
            LockGrant {
                owner: response.owner,
                created_at,
                valid_until,
            },
        ))
    }

    /// Releases the lease named `key` held by this client.
    pub async fn release_lock(&mut self, key: &str) -> Result<(), ClientError> {
        let request = self.request(ReleaseRequest {
            key: key.to_string(),
            who: self.who.clone(),
        });
        self.inner.release_lock(request).await?;
        Ok(())
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(token) = &self.token {
            request.metadata_mut().insert("token", token.clone());
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_not_claimed_display() {
        let err = ClientError::LockNotClaimed {
            key: "job".to_string(),
            owner: "worker-1".to_string(),
        };
        assert_eq!(err.to_string(), "lock 'job' is held by 'worker-1'");
    }
}
