// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access to the Sauce OnDemand jobs API.

use crate::{config::SauceConfig, errors::SessionClientError, patch::UpdatePatch};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fmt;
use tracing::debug;
use ureq::Agent;

/// The base URL for viewing jobs in a browser.
pub const JOB_BROWSER_URL: &str = "https://saucelabs.com/jobs";

/// Fetches and updates remote job records.
///
/// [`SessionAnnotator`](crate::annotator::SessionAnnotator) is generic over this trait so that
/// it can be driven without a network connection.
pub trait SessionClient {
    /// Returns the raw JSON job record for a session.
    fn fetch_session(&self, session_id: &str) -> Result<String, SessionClientError>;

    /// Writes the fields in `patch` to the job record for a session.
    fn update_session(&self, session_id: &str, patch: &UpdatePatch)
    -> Result<(), SessionClientError>;

    /// Returns the URL at which the job for a session can be viewed.
    fn job_url(&self, session_id: &str) -> String {
        format!("{JOB_BROWSER_URL}/{session_id}")
    }
}

impl<C: SessionClient + ?Sized> SessionClient for &C {
    fn fetch_session(&self, session_id: &str) -> Result<String, SessionClientError> {
        (**self).fetch_session(session_id)
    }

    fn update_session(
        &self,
        session_id: &str,
        patch: &UpdatePatch,
    ) -> Result<(), SessionClientError> {
        (**self).update_session(session_id, patch)
    }

    fn job_url(&self, session_id: &str) -> String {
        (**self).job_url(session_id)
    }
}

/// A [`SessionClient`] backed by the Sauce REST API.
///
/// Requests are blocking, and each is bounded by the configured timeout.
pub struct SauceRestClient {
    agent: Agent,
    jobs_url: String,
    authorization: String,
}

impl SauceRestClient {
    /// Creates a new client from the given configuration.
    pub fn new(config: &SauceConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self {
            agent,
            jobs_url: jobs_url(&config.api_url, &config.username),
            authorization: basic_authorization(&config.username, config.access_key.expose()),
        }
    }

    /// Returns the API URL for the job record of a session.
    pub fn session_url(&self, session_id: &str) -> String {
        format!("{}/{session_id}", self.jobs_url)
    }
}

impl fmt::Debug for SauceRestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SauceRestClient")
            .field("jobs_url", &self.jobs_url)
            .finish_non_exhaustive()
    }
}

impl SessionClient for SauceRestClient {
    fn fetch_session(&self, session_id: &str) -> Result<String, SessionClientError> {
        let url = self.session_url(session_id);
        debug!("GET {url}");
        let http_error = |error| SessionClientError::Http {
            url: url.clone(),
            error: Box::new(error),
        };

        let mut response = self
            .agent
            .get(url.as_str())
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
            .call()
            .map_err(http_error)?;
        response.body_mut().read_to_string().map_err(http_error)
    }

    fn update_session(
        &self,
        session_id: &str,
        patch: &UpdatePatch,
    ) -> Result<(), SessionClientError> {
        let url = self.session_url(session_id);
        let body = patch
            .to_json()
            .map_err(|error| SessionClientError::Encode { error })?;
        debug!("PUT {url}: {body}");

        self.agent
            .put(url.as_str())
            .header("Authorization", self.authorization.as_str())
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(|error| SessionClientError::Http {
                url,
                error: Box::new(error),
            })?;
        Ok(())
    }
}

/// A [`SessionClient`] for runs without credentials.
///
/// Every request fails with [`SessionClientError::Offline`]. Untagged markers never reach the
/// client, so a run whose markers are all untagged completes normally with this client.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineClient;

impl SessionClient for OfflineClient {
    fn fetch_session(&self, _session_id: &str) -> Result<String, SessionClientError> {
        Err(SessionClientError::Offline)
    }

    fn update_session(
        &self,
        _session_id: &str,
        _patch: &UpdatePatch,
    ) -> Result<(), SessionClientError> {
        Err(SessionClientError::Offline)
    }
}

fn jobs_url(api_url: &str, username: &str) -> String {
    format!("{}/{username}/jobs", api_url.trim_end_matches('/'))
}

fn basic_authorization(username: &str, access_key: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{access_key}")))
}
