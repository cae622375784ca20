//! Session Cookie Store - Stateless Encrypted Session Handling
//!
//! The whole session lives in the browser: it is serialized to JSON, sealed
//! into an envelope by [`SessionCodec`] and written as one cookie, or as
//! numbered chunk cookies when the envelope exceeds the per-cookie budget.
//!
//! ## Reading
//!
//! A missing, undecryptable or expired session is reported as `None`. The
//! reason is only visible to the configured [`SessionObserver`].
//!
//! ## Writing
//!
//! Every save refreshes `uat` and recomputes `exp` from the current
//! [`ExpiryPolicy`]. Pass the `created_at` returned by a previous read to
//! keep the first `iat` across rolling renewals.

use actix_web::{HttpRequest, HttpResponseBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{ConfigError, SessionError};
use crate::utils::cookie_utils;
use crate::utils::crypto::{KeyPurpose, KeyRing};
use crate::utils::epoch;
use crate::utils::logging::{LogObserver, RejectReason, SessionEvent, SessionObserver};

use super::codec::{EnvelopeHeader, SessionCodec};
use super::cookie::{self, SessionCookieConfig};
use super::policy::ExpiryPolicy;

/// A session read back from the request cookies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession<T> {
    pub session: T,
    /// Issued-at of the session, to pass back into the next save
    pub created_at: i64,
}

/// Encrypted, chunked cookie session store
#[derive(Clone)]
pub struct SessionCookieStore {
    codec: SessionCodec,
    cookie: SessionCookieConfig,
    policy: ExpiryPolicy,
    chunk_size: usize,
    observer: Arc<dyn SessionObserver>,
}

impl SessionCookieStore {
    /// Create a store from one or more secrets
    ///
    /// # Errors
    ///
    /// Returns an error if the secrets are invalid, the policy cannot
    /// produce an expiry, or the cookie attributes exhaust the size budget.
    pub fn new<S: AsRef<str>>(
        secrets: &[S],
        cookie: SessionCookieConfig,
        policy: ExpiryPolicy,
    ) -> Result<Self, ConfigError> {
        let keys = KeyRing::new(secrets, KeyPurpose::Encryption)?;
        policy.validate()?;

        let chunk_size = cookie.chunk_size();
        if chunk_size == 0 {
            return Err(ConfigError::CookieTooLarge {
                max_cookie_size: cookie.max_cookie_size,
            });
        }

        Ok(Self {
            codec: SessionCodec::new(keys),
            cookie,
            policy,
            chunk_size,
            observer: Arc::new(LogObserver),
        })
    }

    /// Report store events to `observer` instead of the log
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub fn cookie_config(&self) -> &SessionCookieConfig {
        &self.cookie
    }

    #[must_use]
    pub fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }

    /// Expiry for a session issued at `iat` and saved at `uat`
    #[must_use]
    pub fn calculate_exp(&self, iat: i64, uat: i64) -> i64 {
        self.policy.calculate_exp(iat, uat)
    }

    /// Read the session from the request cookies
    #[must_use]
    pub fn read<T: DeserializeOwned>(&self, req: &HttpRequest) -> Option<StoredSession<T>> {
        self.read_at(req, epoch())
    }

    /// Read the session as of `now` (Unix seconds)
    #[must_use]
    pub fn read_at<T: DeserializeOwned>(
        &self,
        req: &HttpRequest,
        now: i64,
    ) -> Option<StoredSession<T>> {
        let cookies = cookie_utils::get_all(req);
        let value = cookie::reassemble(&self.cookie.name, &cookies)?;

        let (header, cleartext) = match self.codec.decrypt(&value) {
            Ok(opened) => opened,
            Err(_) => return self.reject(RejectReason::DecryptFailed),
        };

        if let Err(reason) = self.policy.check(&header, now) {
            return self.reject(reason);
        }

        match serde_json::from_slice(&cleartext) {
            Ok(session) => Some(StoredSession {
                session,
                created_at: header.iat,
            }),
            Err(_) => self.reject(RejectReason::MalformedPayload),
        }
    }

    /// Write `session` to the response, or clear it when `None`
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be serialized or encrypted.
    pub fn save<T: Serialize>(
        &self,
        req: &HttpRequest,
        res: &mut HttpResponseBuilder,
        session: Option<&T>,
        created_at: Option<i64>,
    ) -> Result<(), SessionError> {
        self.save_at(req, res, session, created_at, epoch())
    }

    /// Write `session` as of `now` (Unix seconds)
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be serialized or encrypted.
    pub fn save_at<T: Serialize>(
        &self,
        req: &HttpRequest,
        res: &mut HttpResponseBuilder,
        session: Option<&T>,
        created_at: Option<i64>,
        now: i64,
    ) -> Result<(), SessionError> {
        let cookies = cookie_utils::get_all(req);

        let Some(session) = session else {
            log::debug!("clearing all matching session cookies");
            self.clear_matching(res, &cookies, |name| {
                cookie::is_session_cookie(&self.cookie.name, name)
            });
            return Ok(());
        };

        let uat = now;
        let iat = created_at.unwrap_or(uat);
        let exp = self.policy.calculate_exp(iat, uat);
        let attributes = self.cookie.attributes(exp);

        log::debug!(
            "found session, creating encrypted session cookie(s) with name {}",
            self.cookie.name
        );
        let value = self
            .codec
            .encrypt(&serde_json::to_vec(session)?, EnvelopeHeader { iat, uat, exp })?;

        let chunk_size = self.cookie.chunk_size_for(value.len());
        let chunks = cookie::split_chunks(&value, chunk_size);
        if chunks.len() > 1 {
            self.observer.on_event(&SessionEvent::ChunkingTriggered {
                chunks: chunks.len(),
                chunk_size,
            });
            for (index, chunk) in chunks.iter().enumerate() {
                let name = cookie::chunk_name(&self.cookie.name, index);
                cookie_utils::set(res, &name, chunk, &attributes);
            }
            let chunk_count = chunks.len();
            self.clear_matching(res, &cookies, |name| {
                name == self.cookie.name
                    || cookie::chunk_index(&self.cookie.name, name)
                        .is_some_and(|index| index >= chunk_count)
            });
        } else {
            cookie_utils::set(res, &self.cookie.name, &value, &attributes);
            self.clear_matching(res, &cookies, |name| {
                cookie::chunk_index(&self.cookie.name, name).is_some()
            });
        }

        Ok(())
    }

    /// Remove every session cookie present on the request
    pub fn clear(&self, req: &HttpRequest, res: &mut HttpResponseBuilder) {
        let cookies = cookie_utils::get_all(req);
        self.clear_matching(res, &cookies, |name| {
            cookie::is_session_cookie(&self.cookie.name, name)
        });
    }

    fn clear_matching(
        &self,
        res: &mut HttpResponseBuilder,
        cookies: &HashMap<String, String>,
        matches: impl Fn(&str) -> bool,
    ) {
        let mut names: Vec<&String> = cookies.keys().filter(|name| matches(name)).collect();
        names.sort();

        let scope = self.cookie.attributes(0).scope();
        for name in names {
            cookie_utils::clear(res, name, &scope);
            self.observer.on_event(&SessionEvent::CookieCleared { name: name.clone() });
        }
    }

    fn reject<T>(&self, reason: RejectReason) -> Option<T> {
        self.observer.on_event(&SessionEvent::SessionRejected { reason });
        None
    }
}
