//! Testing utilities for rp-session
//!
//! - [`fixtures`] - Pre-built stores, orchestrator and settings
//! - [`requests`] - Browser-like cookie replay between responses and requests
//! - [`mock`] - Fake collaborators (observer, OIDC client, login state hook)
//!
//! ## Usage
//!
//! ```rust
//! use actix_web::HttpResponse;
//! use rp_session::testing::{fixtures::TestFixtures, requests::request_from_response};
//!
//! let store = TestFixtures::session_store();
//! let mut builder = HttpResponse::Ok();
//! let req = actix_web::test::TestRequest::default().to_http_request();
//! store.save(&req, &mut builder, Some(&serde_json::json!({"sub": "alice"})), None).unwrap();
//!
//! let next = request_from_response(&builder.finish());
//! assert!(store.read::<serde_json::Value>(&next).is_some());
//! ```

pub mod fixtures;
pub mod mock;
pub mod requests;

pub use fixtures::TestFixtures;
pub use mock::RecordingObserver;
