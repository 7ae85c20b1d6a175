//! Fancrush Talkline - voice call backend for AI influencer profiles.
//!
//! This library provides the core functionality for the Talkline backend:
//! profile and catalog storage, minute-balance accounting, Stripe checkout
//! integration, Twilio PSTN calls and the webhook handlers that reconcile
//! both.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod rate_limit;
pub mod telephony;
