//! # place-resolver
//!
//! Turns free-text location mentions extracted from news articles into
//! latitude/longitude, using a local gazetteer first and external lookup
//! services as a fallback, under a hard cap on external calls.
//!
//! ## Architecture
//!
//! Each mention runs through the same fallback chain; a batch runs many
//! chains concurrently against shared read-only data.
//!
//! ```text
//!                     ┌──────────────────────┐
//!                     │  Documents (JSON)    │
//!                     │  pending mentions    │
//!                     └──────────┬───────────┘
//!                                │ normalize
//!                                ▼
//!                     ┌──────────────────────┐
//!                     │  Gazetteer lookup    │
//!                     │  substring on name   │
//!                     └──────────┬───────────┘
//!                                │ matching rows
//!                                ▼
//!                     ┌──────────────────────┐
//!                     │  Candidate tree      │
//!                     │  state/district/post │
//!                     │  + selector          │
//!                     └─────┬──────────┬─────┘
//!            candidate      │          │      no candidate
//!                 ┌─────────┘          └──────────┐
//!                 ▼                               ▼
//!      ┌─────────────────────┐         ┌─────────────────────┐
//!      │  POI refinement     │         │  Direct geocode     │
//!      │  nearby search,     │         │  best query score   │
//!      │  best name ratio    │         │                     │
//!      │  else candidate     │         │  else geocode_failed│
//!      └──────────┬──────────┘         └──────────┬──────────┘
//!                 └──────────────┬────────────────┘
//!                                ▼
//!                     ┌──────────────────────┐
//!                     │  Sinks               │
//!                     │  documents + store   │
//!                     └──────────────────────┘
//! ```
//!
//! Every external request passes through one shared call budget, a
//! per-provider throttle and the run's cancellation signal.
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for data files, providers and limits
//! - [`models`] - Mentions, resolution outcomes and the upstream document envelope
//! - [`error`] - Typed errors for the resolution chain and gazetteer loading
//! - [`gazetteer`] - CSV loading and case-insensitive name lookup over postal and village rows
//! - [`text`] - Mention normalization, subsequence test and similarity ratio
//! - [`candidates`] - Candidate hierarchy and the pluggable candidate selector
//! - [`providers`] - TomTom POI search and HERE geocoding clients
//! - [`resolve`] - The fallback chain, call budget, throttles, cancellation and batch runner
//! - [`sink`] - Writing outcomes back to documents and to the keyed location store

pub mod candidates;
pub mod config;
pub mod error;
pub mod gazetteer;
pub mod models;
pub mod providers;
pub mod resolve;
pub mod sink;
pub mod text;
