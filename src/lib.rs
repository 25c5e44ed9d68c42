//! # LegisCI
//!
//! Browser for Ivorian legislation (constitution, codes, laws, decrees) with
//! an administration back office and an AI assistant that answers legal
//! questions and cites the relevant texts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │   HTTP   │──▶│   handlers   │──▶│ repositories │──▶│  SQLite  │
//! │ (axum)   │   │   (api/*)    │   │ (documents…) │   │          │
//! └──────────┘   └──────┬───────┘   └──────────────┘   └──────────┘
//!                       │
//!                       ▼
//!                ┌──────────────┐
//!                │  ChatModel   │  hosted chat completion, canned fallback
//!                └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`], [`migrate`] | Connection pool and schema |
//! | [`models`] | Records and their JSON shapes |
//! | [`categories`], [`documents`] | Legal content repositories |
//! | [`search`] | Document and article search |
//! | [`matcher`], [`assistant`], [`chat`] | AI assistant and its sessions |
//! | [`llm`] | Chat-completion client abstraction |
//! | [`tracking`], [`analytics`] | Visitor data and statistics |
//! | [`extract`], [`analysis`], [`storage`] | PDF handling |
//! | [`admin`] | Back-office document management |
//! | [`auth`] | Users, logins, route guards |
//! | [`dashboard`] | Dashboard counters |
//! | [`seed`] | Reference data |
//! | [`server`], [`api`] | HTTP server and routes |

pub mod admin;
pub mod analysis;
pub mod analytics;
pub mod api;
pub mod assistant;
pub mod auth;
pub mod categories;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod documents;
pub mod error;
pub mod extract;
pub mod llm;
pub mod matcher;
pub mod migrate;
pub mod models;
pub mod pagination;
pub mod search;
pub mod seed;
pub mod server;
pub mod storage;
pub mod text;
pub mod tracking;

#[cfg(test)]
pub mod testing;
