// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Client library for the [IG](https://www.ig.com) trading platform.
//!
//! IG operates a retail and professional trading platform for CFDs, spread
//! betting and forex. This crate bridges an application to the platform's
//! three surfaces:
//!
//! - **REST API**: session establishment, token refresh and reference-data
//!   retrieval over HTTPS.
//! - **Push streaming**: many logical subscriptions (market quotes, account
//!   streams, trade confirmations) multiplexed over one persistent
//!   connection, with MERGE/DISTINCT/RAW/COMMAND delivery semantics and
//!   two-level COMMAND expansion.
//! - **Local cache**: a SQLite store for instrument reference data and
//!   historical prices, written through idempotent upserts with fixed-point
//!   integer columns.
//!
//! The three concerns meet in the session lifecycle: the credential store
//! tracks token validity in real time and publishes `loggedOut`, `ready` and
//! `expired` transitions to subscribed observers without polling, so
//! dependents (schedulers, the streaming client, callers) react to expiry
//! the moment it happens.
//!
//! The vendor's low-level streaming transport is consumed behind the
//! [`streaming::StreamingTransport`] trait; this crate owns the dispatch and
//! state-management discipline built on top of it, not the wire protocol.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod cache;
pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod streaming;

pub use client::IgClient;
pub use config::IgClientConfig;
pub use error::IgError;
