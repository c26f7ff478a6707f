// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod error;
pub mod logger;
pub mod redirect;
pub mod server;
pub mod tracker;

pub use config::{LoggerConfig, RedirectConfig};
pub use error::RedirectError;
pub use logger::Logger;
pub use redirect::Redirector;
pub use server::{Server, ShutdownPhase};
pub use tracker::{InFlightLayer, RequestTracker};
