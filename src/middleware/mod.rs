// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (CORS, error boundary).

pub mod cors;
pub mod panic;

pub use cors::{apply_cors, CorsPolicy};
