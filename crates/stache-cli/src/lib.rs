// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! stache CLI library.
//!
//! Command-line front end for the [`stache`] template engine.
//!
//! # Usage
//!
//! ```bash
//! stache render page.mustache --data data.json    # Render to stdout
//! stache render page.mustache -d data.toml -o out.html
//! stache check templates/*.mustache               # Report syntax errors
//! stache tokens page.mustache --json              # Dump scanner output
//! ```
//!
//! Engine options are read from `stache.toml`; see [`config`].

/// CLI command implementations.
pub mod commands;
/// Project configuration.
pub mod config;
