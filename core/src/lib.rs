// Classbook
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Building blocks shared by the layers of the Classbook service.
//!
//! The service is organized in the following layers, each of which has a counterpart module in
//! this crate that provides its error and result types plus any reusable machinery:
//!
//! 1.  `model`: High-level data types that represent concepts in the domain of the application.
//!     Records submitted by clients are made of `Input` fields, and the problems found in them
//!     surface as `FieldErrors`.
//!
//! 1.  `db`: The persistence layer.  Services implement their queries as free functions that take
//!     an `Executor` and dispatch on the database backend it wraps.
//!
//! 1.  `driver`: The business logic layer.  Services provide their own `Driver` type to hold the
//!     in-memory state required by the app and to coordinate access to the database.
//!
//! 1.  `rest`: The HTTP layer.  Services provide an `axum::Router` whose handlers delegate every
//!     request to the `Driver`.
//!
//! 1.  `main`: The app launcher.  Its sole purpose is to gather configuration data from
//!     environment variables (see `env`) and to start serving the application.
//!
//! Errors float to the top of the app using the `?` operator and are translated to HTTP status
//! codes once returned from the REST layer.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

pub mod clocks;
pub mod db;
pub mod driver;
pub mod env;
pub mod model;
pub mod rest;
