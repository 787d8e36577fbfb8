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

//! Business logic for the students, courses and memberships service.

use classbook_core::clocks::Clock;
use classbook_core::db::{Db, DbError};
use classbook_core::driver::DriverError;
use classbook_core::env::get_optional_var;
use std::sync::Arc;

mod courses;
mod memberships;
mod roster;
mod students;
#[cfg(test)]
pub(crate) mod testutils;
mod validation;

/// Default value for the `MAX_NAME_LENGTH` setting when not specified.
const DEFAULT_MAX_NAME_LENGTH: usize = 20;

/// Configuration options for the driver.
#[derive(Clone, Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct DriverOptions {
    /// Maximum number of characters in student and course names.
    pub max_name_length: usize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self { max_name_length: DEFAULT_MAX_NAME_LENGTH }
    }
}

impl DriverOptions {
    /// Creates a new set of options from environment variables.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        let max_name_length = get_optional_var::<usize>(prefix, "MAX_NAME_LENGTH")?
            .unwrap_or(DEFAULT_MAX_NAME_LENGTH);
        if max_name_length == 0 {
            return Err(format!("{}_MAX_NAME_LENGTH must be positive", prefix));
        }
        Ok(Self { max_name_length })
    }
}

/// Business logic.
///
/// The public operations exposed by the driver are all "one shot": they start and commit a
/// transaction, so it's incorrect for the caller to use two separate calls.  For this reason,
/// these operations consume the driver in an attempt to minimize the possibility of executing
/// two operations.
#[derive(Clone)]
pub(crate) struct Driver {
    /// The database that the driver uses for persistence.
    db: Arc<dyn Db + Send + Sync>,

    /// Clock instance to obtain the current time.
    clock: Arc<dyn Clock + Send + Sync>,

    /// Options for the driver.
    opts: DriverOptions,
}

impl Driver {
    /// Creates a new driver backed by the given dependencies.
    pub(crate) fn new(
        db: Arc<dyn Db + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
        opts: DriverOptions,
    ) -> Self {
        Self { db, clock, opts }
    }
}

/// Converts a database error into a driver error, naming the `what` entity when it is missing.
fn map_not_found(e: DbError, what: &str) -> DriverError {
    match e {
        DbError::NotFound => DriverError::NotFound(format!("{} not found", what)),
        e => e.into(),
    }
}
