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

//! Collection of clock implementations.
//!
//! Any timestamp that the service persists must come from a `Clock` so that tests can control
//! the values that end up in the database.

use time::OffsetDateTime;

/// Generic definition of a clock.
pub trait Clock {
    /// Returns the current UTC time.
    fn now_utc(&self) -> OffsetDateTime;
}

/// Clock implementation that uses the system clock.
#[derive(Clone, Default)]
pub struct SystemClock {}

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();

        // Timestamps in the PostgreSQL database have microsecond resolution.  Truncate here so
        // that what we return to clients matches what we read back later.
        let nanos = nanos / 1000 * 1000;

        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .expect("nanos must be in range because they come from the current timestamp")
    }
}

/// Test utilities.
#[cfg(feature = "testutils")]
pub mod testutils {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// A clock that returns a different, strictly increasing instant on every query.
    ///
    /// The clock starts at a given number of seconds since the epoch and moves forward by one
    /// second every time it is read, which makes ordering by timestamp deterministic in tests.
    pub struct MonotonicClock {
        /// Next value to return, in seconds since the epoch.
        next_secs: AtomicU64,
    }

    impl MonotonicClock {
        /// Creates a new clock whose first reading is `start_secs` seconds since the epoch.
        pub fn new(start_secs: u64) -> Self {
            Self { next_secs: AtomicU64::new(start_secs) }
        }
    }

    impl Clock for MonotonicClock {
        fn now_utc(&self) -> OffsetDateTime {
            let secs = self.next_secs.fetch_add(1, Ordering::SeqCst);
            OffsetDateTime::from_unix_timestamp(i64::try_from(secs).unwrap()).unwrap()
        }
    }

}
