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

//! Test utilities for the business logic layer.

use crate::db;
use crate::driver::{Driver, DriverOptions};
use crate::model::{Course, MembershipPayload, MembershipView, Student, StudentFields};
use classbook_core::clocks::testutils::MonotonicClock;
use classbook_core::db::{Db, Executor};
use classbook_core::model::Input;
use std::sync::Arc;
use time::macros::date;

/// State of a running test.
pub(crate) struct TestContext {
    /// The driver under test.
    driver: Driver,

    /// The database backing the driver.
    db: Arc<dyn Db + Send + Sync>,
}

impl TestContext {
    /// Initializes the driver with default options, an in-memory database and a monotonic clock.
    pub(crate) async fn setup() -> Self {
        Self::setup_with(DriverOptions::default()).await
    }

    /// Initializes the driver with the given `opts`, an in-memory database and a monotonic
    /// clock.
    pub(crate) async fn setup_with(opts: DriverOptions) -> Self {
        let db: Arc<dyn Db + Send + Sync> =
            Arc::new(classbook_core::db::sqlite::testutils::setup().await);
        db::init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        let clock = Arc::new(MonotonicClock::new(100000));
        let driver = Driver::new(db.clone(), clock, opts);
        Self { driver, db }
    }

    /// Gets a copy of the driver in this test context.
    pub(crate) fn driver(&self) -> Driver {
        self.driver.clone()
    }

    /// Gets a direct executor against the database.
    pub(crate) async fn ex(&self) -> Executor {
        self.db.ex().await.unwrap()
    }

    /// Syntactic sugar to store a student with a fixed birthday, bypassing validation.
    pub(crate) async fn create_student(&self, first_name: &str, last_name: &str) -> Student {
        let fields =
            StudentFields::new(first_name.to_owned(), last_name.to_owned(), date!(2000 - 01 - 01));
        db::create_student(&mut self.ex().await, fields).await.unwrap()
    }

    /// Syntactic sugar to store a course, bypassing validation.
    pub(crate) async fn create_course(&self, name: &str) -> Course {
        db::create_course(&mut self.ex().await, name.to_owned()).await.unwrap()
    }

    /// Syntactic sugar to enroll `student` in `course` through the driver so that the join date
    /// comes from the clock.
    pub(crate) async fn enroll(&self, student: &Student, course: &Course) -> MembershipView {
        let payload = MembershipPayload {
            student: Input::Valid(*student.id()),
            course: Input::Valid(*course.id()),
        };
        self.driver().create_membership(payload).await.unwrap()
    }
}
