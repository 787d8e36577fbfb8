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

//! Extends the driver with operations on memberships.

use crate::db;
use crate::driver::validation::{duplicate_enrollment, validate_membership};
use crate::driver::{Driver, map_not_found};
use crate::model::{
    CourseId, MembershipFilter, MembershipId, MembershipPayload, MembershipView, StudentId,
};
use classbook_core::db::DbError;
use classbook_core::driver::{DriverError, DriverResult};
use log::{info, warn};

/// Converts a failed membership write into a driver error.
///
/// The unique index catches duplicate enrollments that raced past validation, and those must be
/// reported the same way as the ones validation detects.
fn map_write_error(e: DbError, student: StudentId, course: CourseId) -> DriverError {
    match e {
        DbError::AlreadyExists => {
            warn!("Concurrent enrollment of student {} in course {} rejected", student, course);
            DriverError::Validation(duplicate_enrollment())
        }
        e => map_not_found(e, "Membership"),
    }
}

impl Driver {
    /// Gets all memberships that match `filter`, ordered by identifier.
    pub(crate) async fn list_memberships(
        self,
        filter: MembershipFilter,
    ) -> DriverResult<Vec<MembershipView>> {
        let mut ex = self.db.ex().await?;
        Ok(db::list_memberships(&mut ex, filter).await?)
    }

    /// Gets the membership `id`.
    pub(crate) async fn get_membership(self, id: MembershipId) -> DriverResult<MembershipView> {
        let mut ex = self.db.ex().await?;
        db::get_membership(&mut ex, id).await.map_err(|e| map_not_found(e, "Membership"))
    }

    /// Enrolls a student in a course as described by the client-supplied `payload`.
    ///
    /// The join date is the time at which the membership is written.
    pub(crate) async fn create_membership(
        self,
        payload: MembershipPayload,
    ) -> DriverResult<MembershipView> {
        let mut tx = self.db.begin().await?;

        let (student, course) = validate_membership(tx.ex(), payload, None, false).await?;

        let now = self.clock.now_utc();
        let membership = db::create_membership(tx.ex(), student, course, now)
            .await
            .map_err(|e| map_write_error(e, student, course))?;
        let view = db::get_membership(tx.ex(), *membership.id()).await?;
        tx.commit().await?;

        info!("Enrolled student {} in course {}", student, course);
        Ok(view)
    }

    /// Modifies the membership `id` with the contents of `payload`.  The join date never changes.
    ///
    /// When `partial` is false, `payload` must carry every writable field.
    async fn modify_membership(
        self,
        id: MembershipId,
        payload: MembershipPayload,
        partial: bool,
    ) -> DriverResult<MembershipView> {
        let mut tx = self.db.begin().await?;

        let current = db::get_membership(tx.ex(), id)
            .await
            .map_err(|e| map_not_found(e, "Membership"))?;
        let (student, course) =
            validate_membership(tx.ex(), payload, Some(current.membership()), partial).await?;

        db::update_membership(tx.ex(), id, student, course)
            .await
            .map_err(|e| map_write_error(e, student, course))?;
        let view = db::get_membership(tx.ex(), id).await?;
        tx.commit().await?;

        info!("Updated membership {}", id);
        Ok(view)
    }

    /// Replaces the student and course of the membership `id`.
    pub(crate) async fn update_membership(
        self,
        id: MembershipId,
        payload: MembershipPayload,
    ) -> DriverResult<MembershipView> {
        self.modify_membership(id, payload, false).await
    }

    /// Replaces the student and/or course of the membership `id` if present in `payload`.
    pub(crate) async fn patch_membership(
        self,
        id: MembershipId,
        payload: MembershipPayload,
    ) -> DriverResult<MembershipView> {
        self.modify_membership(id, payload, true).await
    }

    /// Deletes the membership `id`.
    pub(crate) async fn delete_membership(self, id: MembershipId) -> DriverResult<()> {
        let mut tx = self.db.begin().await?;
        db::delete_membership(tx.ex(), id).await.map_err(|e| map_not_found(e, "Membership"))?;
        tx.commit().await?;

        info!("Deleted membership {}", id);
        Ok(())
    }
}
