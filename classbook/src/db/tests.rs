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

//! Common tests for any database implementation.

use crate::db::*;
use classbook_core::db::Db;
use std::sync::Arc;
use time::OffsetDateTime;
use time::macros::{date, datetime};

/// Initializes the schema of `db` and returns a direct executor against it.
async fn setup_schema(db: &(dyn Db + Send + Sync)) -> Executor {
    let mut ex = db.ex().await.unwrap();
    init_schema(&mut ex).await.unwrap();
    ex
}

/// Releases the executor `ex` and closes `db`.
async fn teardown(ex: Executor, db: Arc<dyn Db + Send + Sync>) {
    drop(ex);
    db.close().await;
}

/// Syntactic sugar to create a student with a fixed birthday.
async fn create_simple_student(ex: &mut Executor, first_name: &str, last_name: &str) -> Student {
    let fields = StudentFields::new(first_name.to_owned(), last_name.to_owned(), date!(2001 - 02 - 03));
    create_student(ex, fields).await.unwrap()
}

/// Syntactic sugar to enroll a student in a course at the given second since the epoch.
async fn enroll(ex: &mut Executor, student: &Student, course: &Course, secs: i64) -> Membership {
    let join_date = OffsetDateTime::from_unix_timestamp(secs).unwrap();
    create_membership(ex, *student.id(), *course.id(), join_date).await.unwrap()
}

async fn test_init_schema_is_idempotent(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;
    create_simple_student(&mut ex, "a", "b").await;
    init_schema(&mut ex).await.unwrap();
    assert_eq!(1, list_students(&mut ex).await.unwrap().len());

    teardown(ex, db).await;
}

async fn test_students_crud(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let fields = StudentFields::new("Ada".to_owned(), "Lovelace".to_owned(), date!(1815 - 12 - 10));
    let student = create_student(&mut ex, fields.clone()).await.unwrap();
    assert_eq!(Student::from_fields(*student.id(), fields), student);
    assert_eq!(student, get_student(&mut ex, *student.id()).await.unwrap());

    let fields = StudentFields::new("Ada".to_owned(), "King".to_owned(), date!(1815 - 12 - 10));
    let updated = update_student(&mut ex, *student.id(), fields).await.unwrap();
    assert_eq!("King", updated.last_name());
    assert_eq!(updated, get_student(&mut ex, *student.id()).await.unwrap());

    delete_student(&mut ex, *student.id()).await.unwrap();
    assert_eq!(DbError::NotFound, get_student(&mut ex, *student.id()).await.unwrap_err());

    teardown(ex, db).await;
}

async fn test_students_not_found(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let id = StudentId::new(123);
    assert_eq!(DbError::NotFound, get_student(&mut ex, id).await.unwrap_err());
    let fields = StudentFields::new("a".to_owned(), "b".to_owned(), date!(2000 - 01 - 01));
    assert_eq!(DbError::NotFound, update_student(&mut ex, id, fields).await.unwrap_err());
    assert_eq!(DbError::NotFound, delete_student(&mut ex, id).await.unwrap_err());

    teardown(ex, db).await;
}

async fn test_list_students_sorted_by_name(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let s1 = create_simple_student(&mut ex, "zzz", "zzz").await;
    let s2 = create_simple_student(&mut ex, "aaa", "zzz").await;
    let s3 = create_simple_student(&mut ex, "aaa", "aaa").await;
    let s4 = create_simple_student(&mut ex, "zzz", "aaa").await;

    let students = list_students(&mut ex).await.unwrap();
    assert_eq!(vec![s3, s4, s2, s1], students);

    teardown(ex, db).await;
}

async fn test_courses_crud(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let course1 = create_course(&mut ex, "Algebra".to_owned()).await.unwrap();
    let course2 = create_course(&mut ex, "Biology".to_owned()).await.unwrap();
    assert_ne!(course1.id(), course2.id());
    assert_eq!(course1, get_course(&mut ex, *course1.id()).await.unwrap());
    assert_eq!(vec![course1.clone(), course2.clone()], list_courses(&mut ex).await.unwrap());

    let renamed = update_course(&mut ex, *course1.id(), "Geometry".to_owned()).await.unwrap();
    assert_eq!("Geometry", renamed.name());
    assert_eq!(renamed, get_course(&mut ex, *course1.id()).await.unwrap());

    delete_course(&mut ex, *course2.id()).await.unwrap();
    assert_eq!(vec![renamed], list_courses(&mut ex).await.unwrap());
    assert_eq!(DbError::NotFound, delete_course(&mut ex, *course2.id()).await.unwrap_err());

    teardown(ex, db).await;
}

async fn test_membership_create_and_get(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let student = create_simple_student(&mut ex, "Ada", "Lovelace").await;
    let course = create_course(&mut ex, "Math".to_owned()).await.unwrap();

    let join_date = datetime!(2023-05-01 10:20:30.123456 UTC);
    let membership =
        create_membership(&mut ex, *student.id(), *course.id(), join_date).await.unwrap();
    assert_eq!(join_date, *membership.join_date());

    let view = get_membership(&mut ex, *membership.id()).await.unwrap();
    assert_eq!(&membership, view.membership());
    assert_eq!("Ada", view.student_first_name());
    assert_eq!("Lovelace", view.student_last_name());
    assert_eq!(student.birthday(), view.student_birthday());

    assert_eq!(
        Some(*membership.id()),
        find_membership(&mut ex, *student.id(), *course.id()).await.unwrap()
    );

    teardown(ex, db).await;
}

async fn test_membership_duplicate_pair(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let student = create_simple_student(&mut ex, "a", "b").await;
    let course = create_course(&mut ex, "c".to_owned()).await.unwrap();
    enroll(&mut ex, &student, &course, 1000).await;

    let join_date = OffsetDateTime::from_unix_timestamp(2000).unwrap();
    assert_eq!(
        DbError::AlreadyExists,
        create_membership(&mut ex, *student.id(), *course.id(), join_date).await.unwrap_err()
    );
    assert_eq!(1, list_memberships(&mut ex, MembershipFilter::default()).await.unwrap().len());

    teardown(ex, db).await;
}

async fn test_membership_unknown_references(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let student = create_simple_student(&mut ex, "a", "b").await;
    let join_date = OffsetDateTime::from_unix_timestamp(1000).unwrap();
    assert_eq!(
        DbError::NotFound,
        create_membership(&mut ex, *student.id(), CourseId::new(55), join_date)
            .await
            .unwrap_err()
    );

    teardown(ex, db).await;
}

async fn test_membership_update_keeps_join_date(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let student1 = create_simple_student(&mut ex, "a", "b").await;
    let student2 = create_simple_student(&mut ex, "c", "d").await;
    let course = create_course(&mut ex, "e".to_owned()).await.unwrap();
    let membership = enroll(&mut ex, &student1, &course, 1000).await;

    let updated =
        update_membership(&mut ex, *membership.id(), *student2.id(), *course.id()).await.unwrap();
    assert_eq!(student2.id(), updated.student());
    assert_eq!(membership.join_date(), updated.join_date());
    assert_eq!(updated, *get_membership(&mut ex, *membership.id()).await.unwrap().membership());

    assert_eq!(
        DbError::NotFound,
        update_membership(&mut ex, MembershipId::new(999), *student2.id(), *course.id())
            .await
            .unwrap_err()
    );

    teardown(ex, db).await;
}

async fn test_membership_update_to_existing_pair(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let student1 = create_simple_student(&mut ex, "a", "b").await;
    let student2 = create_simple_student(&mut ex, "c", "d").await;
    let course = create_course(&mut ex, "e".to_owned()).await.unwrap();
    enroll(&mut ex, &student1, &course, 1000).await;
    let membership = enroll(&mut ex, &student2, &course, 1001).await;

    assert_eq!(
        DbError::AlreadyExists,
        update_membership(&mut ex, *membership.id(), *student1.id(), *course.id())
            .await
            .unwrap_err()
    );

    teardown(ex, db).await;
}

async fn test_list_memberships_filter(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let student1 = create_simple_student(&mut ex, "a", "b").await;
    let student2 = create_simple_student(&mut ex, "c", "d").await;
    let course1 = create_course(&mut ex, "e".to_owned()).await.unwrap();
    let course2 = create_course(&mut ex, "f".to_owned()).await.unwrap();
    let m11 = enroll(&mut ex, &student1, &course1, 1000).await;
    let m21 = enroll(&mut ex, &student2, &course1, 1001).await;
    let m12 = enroll(&mut ex, &student1, &course2, 1002).await;

    /// Runs a listing with the given filter and returns the identifiers of the results.
    async fn ids(ex: &mut Executor, filter: MembershipFilter) -> Vec<MembershipId> {
        let views = list_memberships(ex, filter).await.unwrap();
        views.iter().map(|v| *v.membership().id()).collect()
    }

    let all = MembershipFilter::default();
    assert_eq!(vec![*m11.id(), *m21.id(), *m12.id()], ids(&mut ex, all).await);

    let by_student = MembershipFilter { student: Some(*student1.id()), course: None };
    assert_eq!(vec![*m11.id(), *m12.id()], ids(&mut ex, by_student).await);

    let by_course = MembershipFilter { student: None, course: Some(*course1.id()) };
    assert_eq!(vec![*m11.id(), *m21.id()], ids(&mut ex, by_course).await);

    let by_both = MembershipFilter { student: Some(*student2.id()), course: Some(*course2.id()) };
    assert!(ids(&mut ex, by_both).await.is_empty());

    teardown(ex, db).await;
}

async fn test_list_course_memberships(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let student1 = create_simple_student(&mut ex, "a", "b").await;
    let student2 = create_simple_student(&mut ex, "c", "d").await;
    let course1 = create_course(&mut ex, "e".to_owned()).await.unwrap();
    let course2 = create_course(&mut ex, "f".to_owned()).await.unwrap();
    enroll(&mut ex, &student1, &course1, 1000).await;
    enroll(&mut ex, &student2, &course2, 1001).await;
    enroll(&mut ex, &student2, &course1, 1002).await;

    let mut names = list_course_memberships(&mut ex, *course1.id())
        .await
        .unwrap()
        .iter()
        .map(|v| v.student_first_name().clone())
        .collect::<Vec<String>>();
    names.sort();
    assert_eq!(vec!["a", "c"], names);

    assert!(list_course_memberships(&mut ex, CourseId::new(999)).await.unwrap().is_empty());

    teardown(ex, db).await;
}

async fn test_delete_student_cascades(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let student1 = create_simple_student(&mut ex, "a", "b").await;
    let student2 = create_simple_student(&mut ex, "c", "d").await;
    let course = create_course(&mut ex, "e".to_owned()).await.unwrap();
    let m1 = enroll(&mut ex, &student1, &course, 1000).await;
    let m2 = enroll(&mut ex, &student2, &course, 1001).await;

    delete_student(&mut ex, *student1.id()).await.unwrap();

    assert_eq!(DbError::NotFound, get_membership(&mut ex, *m1.id()).await.unwrap_err());
    let remaining = list_course_memberships(&mut ex, *course.id()).await.unwrap();
    assert_eq!(1, remaining.len());
    assert_eq!(&m2, remaining[0].membership());

    teardown(ex, db).await;
}

async fn test_delete_course_cascades(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let student = create_simple_student(&mut ex, "a", "b").await;
    let course1 = create_course(&mut ex, "c".to_owned()).await.unwrap();
    let course2 = create_course(&mut ex, "d".to_owned()).await.unwrap();
    enroll(&mut ex, &student, &course1, 1000).await;
    let m2 = enroll(&mut ex, &student, &course2, 1001).await;

    delete_course(&mut ex, *course1.id()).await.unwrap();

    let remaining = list_memberships(&mut ex, MembershipFilter::default()).await.unwrap();
    assert_eq!(1, remaining.len());
    assert_eq!(&m2, remaining[0].membership());
    assert_eq!(student, get_student(&mut ex, *student.id()).await.unwrap());

    teardown(ex, db).await;
}

async fn test_delete_membership(db: Arc<dyn Db + Send + Sync>) {
    let mut ex = setup_schema(db.as_ref()).await;

    let student = create_simple_student(&mut ex, "a", "b").await;
    let course = create_course(&mut ex, "c".to_owned()).await.unwrap();
    let membership = enroll(&mut ex, &student, &course, 1000).await;

    delete_membership(&mut ex, *membership.id()).await.unwrap();
    assert_eq!(DbError::NotFound, get_membership(&mut ex, *membership.id()).await.unwrap_err());
    assert_eq!(None, find_membership(&mut ex, *student.id(), *course.id()).await.unwrap());
    assert_eq!(DbError::NotFound, delete_membership(&mut ex, *membership.id()).await.unwrap_err());

    teardown(ex, db).await;
}

async fn test_tx_rollback_discards_writes(db: Arc<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;

    {
        let mut tx = db.begin().await.unwrap();
        create_simple_student(tx.ex(), "a", "b").await;
    }

    assert!(list_students(&mut db.ex().await.unwrap()).await.unwrap().is_empty());

    db.close().await;
}

macro_rules! generate_db_tests [
    ( $setup:expr $(, #[$extra:meta] )? ) => {
        classbook_core::db::testutils::generate_tests!(
            $( #[$extra], )?
            $setup,
            $crate::db::tests,
            test_init_schema_is_idempotent,
            test_students_crud,
            test_students_not_found,
            test_list_students_sorted_by_name,
            test_courses_crud,
            test_membership_create_and_get,
            test_membership_duplicate_pair,
            test_membership_unknown_references,
            test_membership_update_keeps_join_date,
            test_membership_update_to_existing_pair,
            test_list_memberships_filter,
            test_list_course_memberships,
            test_delete_student_cascades,
            test_delete_course_cascades,
            test_delete_membership,
            test_tx_rollback_discards_writes
        );
    }
];

#[cfg(feature = "postgres")]
mod postgres {
    use super::*;
    use classbook_core::db::postgres::testutils::setup;

    generate_db_tests!(
        Arc::new(setup().await),
        #[ignore = "Requires environment configuration and is expensive"]
    );
}

mod sqlite {
    use super::*;
    use classbook_core::db::sqlite::testutils::setup;

    generate_db_tests!(Arc::new(setup().await));
}
