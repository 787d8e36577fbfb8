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

//! Database abstraction to persist students, courses and their memberships.

#[cfg(any(feature = "sqlite", test))]
use crate::model::iso_date;
use crate::model::{
    Course, CourseId, Membership, MembershipFilter, MembershipId, MembershipView, Student,
    StudentFields, StudentId, student_order,
};
#[cfg(feature = "postgres")]
use classbook_core::db::postgres;
#[cfg(any(feature = "sqlite", test))]
use classbook_core::db::sqlite::{self, build_timestamp, unpack_timestamp};
use classbook_core::db::{DbError, DbResult, Executor, ensure_one_row};
use sqlx::Row;
#[cfg(feature = "postgres")]
use sqlx::postgres::PgRow;
#[cfg(any(feature = "sqlite", test))]
use sqlx::sqlite::SqliteRow;
use time::{Date, OffsetDateTime};

#[cfg(test)]
mod tests;

/// Initializes the database schema.
pub async fn init_schema(ex: &mut Executor) -> DbResult<()> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => postgres::run_schema(ex, include_str!("postgres.sql")).await,

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => sqlite::run_schema(ex, include_str!("sqlite.sql")).await,

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Converts a date into the textual form stored in SQLite.
#[cfg(any(feature = "sqlite", test))]
fn date_to_text(date: Date) -> DbResult<String> {
    iso_date::format(date)
        .map_err(|e| DbError::BackendError(format!("Cannot format date {}: {}", date, e)))
}

/// Converts the textual form of a date stored in SQLite back into a date.
#[cfg(any(feature = "sqlite", test))]
fn text_to_date(text: &str) -> DbResult<Date> {
    iso_date::parse(text)
        .map_err(|e| DbError::DataIntegrityError(format!("Invalid date '{}': {}", text, e)))
}

#[cfg(feature = "postgres")]
impl TryFrom<PgRow> for Student {
    type Error = DbError;

    fn try_from(row: PgRow) -> DbResult<Self> {
        let id: i64 = row.try_get("id").map_err(postgres::map_sqlx_error)?;
        let first_name: String = row.try_get("first_name").map_err(postgres::map_sqlx_error)?;
        let last_name: String = row.try_get("last_name").map_err(postgres::map_sqlx_error)?;
        let birthday: Date = row.try_get("birthday").map_err(postgres::map_sqlx_error)?;

        Ok(Student::new(StudentId::new(id), first_name, last_name, birthday))
    }
}

#[cfg(feature = "postgres")]
impl TryFrom<PgRow> for Course {
    type Error = DbError;

    fn try_from(row: PgRow) -> DbResult<Self> {
        let id: i64 = row.try_get("id").map_err(postgres::map_sqlx_error)?;
        let name: String = row.try_get("name").map_err(postgres::map_sqlx_error)?;

        Ok(Course::new(CourseId::new(id), name))
    }
}

#[cfg(feature = "postgres")]
impl TryFrom<PgRow> for MembershipView {
    type Error = DbError;

    fn try_from(row: PgRow) -> DbResult<Self> {
        let id: i64 = row.try_get("id").map_err(postgres::map_sqlx_error)?;
        let student_id: i64 = row.try_get("student_id").map_err(postgres::map_sqlx_error)?;
        let course_id: i64 = row.try_get("course_id").map_err(postgres::map_sqlx_error)?;
        let join_date: OffsetDateTime =
            row.try_get("join_date").map_err(postgres::map_sqlx_error)?;
        let first_name: String = row.try_get("first_name").map_err(postgres::map_sqlx_error)?;
        let last_name: String = row.try_get("last_name").map_err(postgres::map_sqlx_error)?;
        let birthday: Date = row.try_get("birthday").map_err(postgres::map_sqlx_error)?;

        let membership = Membership::new(
            MembershipId::new(id),
            StudentId::new(student_id),
            CourseId::new(course_id),
            join_date,
        );
        Ok(MembershipView::new(membership, first_name, last_name, birthday))
    }
}

#[cfg(any(feature = "sqlite", test))]
impl TryFrom<SqliteRow> for Student {
    type Error = DbError;

    fn try_from(row: SqliteRow) -> DbResult<Self> {
        let id: i64 = row.try_get("id").map_err(sqlite::map_sqlx_error)?;
        let first_name: String = row.try_get("first_name").map_err(sqlite::map_sqlx_error)?;
        let last_name: String = row.try_get("last_name").map_err(sqlite::map_sqlx_error)?;
        let birthday: String = row.try_get("birthday").map_err(sqlite::map_sqlx_error)?;

        Ok(Student::new(StudentId::new(id), first_name, last_name, text_to_date(&birthday)?))
    }
}

#[cfg(any(feature = "sqlite", test))]
impl TryFrom<SqliteRow> for Course {
    type Error = DbError;

    fn try_from(row: SqliteRow) -> DbResult<Self> {
        let id: i64 = row.try_get("id").map_err(sqlite::map_sqlx_error)?;
        let name: String = row.try_get("name").map_err(sqlite::map_sqlx_error)?;

        Ok(Course::new(CourseId::new(id), name))
    }
}

#[cfg(any(feature = "sqlite", test))]
impl TryFrom<SqliteRow> for MembershipView {
    type Error = DbError;

    fn try_from(row: SqliteRow) -> DbResult<Self> {
        let id: i64 = row.try_get("id").map_err(sqlite::map_sqlx_error)?;
        let student_id: i64 = row.try_get("student_id").map_err(sqlite::map_sqlx_error)?;
        let course_id: i64 = row.try_get("course_id").map_err(sqlite::map_sqlx_error)?;
        let join_date_secs: i64 = row.try_get("join_date_secs").map_err(sqlite::map_sqlx_error)?;
        let join_date_nsecs: i64 =
            row.try_get("join_date_nsecs").map_err(sqlite::map_sqlx_error)?;
        let first_name: String = row.try_get("first_name").map_err(sqlite::map_sqlx_error)?;
        let last_name: String = row.try_get("last_name").map_err(sqlite::map_sqlx_error)?;
        let birthday: String = row.try_get("birthday").map_err(sqlite::map_sqlx_error)?;

        let membership = Membership::new(
            MembershipId::new(id),
            StudentId::new(student_id),
            CourseId::new(course_id),
            build_timestamp(join_date_secs, join_date_nsecs)?,
        );
        Ok(MembershipView::new(membership, first_name, last_name, text_to_date(&birthday)?))
    }
}

/// Creates a new student with the given `fields`.
pub(crate) async fn create_student(ex: &mut Executor, fields: StudentFields) -> DbResult<Student> {
    let id: i64 = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "
                INSERT INTO students (first_name, last_name, birthday)
                VALUES ($1, $2, $3)
                RETURNING id";
            let row = sqlx::query(query_str)
                .bind(fields.first_name().as_str())
                .bind(fields.last_name().as_str())
                .bind(*fields.birthday())
                .fetch_one(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            row.try_get("id").map_err(postgres::map_sqlx_error)?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "
                INSERT INTO students (first_name, last_name, birthday)
                VALUES (?, ?, ?)
                RETURNING id";
            let row = sqlx::query(query_str)
                .bind(fields.first_name().as_str())
                .bind(fields.last_name().as_str())
                .bind(date_to_text(*fields.birthday())?)
                .fetch_one(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            row.try_get("id").map_err(sqlite::map_sqlx_error)?
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    Ok(Student::from_fields(StudentId::new(id), fields))
}

/// Gets an existing student by its `id`.
pub(crate) async fn get_student(ex: &mut Executor, id: StudentId) -> DbResult<Student> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str =
                "SELECT id, first_name, last_name, birthday FROM students WHERE id = $1";
            let row = sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_one(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            Student::try_from(row)
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "SELECT id, first_name, last_name, birthday FROM students WHERE id = ?";
            let row = sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_one(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            Student::try_from(row)
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Gets all existing students sorted by `student_order`.
pub(crate) async fn list_students(ex: &mut Executor) -> DbResult<Vec<Student>> {
    let query_str = "SELECT id, first_name, last_name, birthday FROM students";
    let mut students = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let rows = sqlx::query(query_str)
                .fetch_all(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            rows.into_iter().map(Student::try_from).collect::<DbResult<Vec<Student>>>()?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let rows =
                sqlx::query(query_str).fetch_all(&mut **ex).await.map_err(sqlite::map_sqlx_error)?;
            rows.into_iter().map(Student::try_from).collect::<DbResult<Vec<Student>>>()?
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    students.sort_by(student_order);
    Ok(students)
}

/// Replaces all writable fields of the existing student `id` with `fields`.
pub(crate) async fn update_student(
    ex: &mut Executor,
    id: StudentId,
    fields: StudentFields,
) -> DbResult<Student> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "
                UPDATE students SET first_name = $1, last_name = $2, birthday = $3
                WHERE id = $4";
            let done = sqlx::query(query_str)
                .bind(fields.first_name().as_str())
                .bind(fields.last_name().as_str())
                .bind(*fields.birthday())
                .bind(id.as_i64())
                .execute(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            done.rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "
                UPDATE students SET first_name = ?, last_name = ?, birthday = ?
                WHERE id = ?";
            let done = sqlx::query(query_str)
                .bind(fields.first_name().as_str())
                .bind(fields.last_name().as_str())
                .bind(date_to_text(*fields.birthday())?)
                .bind(id.as_i64())
                .execute(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    ensure_one_row(rows_affected)?;
    Ok(Student::from_fields(id, fields))
}

/// Deletes the existing student `id` and, through the foreign keys, all of its memberships.
pub(crate) async fn delete_student(ex: &mut Executor, id: StudentId) -> DbResult<()> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let done = sqlx::query("DELETE FROM students WHERE id = $1")
                .bind(id.as_i64())
                .execute(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            done.rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let done = sqlx::query("DELETE FROM students WHERE id = ?")
                .bind(id.as_i64())
                .execute(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    ensure_one_row(rows_affected)
}

/// Creates a new course called `name`.
pub(crate) async fn create_course(ex: &mut Executor, name: String) -> DbResult<Course> {
    let id: i64 = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let row = sqlx::query("INSERT INTO courses (name) VALUES ($1) RETURNING id")
                .bind(name.as_str())
                .fetch_one(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            row.try_get("id").map_err(postgres::map_sqlx_error)?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let row = sqlx::query("INSERT INTO courses (name) VALUES (?) RETURNING id")
                .bind(name.as_str())
                .fetch_one(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            row.try_get("id").map_err(sqlite::map_sqlx_error)?
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    Ok(Course::new(CourseId::new(id), name))
}

/// Gets an existing course by its `id`.
pub(crate) async fn get_course(ex: &mut Executor, id: CourseId) -> DbResult<Course> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let row = sqlx::query("SELECT id, name FROM courses WHERE id = $1")
                .bind(id.as_i64())
                .fetch_one(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            Course::try_from(row)
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let row = sqlx::query("SELECT id, name FROM courses WHERE id = ?")
                .bind(id.as_i64())
                .fetch_one(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            Course::try_from(row)
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Gets all existing courses ordered by identifier.
pub(crate) async fn list_courses(ex: &mut Executor) -> DbResult<Vec<Course>> {
    let query_str = "SELECT id, name FROM courses ORDER BY id";
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let rows = sqlx::query(query_str)
                .fetch_all(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            rows.into_iter().map(Course::try_from).collect()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let rows =
                sqlx::query(query_str).fetch_all(&mut **ex).await.map_err(sqlite::map_sqlx_error)?;
            rows.into_iter().map(Course::try_from).collect()
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Renames the existing course `id` to `name`.
pub(crate) async fn update_course(
    ex: &mut Executor,
    id: CourseId,
    name: String,
) -> DbResult<Course> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let done = sqlx::query("UPDATE courses SET name = $1 WHERE id = $2")
                .bind(name.as_str())
                .bind(id.as_i64())
                .execute(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            done.rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let done = sqlx::query("UPDATE courses SET name = ? WHERE id = ?")
                .bind(name.as_str())
                .bind(id.as_i64())
                .execute(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    ensure_one_row(rows_affected)?;
    Ok(Course::new(id, name))
}

/// Deletes the existing course `id` and, through the foreign keys, all of its memberships.
pub(crate) async fn delete_course(ex: &mut Executor, id: CourseId) -> DbResult<()> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let done = sqlx::query("DELETE FROM courses WHERE id = $1")
                .bind(id.as_i64())
                .execute(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            done.rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let done = sqlx::query("DELETE FROM courses WHERE id = ?")
                .bind(id.as_i64())
                .execute(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    ensure_one_row(rows_affected)
}

/// Enrolls `student` in `course` as of `join_date`.
///
/// Fails with `DbError::AlreadyExists` if the pair is already enrolled and with
/// `DbError::NotFound` if either reference does not exist.
pub(crate) async fn create_membership(
    ex: &mut Executor,
    student: StudentId,
    course: CourseId,
    join_date: OffsetDateTime,
) -> DbResult<Membership> {
    let id: i64 = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "
                INSERT INTO memberships (student_id, course_id, join_date)
                VALUES ($1, $2, $3)
                RETURNING id";
            let row = sqlx::query(query_str)
                .bind(student.as_i64())
                .bind(course.as_i64())
                .bind(join_date)
                .fetch_one(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            row.try_get("id").map_err(postgres::map_sqlx_error)?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let (join_date_secs, join_date_nsecs) = unpack_timestamp(join_date)?;

            let query_str = "
                INSERT INTO memberships (student_id, course_id, join_date_secs, join_date_nsecs)
                VALUES (?, ?, ?, ?)
                RETURNING id";
            let row = sqlx::query(query_str)
                .bind(student.as_i64())
                .bind(course.as_i64())
                .bind(join_date_secs)
                .bind(join_date_nsecs)
                .fetch_one(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            row.try_get("id").map_err(sqlite::map_sqlx_error)?
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    Ok(Membership::new(MembershipId::new(id), student, course, join_date))
}

/// Columns and joins shared by all queries that return a `MembershipView` from PostgreSQL.
#[cfg(feature = "postgres")]
const PG_SELECT_MEMBERSHIP_VIEW: &str = "
    SELECT
        m.id, m.student_id, m.course_id, m.join_date,
        s.first_name, s.last_name, s.birthday
    FROM memberships m JOIN students s ON m.student_id = s.id";

/// Columns and joins shared by all queries that return a `MembershipView` from SQLite.
#[cfg(any(feature = "sqlite", test))]
const SQLITE_SELECT_MEMBERSHIP_VIEW: &str = "
    SELECT
        m.id, m.student_id, m.course_id, m.join_date_secs, m.join_date_nsecs,
        s.first_name, s.last_name, s.birthday
    FROM memberships m JOIN students s ON m.student_id = s.id";

/// Gets an existing membership by its `id`, together with its student snapshot.
pub(crate) async fn get_membership(
    ex: &mut Executor,
    id: MembershipId,
) -> DbResult<MembershipView> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = format!("{} WHERE m.id = $1", PG_SELECT_MEMBERSHIP_VIEW);
            let row = sqlx::query(&query_str)
                .bind(id.as_i64())
                .fetch_one(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            MembershipView::try_from(row)
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = format!("{} WHERE m.id = ?", SQLITE_SELECT_MEMBERSHIP_VIEW);
            let row = sqlx::query(&query_str)
                .bind(id.as_i64())
                .fetch_one(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            MembershipView::try_from(row)
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Gets all memberships that match `filter`, ordered by identifier.
pub(crate) async fn list_memberships(
    ex: &mut Executor,
    filter: MembershipFilter,
) -> DbResult<Vec<MembershipView>> {
    let student = filter.student.map(StudentId::as_i64);
    let course = filter.course.map(CourseId::as_i64);

    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = format!(
                "{}
                WHERE
                    ($1::BIGINT IS NULL OR m.student_id = $1) AND
                    ($2::BIGINT IS NULL OR m.course_id = $2)
                ORDER BY m.id",
                PG_SELECT_MEMBERSHIP_VIEW
            );
            let rows = sqlx::query(&query_str)
                .bind(student)
                .bind(course)
                .fetch_all(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            rows.into_iter().map(MembershipView::try_from).collect()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = format!(
                "{}
                WHERE
                    (? IS NULL OR m.student_id = ?) AND
                    (? IS NULL OR m.course_id = ?)
                ORDER BY m.id",
                SQLITE_SELECT_MEMBERSHIP_VIEW
            );
            let rows = sqlx::query(&query_str)
                .bind(student)
                .bind(student)
                .bind(course)
                .bind(course)
                .fetch_all(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            rows.into_iter().map(MembershipView::try_from).collect()
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Gets all memberships of `course` together with their student snapshots, in no particular
/// order.
pub(crate) async fn list_course_memberships(
    ex: &mut Executor,
    course: CourseId,
) -> DbResult<Vec<MembershipView>> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = format!("{} WHERE m.course_id = $1", PG_SELECT_MEMBERSHIP_VIEW);
            let rows = sqlx::query(&query_str)
                .bind(course.as_i64())
                .fetch_all(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            rows.into_iter().map(MembershipView::try_from).collect()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = format!("{} WHERE m.course_id = ?", SQLITE_SELECT_MEMBERSHIP_VIEW);
            let rows = sqlx::query(&query_str)
                .bind(course.as_i64())
                .fetch_all(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            rows.into_iter().map(MembershipView::try_from).collect()
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Gets the identifier of the membership that enrolls `student` in `course`, if any.
pub(crate) async fn find_membership(
    ex: &mut Executor,
    student: StudentId,
    course: CourseId,
) -> DbResult<Option<MembershipId>> {
    let id: Option<i64> = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "SELECT id FROM memberships WHERE student_id = $1 AND course_id = $2";
            let row = sqlx::query(query_str)
                .bind(student.as_i64())
                .bind(course.as_i64())
                .fetch_optional(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            match row {
                Some(row) => Some(row.try_get("id").map_err(postgres::map_sqlx_error)?),
                None => None,
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "SELECT id FROM memberships WHERE student_id = ? AND course_id = ?";
            let row = sqlx::query(query_str)
                .bind(student.as_i64())
                .bind(course.as_i64())
                .fetch_optional(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            match row {
                Some(row) => Some(row.try_get("id").map_err(sqlite::map_sqlx_error)?),
                None => None,
            }
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    Ok(id.map(MembershipId::new))
}

/// Re-points the existing membership `id` to `student` and `course`.  The join date is kept.
///
/// Fails with `DbError::AlreadyExists` if another membership already enrolls the pair.
pub(crate) async fn update_membership(
    ex: &mut Executor,
    id: MembershipId,
    student: StudentId,
    course: CourseId,
) -> DbResult<Membership> {
    let join_date: OffsetDateTime = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "
                UPDATE memberships SET student_id = $1, course_id = $2
                WHERE id = $3
                RETURNING join_date";
            let row = sqlx::query(query_str)
                .bind(student.as_i64())
                .bind(course.as_i64())
                .bind(id.as_i64())
                .fetch_optional(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?
                .ok_or(DbError::NotFound)?;
            row.try_get("join_date").map_err(postgres::map_sqlx_error)?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "
                UPDATE memberships SET student_id = ?, course_id = ?
                WHERE id = ?
                RETURNING join_date_secs, join_date_nsecs";
            let row = sqlx::query(query_str)
                .bind(student.as_i64())
                .bind(course.as_i64())
                .bind(id.as_i64())
                .fetch_optional(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?
                .ok_or(DbError::NotFound)?;
            let join_date_secs: i64 =
                row.try_get("join_date_secs").map_err(sqlite::map_sqlx_error)?;
            let join_date_nsecs: i64 =
                row.try_get("join_date_nsecs").map_err(sqlite::map_sqlx_error)?;
            build_timestamp(join_date_secs, join_date_nsecs)?
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    Ok(Membership::new(id, student, course, join_date))
}

/// Deletes the existing membership `id`.
pub(crate) async fn delete_membership(ex: &mut Executor, id: MembershipId) -> DbResult<()> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let done = sqlx::query("DELETE FROM memberships WHERE id = $1")
                .bind(id.as_i64())
                .execute(&mut **ex)
                .await
                .map_err(postgres::map_sqlx_error)?;
            done.rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let done = sqlx::query("DELETE FROM memberships WHERE id = ?")
                .bind(id.as_i64())
                .execute(&mut **ex)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    ensure_one_row(rows_affected)
}
