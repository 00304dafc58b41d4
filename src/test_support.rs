use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::types::Json;
use time::{Duration, PrimitiveDateTime};
use uuid::Uuid;

use crate::api;
use crate::core::{config::Settings, security, state::AppState, time::primitive_now_utc};
use crate::db::models::{
    Assignment, Course, Enrollment, Grade, Notification, Submission, TokenTransaction, User,
};
use crate::db::types::{AssignmentStatus, EnrollmentStatus, SubmissionStatus, UserRole};
use crate::repositories::assignments::CreateAssignment;
use crate::repositories::courses::CreateCourse;
use crate::repositories::grades::{GradeWrite, RecordedGrade};
use crate::repositories::notifications::CreateNotification;
use crate::repositories::submissions::{DraftSubmission, TransitionStamp};
use crate::repositories::token_transactions::CreateTokenTransaction;
use crate::repositories::users::{CreateUser, UpdateUser};
use crate::repositories::{Store, StoreError};
use crate::services::mailer::{MailError, Mailer, OutgoingEmail};

// Never verified: seeded users that need to log in use `seed_user_with_password`.
const PLACEHOLDER_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$placeholder$placeholder";

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    courses: Vec<Course>,
    enrollments: Vec<Enrollment>,
    assignments: Vec<Assignment>,
    submissions: Vec<Submission>,
    grades: Vec<Grade>,
    notifications: Vec<Notification>,
    tokens: Vec<TokenTransaction>,
    fail_notification_inserts: bool,
    fail_token_inserts: bool,
}

/// `Store` over plain vectors, mirroring the conditional-write semantics of
/// the SQL repositories.
#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store lock")
    }

    pub(crate) fn fail_notification_inserts(&self, fail: bool) {
        self.tables().fail_notification_inserts = fail;
    }

    pub(crate) fn fail_token_inserts(&self, fail: bool) {
        self.tables().fail_token_inserts = fail;
    }

    pub(crate) fn notifications_for(&self, user_id: &str) -> Vec<Notification> {
        self.tables().notifications.iter().filter(|n| n.user_id == user_id).cloned().collect()
    }

    pub(crate) fn notification_count(&self) -> usize {
        self.tables().notifications.len()
    }

    pub(crate) fn submissions(&self) -> Vec<Submission> {
        self.tables().submissions.clone()
    }

    pub(crate) fn grades(&self) -> Vec<Grade> {
        self.tables().grades.clone()
    }

    pub(crate) fn token_transactions_for(&self, user_id: &str) -> Vec<TokenTransaction> {
        self.tables().tokens.iter().filter(|t| t.user_id == user_id).cloned().collect()
    }

    pub(crate) fn set_assignment_status(&self, id: &str, status: AssignmentStatus) {
        if let Some(assignment) = self.tables().assignments.iter_mut().find(|a| a.id == id) {
            assignment.status = status;
        }
    }

    pub(crate) fn set_late_penalty_rate(&self, id: &str, rate: f64) {
        if let Some(assignment) = self.tables().assignments.iter_mut().find(|a| a.id == id) {
            assignment.late_penalty_rate = rate;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_users(&self, ids: &[String]) -> Result<Vec<User>, StoreError> {
        Ok(self.tables().users.iter().filter(|u| ids.contains(&u.id)).cloned().collect())
    }

    async fn list_active_users(&self, role: Option<UserRole>) -> Result<Vec<User>, StoreError> {
        Ok(self
            .tables()
            .users
            .iter()
            .filter(|u| u.is_active && role.map_or(true, |role| u.role == role))
            .cloned()
            .collect())
    }

    async fn create_user(&self, params: CreateUser) -> Result<User, StoreError> {
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.email.eq_ignore_ascii_case(&params.email)) {
            return Err(StoreError::Unavailable("duplicate key users_email_key".to_string()));
        }
        let user = User {
            id: params.id,
            email: params.email,
            hashed_password: params.hashed_password,
            full_name: params.full_name,
            role: params.role,
            is_active: params.is_active,
            created_at: params.created_at,
            updated_at: params.created_at,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: &str, params: UpdateUser) -> Result<(), StoreError> {
        if let Some(user) = self.tables().users.iter_mut().find(|u| u.id == id) {
            if let Some(hashed_password) = params.hashed_password {
                user.hashed_password = hashed_password;
            }
            if let Some(role) = params.role {
                user.role = role;
            }
            if let Some(is_active) = params.is_active {
                user.is_active = is_active;
            }
            user.updated_at = params.updated_at;
        }
        Ok(())
    }

    async fn create_course(&self, params: CreateCourse) -> Result<Course, StoreError> {
        let mut tables = self.tables();
        if tables.courses.iter().any(|c| c.code == params.code) {
            return Err(StoreError::Unavailable("duplicate key courses_code_key".to_string()));
        }
        let course = Course {
            id: params.id,
            code: params.code,
            title: params.title,
            description: params.description,
            teacher_id: params.teacher_id,
            is_active: true,
            created_at: params.created_at,
            updated_at: params.created_at,
        };
        tables.courses.push(course.clone());
        Ok(course)
    }

    async fn find_course(&self, id: &str) -> Result<Option<Course>, StoreError> {
        Ok(self.tables().courses.iter().find(|c| c.id == id).cloned())
    }

    async fn find_course_by_code(&self, code: &str) -> Result<Option<Course>, StoreError> {
        Ok(self.tables().courses.iter().find(|c| c.code == code).cloned())
    }

    async fn upsert_enrollment(
        &self,
        course_id: &str,
        student_id: &str,
        status: EnrollmentStatus,
        now: PrimitiveDateTime,
    ) -> Result<Enrollment, StoreError> {
        let mut tables = self.tables();
        if let Some(existing) = tables
            .enrollments
            .iter_mut()
            .find(|e| e.course_id == course_id && e.student_id == student_id)
        {
            existing.status = status;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let enrollment = Enrollment {
            id: Uuid::new_v4().to_string(),
            course_id: course_id.to_string(),
            student_id: student_id.to_string(),
            status,
            enrolled_at: now,
            updated_at: now,
        };
        tables.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn find_enrollment(
        &self,
        course_id: &str,
        student_id: &str,
    ) -> Result<Option<Enrollment>, StoreError> {
        Ok(self
            .tables()
            .enrollments
            .iter()
            .find(|e| e.course_id == course_id && e.student_id == student_id)
            .cloned())
    }

    async fn list_active_students(&self, course_id: &str) -> Result<Vec<User>, StoreError> {
        let tables = self.tables();
        Ok(tables
            .enrollments
            .iter()
            .filter(|e| e.course_id == course_id && e.status == EnrollmentStatus::Active)
            .filter_map(|e| tables.users.iter().find(|u| u.id == e.student_id && u.is_active))
            .cloned()
            .collect())
    }

    async fn create_assignment(&self, params: CreateAssignment) -> Result<Assignment, StoreError> {
        let assignment = Assignment {
            id: params.id,
            course_id: params.course_id,
            title: params.title,
            description: params.description,
            due_date: params.due_date,
            max_points: params.max_points,
            allow_late_submission: params.allow_late_submission,
            late_penalty_rate: params.late_penalty_rate,
            status: AssignmentStatus::Draft,
            created_by: params.created_by,
            published_at: None,
            created_at: params.created_at,
            updated_at: params.created_at,
        };
        self.tables().assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn find_assignment(&self, id: &str) -> Result<Option<Assignment>, StoreError> {
        Ok(self.tables().assignments.iter().find(|a| a.id == id).cloned())
    }

    async fn list_assignments(
        &self,
        course_id: &str,
        statuses: &[AssignmentStatus],
    ) -> Result<Vec<Assignment>, StoreError> {
        let mut assignments: Vec<Assignment> = self
            .tables()
            .assignments
            .iter()
            .filter(|a| a.course_id == course_id && statuses.contains(&a.status))
            .cloned()
            .collect();
        assignments.sort_by_key(|a| (a.due_date, a.created_at));
        Ok(assignments)
    }

    async fn transition_assignment(
        &self,
        id: &str,
        from: AssignmentStatus,
        to: AssignmentStatus,
        now: PrimitiveDateTime,
    ) -> Result<Option<Assignment>, StoreError> {
        let mut tables = self.tables();
        let Some(assignment) = tables.assignments.iter_mut().find(|a| a.id == id && a.status == from)
        else {
            return Ok(None);
        };
        assignment.status = to;
        if to == AssignmentStatus::Published {
            assignment.published_at = Some(now);
        }
        assignment.updated_at = now;
        Ok(Some(assignment.clone()))
    }

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
        Ok(self.tables().submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn find_submission_for(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        Ok(self
            .tables()
            .submissions
            .iter()
            .find(|s| s.assignment_id == assignment_id && s.student_id == student_id)
            .cloned())
    }

    async fn list_submissions(&self, assignment_id: &str) -> Result<Vec<Submission>, StoreError> {
        Ok(self
            .tables()
            .submissions
            .iter()
            .filter(|s| s.assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn upsert_draft(
        &self,
        params: DraftSubmission,
    ) -> Result<Option<Submission>, StoreError> {
        let mut tables = self.tables();
        if let Some(existing) = tables
            .submissions
            .iter_mut()
            .find(|s| s.assignment_id == params.assignment_id && s.student_id == params.student_id)
        {
            if existing.status != SubmissionStatus::Draft {
                return Ok(None);
            }
            existing.content = params.content;
            existing.attachments = Json(params.attachments);
            existing.is_late = params.is_late;
            existing.updated_at = params.now;
            return Ok(Some(existing.clone()));
        }

        let submission = Submission {
            id: params.id,
            assignment_id: params.assignment_id,
            student_id: params.student_id,
            content: params.content,
            attachments: Json(params.attachments),
            is_late: params.is_late,
            status: SubmissionStatus::Draft,
            submitted_at: None,
            created_at: params.now,
            updated_at: params.now,
        };
        tables.submissions.push(submission.clone());
        Ok(Some(submission))
    }

    async fn transition_submission(
        &self,
        id: &str,
        from: SubmissionStatus,
        to: SubmissionStatus,
        stamp: TransitionStamp,
        now: PrimitiveDateTime,
    ) -> Result<Option<Submission>, StoreError> {
        let mut tables = self.tables();
        let Some(submission) =
            tables.submissions.iter_mut().find(|s| s.id == id && s.status == from)
        else {
            return Ok(None);
        };
        submission.status = to;
        if let Some(submitted_at) = stamp.submitted_at {
            submission.submitted_at = Some(submitted_at);
        }
        if let Some(is_late) = stamp.is_late {
            submission.is_late = is_late;
        }
        submission.updated_at = now;
        Ok(Some(submission.clone()))
    }

    async fn find_grade(&self, submission_id: &str) -> Result<Option<Grade>, StoreError> {
        Ok(self.tables().grades.iter().find(|g| g.submission_id == submission_id).cloned())
    }

    async fn record_grade(&self, params: GradeWrite) -> Result<Option<RecordedGrade>, StoreError> {
        let mut tables = self.tables();
        let gradable = tables.submissions.iter().any(|s| {
            s.id == params.submission_id
                && matches!(s.status, SubmissionStatus::Submitted | SubmissionStatus::Graded)
        });
        if !gradable {
            return Ok(None);
        }

        let (grade, created) =
            match tables.grades.iter_mut().find(|g| g.submission_id == params.submission_id) {
                Some(existing) => {
                    existing.value = params.value;
                    existing.adjusted_value = params.adjusted_value;
                    existing.comment = params.comment;
                    existing.grader_id = params.grader_id;
                    existing.graded_at = params.now;
                    existing.updated_at = params.now;
                    (existing.clone(), false)
                }
                None => {
                    let grade = Grade {
                        id: Uuid::new_v4().to_string(),
                        submission_id: params.submission_id.clone(),
                        value: params.value,
                        adjusted_value: params.adjusted_value,
                        comment: params.comment,
                        grader_id: params.grader_id,
                        graded_at: params.now,
                        created_at: params.now,
                        updated_at: params.now,
                    };
                    tables.grades.push(grade.clone());
                    (grade, true)
                }
            };

        let submission = tables
            .submissions
            .iter_mut()
            .find(|s| s.id == params.submission_id)
            .map(|s| {
                s.status = SubmissionStatus::Graded;
                s.updated_at = params.now;
                s.clone()
            })
            .ok_or_else(|| StoreError::Unavailable("submission vanished".to_string()))?;

        Ok(Some(RecordedGrade { grade, submission, created }))
    }

    async fn insert_notifications(
        &self,
        rows: Vec<CreateNotification>,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut tables = self.tables();
        if tables.fail_notification_inserts {
            return Err(StoreError::Unavailable("notifications insert failed".to_string()));
        }
        let inserted: Vec<Notification> = rows
            .into_iter()
            .map(|row| Notification {
                id: row.id,
                user_id: row.user_id,
                title: row.title,
                message: row.message,
                kind: row.kind,
                priority: row.priority,
                is_read: false,
                read_at: None,
                metadata: Json(row.metadata),
                created_at: row.created_at,
            })
            .collect();
        tables.notifications.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Notification>, i64), StoreError> {
        let mut matching: Vec<Notification> = self
            .tables()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.clamp(1, 1000) as usize)
            .collect();
        Ok((page, total))
    }

    async fn count_unread_notifications(&self, user_id: &str) -> Result<i64, StoreError> {
        Ok(self
            .tables()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_notification_read(
        &self,
        id: &str,
        user_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<Option<Notification>, StoreError> {
        Ok(self
            .tables()
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .map(|n| {
                n.is_read = true;
                n.read_at.get_or_insert(now);
                n.clone()
            }))
    }

    async fn mark_all_notifications_read(
        &self,
        user_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<u64, StoreError> {
        let mut updated = 0;
        for notification in self
            .tables()
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            notification.is_read = true;
            notification.read_at = Some(now);
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        let before = tables.notifications.len();
        tables.notifications.retain(|n| !(n.id == id && n.user_id == user_id));
        Ok(tables.notifications.len() < before)
    }

    async fn insert_token_transaction(
        &self,
        params: CreateTokenTransaction,
    ) -> Result<TokenTransaction, StoreError> {
        let mut tables = self.tables();
        if tables.fail_token_inserts {
            return Err(StoreError::Unavailable("token insert failed".to_string()));
        }
        let transaction = TokenTransaction {
            id: params.id,
            user_id: params.user_id,
            amount: params.amount,
            kind: params.kind.as_str().to_string(),
            reason: params.reason,
            metadata: Json(params.metadata),
            created_at: params.created_at,
        };
        tables.tokens.push(transaction.clone());
        Ok(transaction)
    }

    async fn token_balance(&self, user_id: &str) -> Result<i64, StoreError> {
        Ok(self
            .tables()
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| i64::from(t.amount))
            .sum())
    }

    async fn list_token_transactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TokenTransaction>, StoreError> {
        let mut transactions = self.token_transactions_for(user_id);
        transactions.reverse();
        transactions.truncate(limit.clamp(1, 500) as usize);
        Ok(transactions)
    }
}

#[derive(Default)]
struct MailLog {
    attempted: Vec<String>,
    sent: Vec<OutgoingEmail>,
    failing: HashSet<String>,
    fail_all: bool,
}

/// Records every send; fails for configured addresses.
#[derive(Default)]
pub(crate) struct RecordingMailer {
    log: Mutex<MailLog>,
}

impl RecordingMailer {
    fn log(&self) -> MutexGuard<'_, MailLog> {
        self.log.lock().expect("mail log lock")
    }

    pub(crate) fn fail_for(&self, address: &str) {
        self.log().failing.insert(address.to_string());
    }

    pub(crate) fn fail_all(&self) {
        self.log().fail_all = true;
    }

    pub(crate) fn attempted(&self) -> Vec<String> {
        self.log().attempted.clone()
    }

    pub(crate) fn sent(&self) -> Vec<OutgoingEmail> {
        self.log().sent.clone()
    }

    pub(crate) fn delivered_to(&self) -> Vec<String> {
        self.log().sent.iter().map(|email| email.to.clone()).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let mut log = self.log();
        log.attempted.push(email.to.clone());
        if log.fail_all || log.failing.contains(&email.to) {
            return Err(MailError::Transport(format!("connection refused for {}", email.to)));
        }
        log.sent.push(email);
        Ok(())
    }
}

pub(crate) struct Classroom {
    pub(crate) teacher: User,
    pub(crate) student: User,
    pub(crate) course: Course,
    pub(crate) assignment: Assignment,
}

pub(crate) struct TestWorld {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) mailer: Arc<RecordingMailer>,
    pub(crate) state: AppState,
}

impl TestWorld {
    pub(crate) fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(Settings::for_tests(), store.clone(), mailer.clone());
        Self { store, mailer, state }
    }

    pub(crate) fn app(&self) -> Router {
        api::router::router(self.state.clone())
    }

    /// A teacher's course with one enrolled student and one published
    /// 100-point assignment due `due_in` from now.
    pub(crate) async fn classroom(&self, due_in: Duration, allow_late: bool) -> Classroom {
        let teacher = seed_user(&self.store, "teacher@classhub.test", UserRole::Teacher).await;
        let student = seed_user(&self.store, "student@classhub.test", UserRole::Student).await;
        let course = seed_course(&self.store, "CS101", &teacher.id).await;
        enroll_student(&self.store, &course.id, &student.id).await;
        let assignment =
            seed_published_assignment(&self.store, &course.id, &teacher.id, due_in, allow_late)
                .await;
        Classroom { teacher, student, course, assignment }
    }
}

pub(crate) async fn seed_user(store: &MemoryStore, email: &str, role: UserRole) -> User {
    insert_user(store, email, role, PLACEHOLDER_HASH.to_string()).await
}

pub(crate) async fn seed_user_with_password(
    store: &MemoryStore,
    email: &str,
    role: UserRole,
    password: &str,
) -> User {
    let hashed_password = security::hash_password(password).expect("hash password");
    insert_user(store, email, role, hashed_password).await
}

async fn insert_user(
    store: &MemoryStore,
    email: &str,
    role: UserRole,
    hashed_password: String,
) -> User {
    let full_name = email.split('@').next().unwrap_or(email).to_string();
    store
        .create_user(CreateUser {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            hashed_password,
            full_name,
            role,
            is_active: true,
            created_at: primitive_now_utc(),
        })
        .await
        .expect("insert user")
}

pub(crate) async fn seed_course(store: &MemoryStore, code: &str, teacher_id: &str) -> Course {
    store
        .create_course(CreateCourse {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            title: format!("{code} course"),
            description: None,
            teacher_id: teacher_id.to_string(),
            created_at: primitive_now_utc(),
        })
        .await
        .expect("insert course")
}

pub(crate) async fn enroll_student(
    store: &MemoryStore,
    course_id: &str,
    student_id: &str,
) -> Enrollment {
    store
        .upsert_enrollment(course_id, student_id, EnrollmentStatus::Active, primitive_now_utc())
        .await
        .expect("enroll student")
}

pub(crate) async fn seed_published_assignment(
    store: &MemoryStore,
    course_id: &str,
    teacher_id: &str,
    due_in: Duration,
    allow_late: bool,
) -> Assignment {
    let now = primitive_now_utc();
    let assignment = store
        .create_assignment(CreateAssignment {
            id: Uuid::new_v4().to_string(),
            course_id: course_id.to_string(),
            title: "Essay".to_string(),
            description: None,
            due_date: now + due_in,
            max_points: 100.0,
            allow_late_submission: allow_late,
            late_penalty_rate: 10.0,
            created_by: teacher_id.to_string(),
            created_at: now,
        })
        .await
        .expect("insert assignment");
    store
        .transition_assignment(
            &assignment.id,
            AssignmentStatus::Draft,
            AssignmentStatus::Published,
            now,
        )
        .await
        .expect("publish assignment")
        .expect("draft assignment")
}

pub(crate) fn bearer_token(user: &User, settings: &Settings) -> String {
    security::create_access_token(&user.id, user.role, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
