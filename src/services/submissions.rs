//! Submission lifecycle: `draft -> submitted -> graded -> returned`.
//!
//! Students write only while the row is a draft. Grading (see `grading`)
//! moves it to `graded`, after which content is frozen. Every precondition
//! is checked before the first write; the conditional writes in the store
//! guard against concurrent transitions.

use serde_json::json;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::db::models::{Assignment, Course, Submission, TokenTransaction, User};
use crate::db::types::{AssignmentStatus, NotificationKind, SubmissionStatus, TokenKind};
use crate::repositories::submissions::{DraftSubmission, TransitionStamp};
use crate::services::assignments::{load_assignment, load_managed};
use crate::services::authorization;
use crate::services::courses::load_course;
use crate::services::errors::{StoreResultExt, WorkflowError};
use crate::services::notifications::{Dispatched, NotificationDraft, Recipients};
use crate::services::rewards::{self, Reward};

#[derive(Debug, Clone)]
pub(crate) struct SubmissionInput {
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) content: String,
    pub(crate) attachments: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct Finalized {
    pub(crate) submission: Submission,
    pub(crate) reward: Option<TokenTransaction>,
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) notified: Option<Dispatched>,
}

#[derive(Debug)]
pub(crate) struct Returned {
    pub(crate) submission: Submission,
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) notified: Option<Dispatched>,
}

fn is_late(assignment: &Assignment, now: PrimitiveDateTime) -> bool {
    now > assignment.due_date
}

fn ensure_open(assignment: &Assignment) -> Result<(), WorkflowError> {
    if assignment.status != AssignmentStatus::Published {
        return Err(WorkflowError::conflict("Assignment is not open for submissions"));
    }
    Ok(())
}

fn ensure_lateness_allowed(
    assignment: &Assignment,
    now: PrimitiveDateTime,
) -> Result<bool, WorkflowError> {
    let late = is_late(assignment, now);
    if late && !assignment.allow_late_submission {
        return Err(WorkflowError::validation(
            "The due date has passed and late submissions are not allowed",
        ));
    }
    Ok(late)
}

fn ensure_draft(submission: &Submission) -> Result<(), WorkflowError> {
    match submission.status {
        SubmissionStatus::Draft => Ok(()),
        SubmissionStatus::Graded => {
            Err(WorkflowError::conflict("Submission is already graded, immutable"))
        }
        status => Err(WorkflowError::conflict(format!(
            "Submission is already {} and can no longer be changed",
            status.as_str()
        ))),
    }
}

/// Saves the student's work as a draft, creating the single row for the
/// (assignment, student) pair on first save.
pub(crate) async fn create_or_update(
    state: &AppState,
    actor: &User,
    input: SubmissionInput,
    now: PrimitiveDateTime,
) -> Result<Submission, WorkflowError> {
    if !authorization::can_write_submission(&actor.id, actor.role, &input.student_id) {
        return Err(WorkflowError::forbidden("Students can only write their own submissions"));
    }

    let assignment = load_assignment(state, &input.assignment_id).await?;
    ensure_open(&assignment)?;

    let enrollment = state
        .store()
        .find_enrollment(&assignment.course_id, &input.student_id)
        .await
        .persistence("Failed to load enrollment")?;
    if !authorization::is_active_enrollment(enrollment.map(|enrollment| enrollment.status)) {
        return Err(WorkflowError::forbidden("Student is not enrolled in this course"));
    }

    let existing = state
        .store()
        .find_submission_for(&assignment.id, &input.student_id)
        .await
        .persistence("Failed to load submission")?;
    if let Some(existing) = &existing {
        ensure_draft(existing)?;
    }

    let late = ensure_lateness_allowed(&assignment, now)?;

    let submission = state
        .store()
        .upsert_draft(DraftSubmission {
            id: Uuid::new_v4().to_string(),
            assignment_id: assignment.id.clone(),
            student_id: input.student_id.clone(),
            content: input.content,
            attachments: input.attachments,
            is_late: late,
            now,
        })
        .await
        .persistence("Failed to save submission")?
        .ok_or_else(|| WorkflowError::conflict("Submission was submitted concurrently"))?;

    tracing::info!(
        submission_id = %submission.id,
        assignment_id = %assignment.id,
        student_id = %submission.student_id,
        is_late = submission.is_late,
        created = existing.is_none(),
        "Submission draft saved"
    );
    Ok(submission)
}

/// draft -> submitted. Rewards on-time work and tells the course teacher.
pub(crate) async fn finalize(
    state: &AppState,
    actor: &User,
    submission_id: &str,
    now: PrimitiveDateTime,
) -> Result<Finalized, WorkflowError> {
    let submission = load_submission(state, submission_id).await?;
    if !authorization::can_write_submission(&actor.id, actor.role, &submission.student_id) {
        return Err(WorkflowError::forbidden("Students can only submit their own work"));
    }
    ensure_draft(&submission)?;
    if !submission.has_content() {
        return Err(WorkflowError::validation("Submission content is empty"));
    }

    let assignment = load_assignment(state, &submission.assignment_id).await?;
    ensure_open(&assignment)?;
    let late = ensure_lateness_allowed(&assignment, now)?;

    let submission = state
        .store()
        .transition_submission(
            &submission.id,
            SubmissionStatus::Draft,
            SubmissionStatus::Submitted,
            TransitionStamp { submitted_at: Some(now), is_late: Some(late) },
            now,
        )
        .await
        .persistence("Failed to submit")?
        .ok_or_else(|| WorkflowError::conflict("Submission is already submitted"))?;

    tracing::info!(
        submission_id = %submission.id,
        assignment_id = %assignment.id,
        is_late = submission.is_late,
        "Submission finalized"
    );

    let reward = if submission.is_late {
        None
    } else {
        rewards::award(
            state.store(),
            Reward {
                user_id: &submission.student_id,
                amount: state.settings().rewards().submission_reward_tokens,
                kind: TokenKind::Submission,
                reason: format!("On-time submission for {}", assignment.title),
                reference_id: &submission.id,
            },
            now,
        )
        .await
    };

    let notified = notify_teacher(state, &assignment, &submission, actor, now).await;

    Ok(Finalized { submission, reward, notified })
}

async fn notify_teacher(
    state: &AppState,
    assignment: &Assignment,
    submission: &Submission,
    actor: &User,
    now: PrimitiveDateTime,
) -> Option<Dispatched> {
    let course = match load_course(state, &assignment.course_id).await {
        Ok(course) => course,
        Err(err) => {
            tracing::warn!(error = %err, "Submission notification skipped");
            return None;
        }
    };

    let student_name = if actor.id == submission.student_id {
        actor.full_name.clone()
    } else {
        match state.store().find_user(&submission.student_id).await {
            Ok(Some(student)) => student.full_name,
            Ok(None) => submission.student_id.clone(),
            Err(err) => {
                tracing::warn!(error = %err, "Submission notification skipped");
                return None;
            }
        }
    };

    let late_note = if submission.is_late { " (late)" } else { "" };
    let draft = NotificationDraft::new(
        NotificationKind::Assignment,
        "Submission received",
        format!("{} submitted {}{}.", student_name, assignment.title, late_note),
    )
    .metadata(json!({
        "assignment_id": assignment.id,
        "submission_id": submission.id,
        "student_id": submission.student_id,
    }));

    match state
        .dispatcher()
        .dispatch(Recipients::Users(vec![course.teacher_id.clone()]), draft, now)
        .await
    {
        Ok(dispatched) => Some(dispatched),
        Err(err) => {
            tracing::warn!(
                error = %err,
                submission_id = %submission.id,
                "Submission notification skipped"
            );
            None
        }
    }
}

/// graded -> returned. Content and grade stay as they are.
pub(crate) async fn return_submission(
    state: &AppState,
    actor: &User,
    submission_id: &str,
    now: PrimitiveDateTime,
) -> Result<Returned, WorkflowError> {
    let submission = load_submission(state, submission_id).await?;
    let (assignment, _) = load_managed(state, actor, &submission.assignment_id).await?;
    if submission.status != SubmissionStatus::Graded {
        return Err(WorkflowError::conflict("Only graded submissions can be returned"));
    }

    let submission = state
        .store()
        .transition_submission(
            &submission.id,
            SubmissionStatus::Graded,
            SubmissionStatus::Returned,
            TransitionStamp::default(),
            now,
        )
        .await
        .persistence("Failed to return submission")?
        .ok_or_else(|| WorkflowError::conflict("Submission was changed concurrently"))?;

    tracing::info!(submission_id = %submission.id, "Submission returned");

    let draft = NotificationDraft::new(
        NotificationKind::Info,
        "Submission returned",
        format!("Your graded work for {} was returned.", assignment.title),
    )
    .metadata(json!({ "assignment_id": assignment.id, "submission_id": submission.id }));
    let notified = match state
        .dispatcher()
        .dispatch(Recipients::Users(vec![submission.student_id.clone()]), draft, now)
        .await
    {
        Ok(dispatched) => Some(dispatched),
        Err(err) => {
            tracing::warn!(
                error = %err,
                submission_id = %submission.id,
                "Return notification skipped"
            );
            None
        }
    };

    Ok(Returned { submission, notified })
}

pub(crate) async fn load_submission(
    state: &AppState,
    submission_id: &str,
) -> Result<Submission, WorkflowError> {
    state
        .store()
        .find_submission(submission_id)
        .await
        .persistence("Failed to load submission")?
        .ok_or_else(|| WorkflowError::not_found("Submission not found"))
}

/// The submission together with its course, if the actor may read it.
pub(crate) async fn visible_submission(
    state: &AppState,
    actor: &User,
    submission_id: &str,
) -> Result<(Submission, Course), WorkflowError> {
    let submission = load_submission(state, submission_id).await?;
    let assignment = load_assignment(state, &submission.assignment_id).await?;
    let course = load_course(state, &assignment.course_id).await?;
    let allowed = authorization::can_view_submission(
        &actor.id,
        actor.role,
        &submission.student_id,
        &course.teacher_id,
    );
    if !allowed {
        return Err(WorkflowError::forbidden("Not allowed to view this submission"));
    }
    Ok((submission, course))
}

pub(crate) async fn list_for_assignment(
    state: &AppState,
    actor: &User,
    assignment_id: &str,
) -> Result<Vec<Submission>, WorkflowError> {
    let (assignment, _) = load_managed(state, actor, assignment_id).await?;
    state
        .store()
        .list_submissions(&assignment.id)
        .await
        .persistence("Failed to list submissions")
}
