use serde_json::json;
use time::PrimitiveDateTime;

use crate::core::metrics::GRADES_RECORDED_TOTAL;
use crate::core::state::AppState;
use crate::db::models::{Grade, Submission, TokenTransaction, User};
use crate::db::types::{NotificationKind, SubmissionStatus, TokenKind};
use crate::repositories::grades::GradeWrite;
use crate::services::assignments::load_assignment;
use crate::services::authorization;
use crate::services::courses::load_course;
use crate::services::errors::{StoreResultExt, WorkflowError};
use crate::services::notifications::{Dispatched, NotificationDraft, Recipients};
use crate::services::rewards::{self, Reward};
use crate::services::submissions::load_submission;

pub(crate) const MIN_GRADE: f64 = 0.0;
pub(crate) const MAX_GRADE: f64 = 100.0;

#[derive(Debug, Clone)]
pub(crate) struct GradeInput {
    pub(crate) submission_id: String,
    pub(crate) value: f64,
    pub(crate) comment: Option<String>,
}

#[derive(Debug)]
pub(crate) struct Graded {
    pub(crate) grade: Grade,
    pub(crate) submission: Submission,
    /// `false` for a grade correction.
    pub(crate) created: bool,
    pub(crate) bonus: Option<TokenTransaction>,
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) notified: Option<Dispatched>,
}

pub(crate) fn validate_value(value: f64) -> Result<(), WorkflowError> {
    if !value.is_finite() || !(MIN_GRADE..=MAX_GRADE).contains(&value) {
        return Err(WorkflowError::validation(format!(
            "Grade value must be between {MIN_GRADE} and {MAX_GRADE}"
        )));
    }
    Ok(())
}

/// Records the grade of a submitted (or already graded) submission and
/// notifies the student.
///
/// The grade row and the `graded` status are written together. The bonus
/// reward is best-effort and only granted for the first grade; corrections
/// rewrite the same grade row. The student notification is best-effort too:
/// once the grade is committed nothing after it fails the call.
pub(crate) async fn grade(
    state: &AppState,
    grader: &User,
    input: GradeInput,
    now: PrimitiveDateTime,
) -> Result<Graded, WorkflowError> {
    validate_value(input.value)?;

    let submission = load_submission(state, &input.submission_id).await?;
    let assignment = load_assignment(state, &submission.assignment_id).await?;
    let course = load_course(state, &assignment.course_id).await?;
    if !authorization::can_grade(&grader.id, grader.role, &course.teacher_id) {
        return Err(WorkflowError::forbidden("Only the course teacher or an admin can grade"));
    }

    if !matches!(submission.status, SubmissionStatus::Submitted | SubmissionStatus::Graded) {
        return Err(WorkflowError::conflict(format!(
            "Cannot grade a submission that is {}",
            submission.status.as_str()
        )));
    }

    let adjusted_value = rewards::apply_late_penalty(
        input.value,
        submission.is_late,
        assignment.late_penalty_rate,
    );

    let recorded = state
        .store()
        .record_grade(GradeWrite {
            submission_id: submission.id.clone(),
            value: input.value,
            adjusted_value,
            comment: input.comment,
            grader_id: grader.id.clone(),
            now,
        })
        .await
        .persistence("Failed to record grade")?
        .ok_or_else(|| WorkflowError::conflict("Submission is no longer gradable"))?;

    metrics::counter!(
        GRADES_RECORDED_TOTAL,
        "outcome" => if recorded.created { "created" } else { "corrected" }
    )
    .increment(1);
    tracing::info!(
        submission_id = %recorded.submission.id,
        grade_id = %recorded.grade.id,
        value = recorded.grade.value,
        adjusted_value = recorded.grade.adjusted_value,
        created = recorded.created,
        grader_id = %grader.id,
        "Grade recorded"
    );

    let bonus = if recorded.created {
        rewards::award(
            state.store(),
            Reward {
                user_id: &recorded.submission.student_id,
                amount: rewards::bonus_tokens(adjusted_value, assignment.max_points),
                kind: TokenKind::GradeBonus,
                reason: format!("Grade bonus for {}", assignment.title),
                reference_id: &recorded.grade.id,
            },
            now,
        )
        .await
    } else {
        None
    };

    let draft = NotificationDraft::new(
        NotificationKind::Grade,
        format!("Graded: {}", assignment.title),
        format!(
            "Your submission for {} received {}/{}.",
            assignment.title,
            format_points(recorded.grade.adjusted_value),
            format_points(assignment.max_points)
        ),
    )
    .metadata(json!({
        "assignment_id": assignment.id,
        "submission_id": recorded.submission.id,
        "grade_id": recorded.grade.id,
    }));
    let notified = match state
        .dispatcher()
        .dispatch(Recipients::Users(vec![recorded.submission.student_id.clone()]), draft, now)
        .await
    {
        Ok(dispatched) => Some(dispatched),
        Err(err) => {
            tracing::error!(
                error = %err,
                submission_id = %recorded.submission.id,
                "Grade recorded without a student notification"
            );
            None
        }
    };

    Ok(Graded {
        grade: recorded.grade,
        submission: recorded.submission,
        created: recorded.created,
        bonus,
        notified,
    })
}

fn format_points(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded}")
    }
}
