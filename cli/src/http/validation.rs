//! Request checks done before anything reaches the orchestrator.

use super::models::{CreateTaskRequest, HttpServerError};

pub const MAX_TOPIC_CHARS: usize = 500;
pub const MAX_KEY_POINTS_CHARS: usize = 2_000;
pub const MAX_FEEDBACK_CHARS: usize = 5_000;

fn check_length(field: &str, value: &str, max: usize) -> Result<(), HttpServerError> {
    let len = value.chars().count();
    if len > max {
        return Err(HttpServerError::InvalidRequest(format!(
            "{field} too long ({len} chars, max {max})"
        )));
    }
    Ok(())
}

pub fn validate_create_task(req: &CreateTaskRequest) -> Result<(), HttpServerError> {
    let topic = req.topic.trim();
    if topic.is_empty() {
        return Err(HttpServerError::InvalidRequest(
            "Topic cannot be empty".to_string(),
        ));
    }
    check_length("Topic", topic, MAX_TOPIC_CHARS)?;

    if let Some(points) = req.key_points.as_deref() {
        check_length("Key points", points, MAX_KEY_POINTS_CHARS)?;
    }

    if req.duration == Some(0) {
        return Err(HttpServerError::InvalidRequest(
            "Duration must be positive".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_feedback(feedback: &str) -> Result<(), HttpServerError> {
    let trimmed = feedback.trim();
    if trimmed.is_empty() {
        return Err(HttpServerError::InvalidRequest(
            "Feedback cannot be empty".to_string(),
        ));
    }
    check_length("Feedback", trimmed, MAX_FEEDBACK_CHARS)
}
