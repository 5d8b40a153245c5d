pub const SESSION_HISTORY_CAP: usize = 100;

pub fn mastery_key(user_id: &str, concept_id: &str) -> String {
    format!("mastery:{}:{}", user_id, concept_id)
}

pub fn mastery_index_key(user_id: &str) -> String {
    format!("mastery-index:{}", user_id)
}

pub fn review_queue_key(user_id: &str) -> String {
    format!("review-queue:{}", user_id)
}

pub fn session_key(user_id: &str) -> String {
    format!("session:{}", user_id)
}

pub fn session_archive_key(session_id: &str) -> String {
    format!("session-archive:{}", session_id)
}

pub fn session_history_key(user_id: &str) -> String {
    format!("session-history:{}", user_id)
}
