use serde::{Deserialize, Serialize};

use crate::models::message::ContentType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub subject_pattern: String,
    pub body_pattern: String,
    pub content_type: ContentType,
}
