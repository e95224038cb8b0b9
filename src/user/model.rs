use serde::{Deserialize, Serialize};

use super::Sub;

/// Display data resolved from the external profile service. Never stored by
/// this core, only attached to responses at read time.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserInfo {
    pub sub: Sub,
    pub name: String,
    pub picture: Option<String>,
}

impl UserInfo {
    /// Fallback when the profile service cannot resolve a sub.
    pub fn placeholder(sub: &Sub) -> Self {
        Self {
            sub: sub.clone(),
            name: "Unknown user".into(),
            picture: None,
        }
    }
}
