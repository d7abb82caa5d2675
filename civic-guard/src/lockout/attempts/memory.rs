use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LoginAttempt, LoginAttemptRepository};
use crate::error::Result;

/// Login attempts kept in process memory
#[derive(Debug, Default)]
pub struct MemoryAttemptRepository {
    attempts: RwLock<Vec<LoginAttempt>>,
}

impl MemoryAttemptRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored attempt in append order
    pub async fn all(&self) -> Vec<LoginAttempt> {
        self.attempts.read().await.clone()
    }
}

#[async_trait]
impl LoginAttemptRepository for MemoryAttemptRepository {
    async fn append(&self, attempt: &LoginAttempt) -> Result<()> {
        self.attempts.write().await.push(attempt.clone());
        Ok(())
    }

    async fn recent_for_email(&self, email: &str, limit: usize) -> Result<Vec<LoginAttempt>> {
        let attempts = self.attempts.read().await;
        let mut matching: Vec<LoginAttempt> = attempts
            .iter()
            .rev()
            .filter(|a| a.email == email)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.attempt_time.cmp(&a.attempt_time));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recent_for_email() {
        let repo = MemoryAttemptRepository::new();
        repo.append(&LoginAttempt::new("a@example.org", "203.0.113.7", false))
            .await
            .unwrap();
        repo.append(&LoginAttempt::new("b@example.org", "203.0.113.7", false))
            .await
            .unwrap();
        repo.append(&LoginAttempt::new("a@example.org", "203.0.113.7", true))
            .await
            .unwrap();

        let recent = repo.recent_for_email("a@example.org", 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].successful);

        assert_eq!(repo.recent_for_email("a@example.org", 1).await.unwrap().len(), 1);
    }
}
