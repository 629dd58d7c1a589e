//! The single place a credit balance changes.

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{repo::UserStore, repo_types::User},
    error::{AppError, AppResult},
};

/// Debits one credit. Fails with `InsufficientCredit` when the conditional
/// decrement matched nothing.
pub async fn debit_one(users: &dyn UserStore, user_id: Uuid) -> AppResult<User> {
    match users.debit_one(user_id).await? {
        Some(user) => {
            info!(user_id = %user_id, balance = user.credit_balance, "credit debited");
            Ok(user)
        }
        None => {
            warn!(user_id = %user_id, "debit rejected, no credit left");
            Err(AppError::insufficient_credit())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{sample_user, InMemoryUsers};

    #[tokio::test]
    async fn debits_until_empty() {
        let users = InMemoryUsers::default();
        let user = users.insert(sample_user("Ada", "ada@example.com", 2));

        assert_eq!(debit_one(&users, user.id).await.unwrap().credit_balance, 1);
        assert_eq!(debit_one(&users, user.id).await.unwrap().credit_balance, 0);
        let err = debit_one(&users, user.id).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientCredit(_)));
        assert_eq!(users.get(user.id).unwrap().credit_balance, 0);
    }

    #[tokio::test]
    async fn unknown_user_is_insufficient() {
        let users = InMemoryUsers::default();
        let err = debit_one(&users, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientCredit(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_debits_never_exceed_balance() {
        let users = Arc::new(InMemoryUsers::default());
        let user = users.insert(sample_user("Ada", "ada@example.com", 5));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let users = users.clone();
            handles.push(tokio::spawn(async move {
                debit_one(users.as_ref(), user.id).await.is_ok()
            }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap() {
                ok += 1;
            }
        }
        assert_eq!(ok, 5);
        assert_eq!(users.get(user.id).unwrap().credit_balance, 0);
    }
}
