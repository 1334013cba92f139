//! Newsletter subscriptions by e-mail address.

use crate::db::{not_found, now_timestamp, Database};
use crate::validation::{self, ValidationErrors};
use crate::{ClinicError, ClinicResult};
use api_shared::{SubscribeReq, Subscription};
use rusqlite::{params, Connection};

fn load_subscription(conn: &Connection, id: i64) -> ClinicResult<Subscription> {
    conn.query_row(
        "SELECT id, email, created_at FROM subscriptions WHERE id = ?1",
        [id],
        |row| {
            Ok(Subscription {
                id: row.get(0)?,
                email: row.get(1)?,
                created_at: row.get(2)?,
            })
        },
    )
    .map_err(not_found("subscription"))
}

#[derive(Clone, Debug)]
pub struct SubscriptionService {
    db: Database,
}

impl SubscriptionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// # Errors
    ///
    /// Returns `ClinicError::Validation` for a malformed or already subscribed address.
    pub fn subscribe(&self, req: &SubscribeReq) -> ClinicResult<Subscription> {
        let mut errors = ValidationErrors::new();
        let email = validation::required_email(&mut errors, "email", req.email.as_deref());
        errors.into_result()?;
        let Some(email) = email else {
            return Err(ClinicError::InvalidInput("email missing".into()));
        };

        let conn = self.db.lock()?;
        let taken: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE email = ?1 COLLATE NOCASE)",
            [email.as_str()],
            |row| row.get(0),
        )?;
        if taken == 1 {
            return Err(ClinicError::field("email", "The email has already been taken."));
        }
        conn.execute(
            "INSERT INTO subscriptions (email, created_at) VALUES (?1, ?2)",
            params![email.as_str(), now_timestamp()],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(subscription_id = id, "newsletter subscription added");
        load_subscription(&conn, id)
    }

    /// # Errors
    ///
    /// Returns `ClinicError::NotFound` when the address is not subscribed.
    pub fn unsubscribe(&self, email: &str) -> ClinicResult<()> {
        let conn = self.db.lock()?;
        let removed = conn.execute(
            "DELETE FROM subscriptions WHERE email = ?1 COLLATE NOCASE",
            [email.trim()],
        )?;
        if removed == 0 {
            return Err(ClinicError::NotFound("subscription"));
        }
        tracing::info!("newsletter subscription removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(email: &str) -> SubscribeReq {
        SubscribeReq {
            email: Some(email.into()),
        }
    }

    #[test]
    fn duplicate_subscription_is_rejected() {
        let service = SubscriptionService::new(Database::open_in_memory().unwrap());
        service.subscribe(&req("reader@example.com")).unwrap();
        let err = service.subscribe(&req("reader@example.com")).unwrap_err();
        assert!(matches!(err, ClinicError::Validation(e) if e.has("email")));
    }

    #[test]
    fn invalid_email_is_rejected() {
        let service = SubscriptionService::new(Database::open_in_memory().unwrap());
        let err = service.subscribe(&req("not-an-address")).unwrap_err();
        assert!(matches!(err, ClinicError::Validation(e) if e.has("email")));
    }

    #[test]
    fn unsubscribe_removes_address() {
        let service = SubscriptionService::new(Database::open_in_memory().unwrap());
        service.subscribe(&req("reader@example.com")).unwrap();
        service.unsubscribe("reader@example.com").unwrap();
        assert!(matches!(
            service.unsubscribe("reader@example.com"),
            Err(ClinicError::NotFound(_))
        ));
        service.subscribe(&req("reader@example.com")).unwrap();
    }
}
