//! Direct messages between doctors and patients.
//!
//! Either side of a message may be a doctor or a patient, so each end is stored as a
//! `(type, id)` pair rather than a foreign key.

use crate::auth::Guard;
use crate::db::{exists, not_found, now_timestamp, Database};
use crate::ownership::Actor;
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX};
use crate::{ClinicError, ClinicResult};
use api_shared::{Message, SendMessageReq};
use rusqlite::{params, Connection, Row};

const MESSAGE_SELECT: &str = "SELECT id, sender_type, sender_id, receiver_type, receiver_id, body,
        read_at, created_at
    FROM messages";

const PARTY_TYPES: [&str; 2] = ["doctor", "patient"];

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        sender_type: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_type: row.get(3)?,
        receiver_id: row.get(4)?,
        body: row.get(5)?,
        read_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn load_message(conn: &Connection, id: i64) -> ClinicResult<Message> {
    conn.query_row(&format!("{MESSAGE_SELECT} WHERE id = ?1"), [id], message_from_row)
        .map_err(not_found("message"))
}

/// `(type, id)` of the actor as stored in the message columns.
fn party(actor: Actor) -> (&'static str, i64) {
    match actor {
        Actor::Doctor(id) => (Guard::Doctor.as_str(), id),
        Actor::Patient(id) => (Guard::Patient.as_str(), id),
    }
}

fn party_table(guard: Guard) -> &'static str {
    match guard {
        Guard::Doctor => "doctors",
        Guard::Patient => "patients",
    }
}

#[derive(Clone, Debug)]
pub struct MessageService {
    db: Database,
}

impl MessageService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Send a message from `sender` to an existing doctor or patient.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Validation` for an unknown receiver, a message to oneself, or
    /// an empty or over-long body.
    pub fn send(&self, sender: Actor, req: &SendMessageReq) -> ClinicResult<Message> {
        let conn = self.db.lock()?;
        let mut errors = ValidationErrors::new();
        let receiver_guard = validation::one_of(
            &mut errors,
            "receiver_type",
            req.receiver_type.as_deref(),
            &PARTY_TYPES,
        )
        .and_then(|t| Guard::parse(&t));
        let receiver_id = validation::required_id(&mut errors, "receiver_id", req.receiver_id);
        if let (Some(guard), Some(id)) = (receiver_guard, receiver_id) {
            if !exists(&conn, party_table(guard), id)? {
                errors.add("receiver_id", "The selected receiver id is invalid.");
            } else if party(sender) == (guard.as_str(), id) {
                errors.add("receiver_id", "You cannot send a message to yourself.");
            }
        }
        let body = validation::required_text(
            &mut errors,
            "body",
            req.body.as_deref(),
            LONG_TEXT_MAX,
        );
        errors.into_result()?;
        let (Some(guard), Some(receiver_id), Some(body)) = (receiver_guard, receiver_id, body)
        else {
            return Err(ClinicError::InvalidInput("message fields missing".into()));
        };

        let (sender_type, sender_id) = party(sender);
        conn.execute(
            "INSERT INTO messages (sender_type, sender_id, receiver_type, receiver_id, body,
                                   created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sender_type,
                sender_id,
                guard.as_str(),
                receiver_id,
                body.as_str(),
                now_timestamp(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(
            message_id = id,
            sender_type,
            sender_id,
            receiver_type = guard.as_str(),
            receiver_id,
            "message sent"
        );
        load_message(&conn, id)
    }

    /// Messages sent or received by `actor`, newest first.
    pub fn inbox(&self, actor: Actor) -> ClinicResult<Vec<Message>> {
        let (kind, id) = party(actor);
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{MESSAGE_SELECT}
             WHERE (sender_type = ?1 AND sender_id = ?2)
                OR (receiver_type = ?1 AND receiver_id = ?2)
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![kind, id], message_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Both directions of the thread between `actor` and one counterpart, oldest first.
    pub fn conversation(
        &self,
        actor: Actor,
        counterpart_type: &str,
        counterpart_id: i64,
    ) -> ClinicResult<Vec<Message>> {
        let Some(counterpart) = Guard::parse(counterpart_type) else {
            return Err(ClinicError::field("type", "The selected type is invalid."));
        };
        let (kind, id) = party(actor);
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{MESSAGE_SELECT}
             WHERE (sender_type = ?1 AND sender_id = ?2 AND receiver_type = ?3 AND receiver_id = ?4)
                OR (sender_type = ?3 AND sender_id = ?4 AND receiver_type = ?1 AND receiver_id = ?2)
             ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(
            params![kind, id, counterpart.as_str(), counterpart_id],
            message_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Mark a message read. Only its receiver may do so; re-marking keeps the first time.
    pub fn mark_read(&self, actor: Actor, id: i64) -> ClinicResult<Message> {
        let conn = self.db.lock()?;
        let message = load_message(&conn, id)?;
        let (kind, actor_id) = party(actor);
        if message.receiver_type != kind || message.receiver_id != actor_id {
            return Err(ClinicError::Forbidden);
        }
        conn.execute(
            "UPDATE messages SET read_at = COALESCE(read_at, ?1) WHERE id = ?2",
            params![now_timestamp(), id],
        )?;
        load_message(&conn, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_doctor, seed_patient};

    fn to(receiver_type: &str, receiver_id: i64, body: &str) -> SendMessageReq {
        SendMessageReq {
            receiver_type: Some(receiver_type.into()),
            receiver_id: Some(receiver_id),
            body: Some(body.into()),
        }
    }

    #[test]
    fn receiver_must_exist_and_body_is_bounded() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let service = MessageService::new(db);

        let long = "x".repeat(LONG_TEXT_MAX + 1);
        let ClinicError::Validation(errors) = service
            .send(Actor::Doctor(doctor.id), &to("patient", 42, &long))
            .unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert!(errors.has("receiver_id"));
        assert!(errors.has("body"));

        let err = service
            .send(Actor::Doctor(doctor.id), &to("admin", 1, "hello"))
            .unwrap_err();
        assert!(matches!(err, ClinicError::Validation(e) if e.has("receiver_type")));
    }

    #[test]
    fn cannot_message_self() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let service = MessageService::new(db);
        let err = service
            .send(Actor::Doctor(doctor.id), &to("doctor", doctor.id, "note to self"))
            .unwrap_err();
        assert!(matches!(err, ClinicError::Validation(e) if e.has("receiver_id")));
    }

    #[test]
    fn conversation_covers_both_directions() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let colleague = seed_doctor(&db, "colleague@example.com");
        let patient = seed_patient(&db, "pat@example.com");
        let service = MessageService::new(db);

        service
            .send(Actor::Patient(patient.id), &to("doctor", doctor.id, "Is my result back?"))
            .unwrap();
        service
            .send(Actor::Doctor(doctor.id), &to("patient", patient.id, "Yes, all clear."))
            .unwrap();
        service
            .send(Actor::Doctor(doctor.id), &to("doctor", colleague.id, "Lunch?"))
            .unwrap();

        let thread = service
            .conversation(Actor::Doctor(doctor.id), "patient", patient.id)
            .unwrap();
        let bodies: Vec<_> = thread.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["Is my result back?", "Yes, all clear."]);

        assert_eq!(service.inbox(Actor::Doctor(doctor.id)).unwrap().len(), 3);
        assert_eq!(service.inbox(Actor::Patient(patient.id)).unwrap().len(), 2);
        assert!(service
            .conversation(Actor::Doctor(doctor.id), "nurse", 1)
            .is_err());
    }

    #[test]
    fn only_receiver_marks_read() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let patient = seed_patient(&db, "pat@example.com");
        let service = MessageService::new(db);
        let sent = service
            .send(Actor::Patient(patient.id), &to("doctor", doctor.id, "Thanks"))
            .unwrap();
        assert!(sent.read_at.is_none());

        assert!(matches!(
            service.mark_read(Actor::Patient(patient.id), sent.id),
            Err(ClinicError::Forbidden)
        ));
        let read = service.mark_read(Actor::Doctor(doctor.id), sent.id).unwrap();
        assert!(read.read_at.is_some());
    }
}
