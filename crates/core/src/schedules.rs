//! Weekly doctor schedules and the bookable time slots derived from them.

use crate::db::Database;
use crate::repositories::doctors;
use crate::validation::{self, ValidationErrors};
use crate::{ClinicError, ClinicResult};
use api_shared::{ReplaceScheduleReq, ScheduleEntry, ScheduleRes, TimeSlot, TimeSlotsRes};
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use rusqlite::params;
use std::collections::{BTreeSet, HashSet};

const MIN_SLOT_MINUTES: i64 = 5;
const MAX_SLOT_MINUTES: i64 = 240;

fn minutes_of(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn format_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Slot start times from `start` while a whole slot still fits before `end`.
pub fn slot_times(start: NaiveTime, end: NaiveTime, slot_minutes: u32) -> Vec<String> {
    if slot_minutes == 0 {
        return Vec::new();
    }
    let end = minutes_of(end);
    let mut slot = minutes_of(start);
    let mut times = Vec::new();
    while slot + slot_minutes <= end {
        times.push(format_minutes(slot));
        slot += slot_minutes;
    }
    times
}

#[derive(Clone, Debug)]
pub struct ScheduleService {
    db: Database,
}

impl ScheduleService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get(&self, doctor_id: i64) -> ClinicResult<ScheduleRes> {
        let conn = self.db.lock()?;
        doctors::load_doctor(&conn, doctor_id)?;
        let mut stmt = conn.prepare(
            "SELECT day_of_week, start_time, end_time, slot_minutes
             FROM doctor_schedules WHERE doctor_id = ?1 ORDER BY day_of_week",
        )?;
        let entries = stmt
            .query_map([doctor_id], |row| {
                Ok(ScheduleEntry {
                    day_of_week: row.get(0)?,
                    start_time: row.get(1)?,
                    end_time: row.get(2)?,
                    slot_minutes: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ScheduleRes { doctor_id, entries })
    }

    /// Replace the doctor's whole weekly schedule.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Validation` with `entries.<n>.<field>` keys for bad entries:
    /// unknown day, malformed or inverted times, slot length outside 5..=240 minutes, or a
    /// day listed twice.
    pub fn replace(&self, doctor_id: i64, req: &ReplaceScheduleReq) -> ClinicResult<ScheduleRes> {
        let mut errors = ValidationErrors::new();
        let mut seen_days = BTreeSet::new();
        let mut rows = Vec::with_capacity(req.entries.len());

        for (index, entry) in req.entries.iter().enumerate() {
            let key = |field: &str| format!("entries.{index}.{field}");
            let day = validation::int_between(
                &mut errors,
                &key("day_of_week"),
                Some(entry.day_of_week),
                0,
                6,
            );
            if let Some(day) = day {
                if !seen_days.insert(day) {
                    errors.add(&key("day_of_week"), "The day of week has already been used.");
                }
            }
            let start = validation::required_time(
                &mut errors,
                &key("start_time"),
                Some(entry.start_time.as_str()),
            );
            let end = validation::required_time(
                &mut errors,
                &key("end_time"),
                Some(entry.end_time.as_str()),
            );
            let slot = validation::int_between(
                &mut errors,
                &key("slot_minutes"),
                Some(entry.slot_minutes),
                MIN_SLOT_MINUTES,
                MAX_SLOT_MINUTES,
            );
            if let (Some(start), Some(end)) = (start, end) {
                if start >= end {
                    errors.add(&key("end_time"), "The end time must be after the start time.");
                }
            }
            if let (Some(day), Some(start), Some(end), Some(slot)) = (day, start, end, slot) {
                rows.push((
                    day,
                    validation::format_time(start),
                    validation::format_time(end),
                    slot,
                ));
            }
        }
        errors.into_result()?;

        let mut conn = self.db.lock()?;
        doctors::load_doctor(&conn, doctor_id)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM doctor_schedules WHERE doctor_id = ?1", [doctor_id])?;
        for (day, start, end, slot) in &rows {
            tx.execute(
                "INSERT INTO doctor_schedules (doctor_id, day_of_week, start_time, end_time,
                                               slot_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![doctor_id, day, start, end, slot],
            )?;
        }
        tx.commit()?;
        drop(conn);

        tracing::info!(doctor_id, days = rows.len(), "schedule replaced");
        self.get(doctor_id)
    }

    /// Bookable slots for one doctor on one date.
    ///
    /// # Arguments
    ///
    /// * `doctor_id` - An active doctor
    /// * `date` - Raw `YYYY-MM-DD` date from the request
    /// * `today` - The current local date; earlier dates yield no slots
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::NotFound` for unknown or inactive doctors and
    /// `ClinicError::Validation` for a missing or malformed date.
    pub fn time_slots(
        &self,
        doctor_id: i64,
        date: Option<&str>,
        today: NaiveDate,
    ) -> ClinicResult<TimeSlotsRes> {
        let mut errors = ValidationErrors::new();
        let date = validation::required_date(&mut errors, "date", date);
        errors.into_result()?;
        let Some(date) = date else {
            return Err(ClinicError::field("date", "The date field is required."));
        };
        let date_str = validation::format_date(date);

        let conn = self.db.lock()?;
        if doctors::doctor_active(&conn, doctor_id)? != Some(true) {
            return Err(ClinicError::NotFound("doctor"));
        }
        if date < today {
            return Ok(TimeSlotsRes {
                doctor_id,
                date: date_str,
                slots: Vec::new(),
            });
        }

        let day = i64::from(date.weekday().num_days_from_sunday());
        let schedule: Option<(String, String, i64)> = {
            use rusqlite::OptionalExtension;
            conn.query_row(
                "SELECT start_time, end_time, slot_minutes FROM doctor_schedules
                 WHERE doctor_id = ?1 AND day_of_week = ?2",
                params![doctor_id, day],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
        };
        let Some((start, end, slot_minutes)) = schedule else {
            return Ok(TimeSlotsRes {
                doctor_id,
                date: date_str,
                slots: Vec::new(),
            });
        };
        let (Some(start), Some(end)) = (
            validation::parse_time(&start),
            validation::parse_time(&end),
        )
        else {
            return Err(ClinicError::CorruptRow(format!(
                "schedule for doctor {doctor_id} day {day} has malformed times"
            )));
        };
        let slot_minutes = u32::try_from(slot_minutes).map_err(|_| {
            ClinicError::CorruptRow(format!("schedule for doctor {doctor_id} has bad slot length"))
        })?;

        let mut stmt = conn.prepare(
            "SELECT time FROM appointments
             WHERE doctor_id = ?1 AND date = ?2 AND status IN ('pending', 'confirmed')",
        )?;
        let booked = stmt
            .query_map(params![doctor_id, date_str], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;

        let slots = slot_times(start, end, slot_minutes)
            .into_iter()
            .map(|time| TimeSlot {
                available: !booked.contains(&time),
                time,
            })
            .collect();
        Ok(TimeSlotsRes {
            doctor_id,
            date: date_str,
            slots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_appointment, seed_doctor};

    fn entry(day: i64, start: &str, end: &str, slot: i64) -> ScheduleEntry {
        ScheduleEntry {
            day_of_week: day,
            start_time: start.into(),
            end_time: end.into(),
            slot_minutes: slot,
        }
    }

    fn time(value: &str) -> NaiveTime {
        validation::parse_time(value).unwrap()
    }

    #[test]
    fn slots_stop_when_a_whole_slot_no_longer_fits() {
        assert_eq!(
            slot_times(time("09:00"), time("10:10"), 30),
            vec!["09:00", "09:30"]
        );
        assert_eq!(slot_times(time("09:00"), time("09:20"), 30), Vec::<String>::new());
        assert_eq!(slot_times(time("23:00"), time("23:59"), 20).len(), 2);
    }

    #[test]
    fn replace_rejects_bad_entries() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let service = ScheduleService::new(db);

        let req = ReplaceScheduleReq {
            entries: vec![
                entry(1, "09:00", "17:00", 30),
                entry(1, "10:00", "12:00", 30),
                entry(7, "12:00", "11:00", 2),
            ],
        };
        let err = service.replace(doctor.id, &req).unwrap_err();
        let ClinicError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.has("entries.1.day_of_week"));
        assert!(errors.has("entries.2.day_of_week"));
        assert!(errors.has("entries.2.end_time"));
        assert!(errors.has("entries.2.slot_minutes"));
    }

    #[test]
    fn replace_overwrites_previous_schedule() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let service = ScheduleService::new(db);

        service
            .replace(
                doctor.id,
                &ReplaceScheduleReq {
                    entries: vec![entry(1, "09:00", "17:00", 30), entry(2, "09:00", "12:00", 15)],
                },
            )
            .unwrap();
        let res = service
            .replace(
                doctor.id,
                &ReplaceScheduleReq {
                    entries: vec![entry(3, "08:00", "11:00", 60)],
                },
            )
            .unwrap();
        assert_eq!(res.entries.len(), 1);
        assert_eq!(res.entries[0].day_of_week, 3);
        assert_eq!(res.entries[0].start_time, "08:00");
    }

    #[test]
    fn time_slots_mark_booked_times() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        // 2030-01-07 is a Monday.
        seed_appointment(&db, doctor.id, None, None, "2030-01-07", "09:30", "pending");
        seed_appointment(&db, doctor.id, None, None, "2030-01-07", "10:00", "cancelled");
        let service = ScheduleService::new(db);
        service
            .replace(
                doctor.id,
                &ReplaceScheduleReq {
                    entries: vec![entry(1, "09:00", "10:30", 30)],
                },
            )
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let res = service.time_slots(doctor.id, Some("2030-01-07"), today).unwrap();
        let slots: Vec<_> = res.slots.iter().map(|s| (s.time.as_str(), s.available)).collect();
        assert_eq!(
            slots,
            vec![("09:00", true), ("09:30", false), ("10:00", true)]
        );

        let unscheduled = service.time_slots(doctor.id, Some("2030-01-08"), today).unwrap();
        assert!(unscheduled.slots.is_empty());
    }

    #[test]
    fn past_dates_have_no_slots() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let service = ScheduleService::new(db);
        service
            .replace(
                doctor.id,
                &ReplaceScheduleReq {
                    entries: vec![entry(1, "09:00", "10:30", 30)],
                },
            )
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2030, 1, 8).unwrap();
        let res = service.time_slots(doctor.id, Some("2030-01-07"), today).unwrap();
        assert!(res.slots.is_empty());
    }

    #[test]
    fn time_slots_need_a_date_and_an_active_doctor() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let service = ScheduleService::new(db);
        let today = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();

        assert!(matches!(
            service.time_slots(doctor.id, None, today),
            Err(ClinicError::Validation(_))
        ));
        assert!(matches!(
            service.time_slots(999, Some("2030-01-07"), today),
            Err(ClinicError::NotFound("doctor"))
        ));
    }
}
