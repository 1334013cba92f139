//! Ownership gates for doctor- and patient-scoped resources.
//!
//! Handlers load the resource first (so a missing row is a 404) and then ask these
//! helpers whether the caller may touch it (a foreign row is a 403).

use crate::auth::Principal;
use crate::{ClinicError, ClinicResult};

/// The authenticated caller, reduced to what ownership checks need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor {
    Doctor(i64),
    Patient(i64),
}

impl From<&Principal> for Actor {
    fn from(principal: &Principal) -> Self {
        match principal {
            Principal::Doctor(doctor) => Actor::Doctor(doctor.id),
            Principal::Patient(patient) => Actor::Patient(patient.id),
        }
    }
}

impl Actor {
    /// True for the owning doctor or, when the resource has one, its patient.
    pub fn may_view(self, doctor_id: i64, patient_id: Option<i64>) -> bool {
        match self {
            Actor::Doctor(id) => id == doctor_id,
            Actor::Patient(id) => patient_id == Some(id),
        }
    }
}

/// # Errors
///
/// Returns `ClinicError::Forbidden` unless `doctor_id` owns the resource.
pub fn ensure_doctor_owns(resource_doctor_id: i64, doctor_id: i64) -> ClinicResult<()> {
    if resource_doctor_id == doctor_id {
        Ok(())
    } else {
        tracing::warn!(resource_doctor_id, doctor_id, "ownership check failed");
        Err(ClinicError::Forbidden)
    }
}

/// # Errors
///
/// Returns `ClinicError::Forbidden` unless the resource belongs to `patient_id`.
pub fn ensure_patient_owns(resource_patient_id: Option<i64>, patient_id: i64) -> ClinicResult<()> {
    if resource_patient_id == Some(patient_id) {
        Ok(())
    } else {
        tracing::warn!(?resource_patient_id, patient_id, "ownership check failed");
        Err(ClinicError::Forbidden)
    }
}

/// # Errors
///
/// Returns `ClinicError::Forbidden` when [`Actor::may_view`] is false.
pub fn ensure_can_view(actor: Actor, doctor_id: i64, patient_id: Option<i64>) -> ClinicResult<()> {
    if actor.may_view(doctor_id, patient_id) {
        Ok(())
    } else {
        Err(ClinicError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doctor_ownership() {
        assert!(ensure_doctor_owns(3, 3).is_ok());
        assert!(matches!(ensure_doctor_owns(3, 4), Err(ClinicError::Forbidden)));
    }

    #[test]
    fn patient_ownership_rejects_guest_rows() {
        assert!(ensure_patient_owns(Some(7), 7).is_ok());
        assert!(matches!(ensure_patient_owns(None, 7), Err(ClinicError::Forbidden)));
    }

    #[test]
    fn viewers() {
        assert!(Actor::Doctor(1).may_view(1, Some(9)));
        assert!(!Actor::Doctor(2).may_view(1, Some(9)));
        assert!(Actor::Patient(9).may_view(1, Some(9)));
        assert!(!Actor::Patient(9).may_view(1, None));
    }
}
