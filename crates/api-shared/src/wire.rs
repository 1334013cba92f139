//! Request and response types exchanged over the REST API.
//!
//! Dates travel as `YYYY-MM-DD` strings and times as `HH:MM`; `clinic-core` parses and
//! validates them. Request fields are optional wherever the server reports a missing value
//! as a field-level validation error rather than a deserialisation failure.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// COMMON
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Plain acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
}

impl MessageRes {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of every 422 response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidationErrorRes {
    pub message: String,
    /// Field name to list of messages.
    pub errors: std::collections::BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    pub search: Option<String>,
}

// ============================================================================
// AUTH & PROFILES
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisterPatientReq {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisterDoctorReq {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    pub specialization: Option<String>,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub experience_years: Option<i64>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginReq {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub qualification: Option<String>,
    pub experience_years: Option<i64>,
    pub bio: Option<String>,
    pub consultation_fee: Option<f64>,
    pub is_active: bool,
    pub average_rating: f64,
    pub review_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub blood_group: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Guest {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DoctorAuthRes {
    pub token: String,
    pub token_type: String,
    pub doctor: Doctor,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PatientAuthRes {
    pub token: String,
    pub token_type: String,
    pub patient: Patient,
}

/// The authenticated principal. Exactly one of `doctor`/`patient` is set, matching `guard`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeRes {
    pub guard: String,
    pub doctor: Option<Doctor>,
    pub patient: Option<Patient>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateDoctorProfileReq {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub qualification: Option<String>,
    pub experience_years: Option<i64>,
    pub bio: Option<String>,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePatientProfileReq {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub blood_group: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordReq {
    pub current_password: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DoctorQuery {
    pub specialization: Option<String>,
    pub search: Option<String>,
}

// ============================================================================
// SCHEDULES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduleEntry {
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: i64,
    pub start_time: String,
    pub end_time: String,
    pub slot_minutes: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ReplaceScheduleReq {
    #[serde(default)]
    pub entries: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduleRes {
    pub doctor_id: i64,
    pub entries: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeSlot {
    pub time: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimeSlotsRes {
    pub doctor_id: i64,
    pub date: String,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SlotQuery {
    pub date: Option<String>,
}

// ============================================================================
// APPOINTMENTS
// ============================================================================

/// Booking request. Patient bookings use only `doctor_id`, `date`, `time`, `terms` and
/// `message`; guest bookings also need the contact fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BookAppointmentReq {
    pub doctor_id: Option<i64>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub terms: Option<bool>,
    pub message: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Appointment {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: Option<i64>,
    pub guest_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date: String,
    pub time: String,
    pub status: String,
    pub message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookAppointmentRes {
    pub message: String,
    /// `patient` or `guest`.
    pub booked_as: String,
    pub appointment: Appointment,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AppointmentQuery {
    pub status: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateAppointmentStatusReq {
    pub status: Option<String>,
}

// ============================================================================
// CONSULTATIONS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ConsultationReq {
    /// `guest_<id>` for a guest, otherwise a patient id.
    pub patient_id: Option<String>,
    pub appointment_id: Option<i64>,
    pub consultation_date: Option<String>,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub follow_up_date: Option<String>,
    pub fee: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Consultation {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: Option<i64>,
    pub guest_id: Option<i64>,
    pub appointment_id: Option<i64>,
    pub consultation_date: String,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub follow_up_date: Option<String>,
    pub fee: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

// ============================================================================
// MEDICAL RECORDS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Attachment {
    pub file_name: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MedicalRecord {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub title: String,
    pub record_type: String,
    pub description: Option<String>,
    pub record_date: String,
    pub attachment: Option<Attachment>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecordQuery {
    /// Restrict a doctor's listing to one patient.
    pub patient_id: Option<i64>,
}

// ============================================================================
// PRESCRIPTIONS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionMedicineReq {
    pub medicine_id: Option<i64>,
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionTestReq {
    pub test_id: Option<i64>,
    pub name: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreatePrescriptionReq {
    /// `guest_<id>` for a guest, otherwise a patient id.
    pub patient_id: Option<String>,
    pub appointment_id: Option<i64>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub valid_until: Option<String>,
    #[serde(default)]
    pub medicines: Vec<PrescriptionMedicineReq>,
    #[serde(default)]
    pub tests: Vec<PrescriptionTestReq>,
}

/// Partial update. `medicines`/`tests`, when present, replace the existing line items.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePrescriptionReq {
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub valid_until: Option<String>,
    pub is_active: Option<bool>,
    pub medicines: Option<Vec<PrescriptionMedicineReq>>,
    pub tests: Option<Vec<PrescriptionTestReq>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionMedicine {
    pub id: i64,
    pub medicine_id: Option<i64>,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionTest {
    pub id: i64,
    pub test_id: Option<i64>,
    pub name: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Prescription {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: Option<i64>,
    pub guest_id: Option<i64>,
    pub appointment_id: Option<i64>,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub prescribed_date: String,
    pub valid_until: Option<String>,
    pub is_active: bool,
    pub medicines: Vec<PrescriptionMedicine>,
    pub tests: Vec<PrescriptionTest>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BulkPrescriptionReq {
    #[serde(default)]
    pub ids: Vec<i64>,
    /// `activate`, `deactivate` or `delete`.
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkPrescriptionRes {
    pub action: String,
    pub affected: usize,
}

// ============================================================================
// REVIEWS & DASHBOARDS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateReviewReq {
    pub doctor_id: Option<i64>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DoctorDashboard {
    pub total_appointments: i64,
    pub today_appointments: i64,
    pub pending_appointments: i64,
    pub unique_patients: i64,
    pub average_rating: f64,
    pub total_reviews: i64,
    pub satisfaction_percentage: i64,
    pub total_prescriptions: i64,
    pub upcoming: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PatientDashboard {
    pub total_appointments: i64,
    pub upcoming_appointments: i64,
    pub medical_records: i64,
    pub active_prescriptions: i64,
    pub consultations: i64,
}

// ============================================================================
// BLOGS & GALLERIES
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BlogReq {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Blog {
    pub id: i64,
    pub doctor_id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub image: Option<String>,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GalleryReq {
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GalleryQuery {
    pub doctor_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Gallery {
    pub id: i64,
    pub doctor_id: i64,
    pub title: String,
    pub image_url: String,
    pub description: Option<String>,
    pub created_at: String,
}

// ============================================================================
// MESSAGES
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SendMessageReq {
    /// `doctor` or `patient`.
    pub receiver_type: Option<String>,
    pub receiver_id: Option<i64>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: i64,
    pub sender_type: String,
    pub sender_id: i64,
    pub receiver_type: String,
    pub receiver_id: i64,
    pub body: String,
    pub read_at: Option<String>,
    pub created_at: String,
}

// ============================================================================
// CATALOGUE, CART & SUBSCRIPTIONS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MedicineReq {
    pub name: Option<String>,
    pub generic_name: Option<String>,
    pub category: Option<String>,
    pub strength: Option<String>,
    pub form: Option<String>,
    pub manufacturer: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Medicine {
    pub id: i64,
    pub name: String,
    pub generic_name: Option<String>,
    pub category: Option<String>,
    pub strength: Option<String>,
    pub form: Option<String>,
    pub manufacturer: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LabTestReq {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LabTest {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AddCartItemReq {
    pub medicine_id: Option<i64>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateCartItemReq {
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: i64,
    pub medicine_id: i64,
    pub medicine_name: String,
    pub unit_price: f64,
    pub quantity: i64,
    pub line_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub total: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SubscribeReq {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub id: i64,
    pub email: String,
    pub created_at: String,
}
