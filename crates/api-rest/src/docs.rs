//! OpenAPI document served at `/api-docs/openapi.json`.

use crate::routes;
use api_shared::*;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(title = "Clinic API", description = "Clinic and telehealth REST API"),
    paths(
        routes::health,
        routes::auth::register_patient,
        routes::auth::login_patient,
        routes::auth::register_doctor,
        routes::auth::login_doctor,
        routes::auth::logout,
        routes::auth::me,
        routes::doctors::list_doctors,
        routes::doctors::show_doctor,
        routes::doctors::time_slots,
        routes::doctors::doctor_schedule,
        routes::doctors::doctor_reviews,
        routes::doctors::update_profile,
        routes::doctors::change_password,
        routes::doctors::my_schedule,
        routes::doctors::replace_schedule,
        routes::doctors::list_patients,
        routes::doctors::show_patient,
        routes::doctors::show_guest,
        routes::appointments::book,
        routes::appointments::show,
        routes::appointments::list_for_doctor,
        routes::appointments::update_status,
        routes::appointments::delete,
        routes::appointments::list_for_patient,
        routes::appointments::cancel,
        routes::consultations::list_for_doctor,
        routes::consultations::create,
        routes::consultations::show,
        routes::consultations::update,
        routes::consultations::delete,
        routes::consultations::list_for_patient,
        routes::records::list_for_doctor,
        routes::records::create,
        routes::records::update,
        routes::records::delete,
        routes::records::list_for_patient,
        routes::records::show,
        routes::records::download,
        routes::prescriptions::list_for_doctor,
        routes::prescriptions::list_for_subject,
        routes::prescriptions::create,
        routes::prescriptions::bulk_update,
        routes::prescriptions::update,
        routes::prescriptions::delete,
        routes::prescriptions::list_for_patient,
        routes::prescriptions::show,
        routes::patients::update_profile,
        routes::patients::change_password,
        routes::patients::create_review,
        routes::patients::delete_review,
        routes::patients::patient_dashboard,
        routes::patients::doctor_dashboard,
        routes::content::list_blogs,
        routes::content::show_blog,
        routes::content::my_blogs,
        routes::content::create_blog,
        routes::content::update_blog,
        routes::content::delete_blog,
        routes::content::list_galleries,
        routes::content::show_gallery,
        routes::content::create_gallery,
        routes::content::update_gallery,
        routes::content::delete_gallery,
        routes::messages::inbox,
        routes::messages::send,
        routes::messages::conversation,
        routes::messages::mark_read,
        routes::catalogue::list_medicines,
        routes::catalogue::show_medicine,
        routes::catalogue::create_medicine,
        routes::catalogue::update_medicine,
        routes::catalogue::delete_medicine,
        routes::catalogue::list_tests,
        routes::catalogue::show_test,
        routes::catalogue::create_test,
        routes::catalogue::update_test,
        routes::catalogue::delete_test,
        routes::cart::show,
        routes::cart::add,
        routes::cart::update,
        routes::cart::remove,
        routes::cart::clear,
        routes::subscriptions::subscribe,
        routes::subscriptions::unsubscribe,
    ),
    components(schemas(
        HealthRes,
        MessageRes,
        ValidationErrorRes,
        RegisterPatientReq,
        RegisterDoctorReq,
        LoginReq,
        Doctor,
        Patient,
        Guest,
        DoctorAuthRes,
        PatientAuthRes,
        MeRes,
        UpdateDoctorProfileReq,
        UpdatePatientProfileReq,
        ChangePasswordReq,
        ScheduleEntry,
        ReplaceScheduleReq,
        ScheduleRes,
        TimeSlot,
        TimeSlotsRes,
        BookAppointmentReq,
        Appointment,
        BookAppointmentRes,
        UpdateAppointmentStatusReq,
        ConsultationReq,
        Consultation,
        Attachment,
        MedicalRecord,
        routes::records::RecordUpload,
        PrescriptionMedicineReq,
        PrescriptionTestReq,
        CreatePrescriptionReq,
        UpdatePrescriptionReq,
        PrescriptionMedicine,
        PrescriptionTest,
        Prescription,
        BulkPrescriptionReq,
        BulkPrescriptionRes,
        CreateReviewReq,
        Review,
        DoctorDashboard,
        PatientDashboard,
        BlogReq,
        Blog,
        GalleryReq,
        Gallery,
        SendMessageReq,
        Message,
        MedicineReq,
        Medicine,
        LabTestReq,
        LabTest,
        AddCartItemReq,
        UpdateCartItemReq,
        CartItem,
        Cart,
        SubscribeReq,
        Subscription,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by guarded operations.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
