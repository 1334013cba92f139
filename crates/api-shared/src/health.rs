use crate::wire::HealthRes;

/// Simple health service behind `GET /health`
///
/// This service provides a standardised way to check the health status of the clinic
/// backend. Only process liveness is reported; the database is not checked.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Static method to check health without creating an instance
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Clinic API is alive".into(),
        }
    }
}
