use crate::dto::HealthRes;

/// Simple health service used by the REST API and the workspace binary.
///
/// This service provides a standardised way to check the health status of MedPortal.
pub struct HealthService;

impl HealthService {
    /// Static method to check health without creating an instance
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "MedPortal is alive".into(),
        }
    }
}
