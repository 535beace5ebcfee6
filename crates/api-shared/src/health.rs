use crate::wire::HealthRes;

/// Health service shared by the standalone REST binary and `clinic-run`.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Check health without creating an instance.
    ///
    /// The process serves requests from memory, so being able to answer is the whole check.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "clinic is alive".into(),
        }
    }
}
