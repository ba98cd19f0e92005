//! # API REST
//!
//! REST API implementation for MedPortal.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - Bearer token sessions
//!
//! Uses `api-shared` for wire types and `portal-core` for all domain behaviour.

#![warn(rust_2018_idioms)]

mod convert;
pub mod error;
mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::{AppState, Caller, IdentityClients};

use axum::routing::{delete, get, post, put};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::register,
        handlers::login,
        handlers::logout,
        handlers::me,
        handlers::list_templates,
        handlers::create_template,
        handlers::update_template,
        handlers::delete_template,
        handlers::list_patients,
        handlers::patient_history,
        handlers::submit_diagnosis,
        handlers::delete_diagnosis,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::RegisterReq,
        api_shared::LoginReq,
        api_shared::AccountRes,
        api_shared::AuthRes,
        api_shared::MeRes,
        api_shared::SymptomDto,
        api_shared::MethodDto,
        api_shared::TreatmentDto,
        api_shared::TemplateReq,
        api_shared::TemplateRes,
        api_shared::ListTemplatesRes,
        api_shared::ListPatientsRes,
        api_shared::SubmitDiagnosisReq,
        api_shared::SubmitDiagnosisRes,
        api_shared::DiagnosisRes,
        api_shared::HistoryRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router over `state`.
///
/// Swagger UI and CORS are layered on by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/me", get(handlers::me))
        .route(
            "/templates",
            get(handlers::list_templates).post(handlers::create_template),
        )
        .route(
            "/templates/:id",
            put(handlers::update_template).delete(handlers::delete_template),
        )
        .route("/patients", get(handlers::list_patients))
        .route("/patients/:id/diagnoses", get(handlers::patient_history))
        .route("/diagnoses", post(handlers::submit_diagnosis))
        .route("/diagnoses/:id", delete(handlers::delete_diagnosis))
        .with_state(state)
}
