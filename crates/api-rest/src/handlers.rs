//! REST handlers.

use crate::convert::{account_res, diagnosis_res, template_draft, template_res, view_name};
use crate::error::ApiError;
use crate::state::{AppState, Caller};
use api_shared::{
    AuthRes, HealthRes, HealthService, HistoryRes, ListPatientsRes, ListTemplatesRes, LoginReq,
    MeRes, RegisterReq, SubmitDiagnosisReq, SubmitDiagnosisRes, TemplateReq, TemplateRes,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use portal_core::{
    admin_route, landing_view, Account, AuthoringSession, DocumentId, InsuranceNumber,
    NonEmptyText, PortalError, Registration, Role, RouteDecision, Session, View,
};
use std::sync::Arc;

type ApiResult<T> = Result<T, ApiError>;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Account registered and signed in", body = AuthRes),
        (status = 400, description = "Invalid input or weak password"),
        (status = 403, description = "Role cannot be self-registered"),
        (status = 409, description = "Insurance number already registered"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register a patient or doctor account
///
/// Administrator accounts cannot be registered here; one is provisioned at startup.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterReq>,
) -> ApiResult<(StatusCode, Json<AuthRes>)> {
    let role: Role = req.role.parse()?;
    if role == Role::Admin {
        return Err(ApiError::Forbidden(
            "administrator accounts cannot be self-registered".into(),
        ));
    }
    let registration = Registration {
        insurance_number: InsuranceNumber::parse(&req.insurance_number)
            .map_err(PortalError::from)?,
        password: req.password,
        name: NonEmptyText::new(&req.name).map_err(PortalError::from)?,
        role,
    };

    let (session, liveness) = state.open_session().await;
    match session.register(registration).await {
        Ok(account) => {
            let res = admit(&state, session, liveness, &account).await;
            Ok((StatusCode::CREATED, Json(res)))
        }
        Err(e) => {
            liveness.cancel();
            Err(e.into())
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Signed in", body = AuthRes),
        (status = 400, description = "Malformed insurance number"),
        (status = 401, description = "Invalid credentials or unprovisioned profile"),
        (status = 500, description = "Internal server error")
    )
)]
/// Sign in with an insurance number and password
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> ApiResult<Json<AuthRes>> {
    let insurance_number =
        InsuranceNumber::parse(&req.insurance_number).map_err(PortalError::from)?;

    let (session, liveness) = state.open_session().await;
    match session.login(&insurance_number, &req.password).await {
        Ok(account) => Ok(Json(admit(&state, session, liveness, &account).await)),
        Err(e) => {
            liveness.cancel();
            Err(e.into())
        }
    }
}

async fn admit(
    state: &AppState,
    session: Arc<Session>,
    liveness: portal_core::LivenessToken,
    account: &Account,
) -> AuthRes {
    let view = landing_view(&session.state()).unwrap_or(View::Login);
    let bearer = state.admit(session, liveness).await;
    AuthRes {
        token: bearer.to_string(),
        account: account_res(account),
        view: view_name(view),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Not signed in")
    )
)]
/// Sign out and revoke the bearer token
///
/// The token is revoked even if the identity provider fails to end its session.
pub async fn logout(State(state): State<AppState>, caller: Caller) -> StatusCode {
    if let Err(e) = caller.session.logout().await {
        tracing::warn!(account_id = %caller.account.id, "identity provider sign-out failed: {e}");
    }
    state.revoke(&caller.bearer).await;
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current account and landing view", body = MeRes),
        (status = 401, description = "Not signed in")
    )
)]
/// Current account and the view the client should land on
pub async fn me(caller: Caller) -> Json<MeRes> {
    let view = landing_view(&caller.session.state()).unwrap_or(View::Login);
    Json(MeRes {
        account: account_res(&caller.account),
        view: view_name(view),
    })
}

/// Applies the admin panel guard to the caller's session.
fn require_admin_panel(caller: &Caller) -> ApiResult<()> {
    match admin_route(&caller.session.state()) {
        Some(RouteDecision::Allow) => Ok(()),
        Some(RouteDecision::Redirect(view)) => Err(ApiError::Forbidden(format!(
            "administrators only; continue at {}",
            view_name(view)
        ))),
        None => Err(ApiError::Unauthorized),
    }
}

#[utoipa::path(
    get,
    path = "/templates",
    responses(
        (status = 200, description = "Template catalog", body = ListTemplatesRes),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Patients cannot read the catalog"),
        (status = 500, description = "Internal server error")
    )
)]
/// List every diagnosis template
pub async fn list_templates(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<ListTemplatesRes>> {
    let templates = state.catalog().list(&caller.account).await?;
    Ok(Json(ListTemplatesRes {
        templates: templates.iter().map(template_res).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/templates",
    request_body = TemplateReq,
    responses(
        (status = 201, description = "Template created", body = TemplateRes),
        (status = 400, description = "Blank template name"),
        (status = 403, description = "Administrators only"),
        (status = 500, description = "Internal server error")
    )
)]
/// Create a template from a complete draft
pub async fn create_template(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<TemplateReq>,
) -> ApiResult<(StatusCode, Json<TemplateRes>)> {
    require_admin_panel(&caller)?;
    let mut draft = template_draft(req);
    let template = state.catalog().submit(&caller.account, &mut draft).await?;
    Ok((StatusCode::CREATED, Json(template_res(&template))))
}

#[utoipa::path(
    put,
    path = "/templates/{id}",
    request_body = TemplateReq,
    params(("id" = String, Path, description = "Template id")),
    responses(
        (status = 200, description = "Template replaced", body = TemplateRes),
        (status = 400, description = "Blank template name"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "Template not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Replace a template's whole body
pub async fn update_template(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<TemplateReq>,
) -> ApiResult<Json<TemplateRes>> {
    require_admin_panel(&caller)?;
    let id = DocumentId::parse(&id)?;
    let draft = template_draft(req);
    let template = state
        .catalog()
        .replace(&caller.account, &id, draft.body().clone())
        .await?;
    Ok(Json(template_res(&template)))
}

#[utoipa::path(
    delete,
    path = "/templates/{id}",
    params(("id" = String, Path, description = "Template id")),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 403, description = "Administrators only"),
        (status = 500, description = "Internal server error")
    )
)]
/// Delete a template
///
/// Diagnoses written from the template are kept.
pub async fn delete_template(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    require_admin_panel(&caller)?;
    let id = DocumentId::parse(&id)?;
    state.catalog().delete(&caller.account, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/patients",
    responses(
        (status = 200, description = "Patient directory", body = ListPatientsRes),
        (status = 403, description = "Doctors only"),
        (status = 500, description = "Internal server error")
    )
)]
/// List patient accounts
pub async fn list_patients(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<ListPatientsRes>> {
    let patients = state.patients().list(&caller.account).await?;
    Ok(Json(ListPatientsRes {
        patients: patients.iter().map(account_res).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/diagnoses",
    params(("id" = String, Path, description = "Patient account id")),
    responses(
        (status = 200, description = "Resolved diagnosis history, newest first", body = HistoryRes),
        (status = 403, description = "Not a doctor and not the patient"),
        (status = 500, description = "Internal server error")
    )
)]
/// A patient's resolved diagnosis history
pub async fn patient_history(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<HistoryRes>> {
    let patient_id = DocumentId::parse(&id)?;
    let history = state.history().view(&caller.account, &patient_id).await?;
    Ok(Json(HistoryRes {
        diagnoses: history
            .iter()
            .map(|entry| diagnosis_res(entry, &caller.account))
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/diagnoses",
    request_body = SubmitDiagnosisReq,
    responses(
        (status = 201, description = "Diagnosis recorded", body = SubmitDiagnosisRes),
        (status = 400, description = "Missing or invalid selection"),
        (status = 403, description = "Doctors only"),
        (status = 404, description = "Unknown patient or template"),
        (status = 500, description = "Internal server error")
    )
)]
/// Record a diagnosis
///
/// Runs one pass of the authoring workflow for the given patient and template: select
/// symptoms, diagnostics and treatment, then submit. Only the patient and template are
/// read; the patient's history is not fetched.
pub async fn submit_diagnosis(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<SubmitDiagnosisReq>,
) -> ApiResult<(StatusCode, Json<SubmitDiagnosisRes>)> {
    let patient_id = DocumentId::parse(&req.patient_id)?;
    let template_id = DocumentId::parse(&req.template_id)?;

    let mut authoring = AuthoringSession::open_for_submission(
        state.cfg(),
        state.store(),
        caller.account,
        &patient_id,
        &template_id,
    )
    .await?;
    for symptom in &req.symptoms {
        if !authoring.selection().symptoms.contains(symptom) {
            authoring.toggle_symptom(symptom)?;
        }
    }
    for diagnostic in &req.diagnostics {
        if !authoring.selection().diagnostics.contains(diagnostic) {
            authoring.toggle_diagnostic(diagnostic)?;
        }
    }
    if !req.treatment.is_empty() {
        authoring.select_treatment(&req.treatment)?;
    }

    let record = authoring.submit().await?;
    authoring.close();
    Ok((
        StatusCode::CREATED,
        Json(SubmitDiagnosisRes {
            id: record.id.to_string(),
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/diagnoses/{id}",
    params(("id" = String, Path, description = "Diagnosis id")),
    responses(
        (status = 204, description = "Diagnosis deleted"),
        (status = 403, description = "Only the authoring doctor may delete"),
        (status = 404, description = "Diagnosis not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Delete a diagnosis written by the caller
pub async fn delete_diagnosis(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = DocumentId::parse(&id)?;
    state.history().delete_by_id(&caller.account, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
