//! Mapping between core types and wire DTOs.

use api_shared::{
    AccountRes, DiagnosisRes, MethodDto, SymptomDto, TemplateReq, TemplateRes, TreatmentDto,
};
use portal_core::{
    Account, DiagnosisTemplate, MethodEntry, ResolvedDiagnosis, SymptomEntry, TemplateDraft,
    TreatmentEntry, View,
};

pub fn account_res(account: &Account) -> AccountRes {
    AccountRes {
        id: account.id.to_string(),
        insurance_number: account.profile.insurance_number.to_string(),
        name: account.name().to_owned(),
        role: account.role().to_string(),
    }
}

pub fn view_name(view: View) -> String {
    match view {
        View::Login => "login",
        View::AdminPanel => "admin_panel",
        View::PatientProfile => "patient_profile",
        View::DoctorProfile => "doctor_profile",
    }
    .to_owned()
}

/// Builds a draft the way the admin form does: entries with a blank name are dropped.
pub fn template_draft(req: TemplateReq) -> TemplateDraft {
    let mut draft = TemplateDraft::new();
    draft.set_name(req.name);
    draft.set_icd_code(req.icd_code);
    draft.set_icd_link(req.icd_link);
    draft.set_description(req.description);
    for s in req.symptoms {
        draft.add_symptom(SymptomEntry::new(s.name, s.description));
    }
    for m in req.diagnostic_methods {
        draft.add_method(MethodEntry::new(m.name, m.description));
    }
    for t in req.treatments {
        draft.add_treatment(TreatmentEntry::new(t.name, t.description, t.recommendations));
    }
    draft
}

pub fn template_res(template: &DiagnosisTemplate) -> TemplateRes {
    let body = &template.body;
    TemplateRes {
        id: template.id.to_string(),
        name: body.name.clone(),
        icd_code: body.icd_code.clone(),
        icd_link: body.icd_link.clone(),
        description: body.description.clone(),
        symptoms: body
            .symptoms
            .iter()
            .map(|s| SymptomDto {
                name: s.name.clone(),
                description: s.description.clone(),
            })
            .collect(),
        diagnostic_methods: body
            .diagnostic_methods
            .iter()
            .map(|m| MethodDto {
                name: m.name.clone(),
                description: m.description.clone(),
            })
            .collect(),
        treatments: body
            .treatments
            .iter()
            .map(|t| TreatmentDto {
                name: t.name.clone(),
                description: t.description.clone(),
                recommendations: t.recommendations.clone(),
            })
            .collect(),
    }
}

pub fn diagnosis_res(entry: &ResolvedDiagnosis, viewer: &Account) -> DiagnosisRes {
    let body = &entry.record.body;
    DiagnosisRes {
        id: entry.id().to_string(),
        patient_id: body.patient_id.to_string(),
        doctor_id: body.doctor_id.as_ref().map(ToString::to_string),
        template_id: body.diagnosis_id.as_ref().map(ToString::to_string),
        template_name: entry.template_name().map(str::to_owned),
        doctor_name: entry.doctor_label().to_owned(),
        selected_symptoms: body.selected_symptoms.clone(),
        selected_diagnostics: body.selected_diagnostics.clone(),
        selected_treatment: body.selected_treatment.clone(),
        created_at: entry.created_at().map(|t| t.to_rfc3339()),
        can_delete: entry.delete_handle(viewer).is_some(),
    }
}
