//! Per-template output JSON Schemas.
//!
//! Each template's schema is compiled once and cached. Validation happens
//! before any output is accepted into an artifact; a clinical pipeline must
//! never proceed on a phantom analysis.

use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::{Value, json};

use crate::types::{OracleError, TemplateId};

fn video_analysis_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["observations", "strengths", "coverage"],
        "properties": {
            "observations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["text", "domain", "polarity"],
                    "properties": {
                        "text": { "type": "string", "minLength": 1 },
                        "domain": {},
                        "polarity": { "enum": ["strength", "challenge"] },
                        "frequency": {
                            "enum": ["never", "rarely", "sometimes", "often", "always"]
                        },
                        "evidence_ref": { "type": "string" }
                    }
                }
            },
            "strengths": {
                "type": "array",
                "items": { "type": "string", "minLength": 1 },
                "minItems": 2
            },
            "coverage": {
                "enum": ["captured", "partially_captured", "not_captured"]
            }
        }
    })
}

fn integration_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["narrative"],
        "properties": {
            "narrative": { "type": "string", "minLength": 1 }
        }
    })
}

fn clarification_drafting_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["questions"],
        "properties": {
            "questions": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["id", "text"],
                    "properties": {
                        "id": { "type": "string", "minLength": 1 },
                        "text": { "type": "string", "minLength": 1 }
                    }
                }
            }
        }
    })
}

fn clarification_integration_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["interpretations"],
        "properties": {
            "interpretations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["record_id", "resolution", "text"],
                    "properties": {
                        "record_id": { "type": "string", "minLength": 1 },
                        "resolution": {
                            "enum": [
                                "context_difference",
                                "parent_confirmed",
                                "contradiction_unexplained"
                            ]
                        },
                        "text": { "type": "string", "minLength": 1 }
                    }
                }
            }
        }
    })
}

fn report_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["report"],
        "properties": {
            "report": { "type": "string", "minLength": 1 }
        }
    })
}

fn validator_for(template: TemplateId) -> &'static Validator {
    static VALIDATORS: OnceLock<[Validator; 5]> = OnceLock::new();
    let validators = VALIDATORS.get_or_init(|| {
        let compile = |schema: Value| {
            jsonschema::validator_for(&schema).expect("template schema is valid JSON Schema")
        };
        [
            compile(video_analysis_schema()),
            compile(integration_schema()),
            compile(clarification_drafting_schema()),
            compile(clarification_integration_schema()),
            compile(report_schema()),
        ]
    });
    match template {
        TemplateId::VideoAnalysis => &validators[0],
        TemplateId::Integration => &validators[1],
        TemplateId::ClarificationDrafting => &validators[2],
        TemplateId::ClarificationIntegration => &validators[3],
        TemplateId::Report => &validators[4],
    }
}

/// Validate Oracle output against the template's declared schema.
///
/// # Errors
///
/// Returns `OracleError::ContractViolation` naming the first violating
/// instance path. Null or empty-object output fails the required-property
/// checks like any other invalid payload.
pub fn validate_output(template: TemplateId, output: &Value) -> Result<(), OracleError> {
    if let Some(err) = validator_for(template).iter_errors(output).next() {
        return Err(OracleError::ContractViolation {
            template,
            reason: format!("{} (at {})", err, err.instance_path()),
        });
    }
    Ok(())
}
