//! Session input and output

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::prompts::KnownInfo;
use crate::schema::{Record, Schema};

/// What a session researches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Subject {
    /// Look up one field (`target`) given whatever is already known.
    Target {
        input_info: Map<String, Value>,
        target: String,
    },
    /// Fill the fixed company profile.
    Company { company_name: String },
}

/// Caller-supplied input of one research session.
///
/// Serialises as `{"company_name": ..}` or `{"input_info": {..}, "target": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RunRequest {
    pub subject: Subject,
}

impl RunRequest {
    pub fn company(company_name: impl Into<String>) -> Self {
        Self {
            subject: Subject::Company {
                company_name: company_name.into(),
            },
        }
    }

    pub fn target(input_info: Map<String, Value>, target: impl Into<String>) -> Self {
        Self {
            subject: Subject::Target {
                input_info,
                target: target.into(),
            },
        }
    }

    /// The schema the session must fill.
    pub fn schema(&self) -> Result<Schema, SchemaError> {
        match &self.subject {
            Subject::Company { .. } => Ok(Schema::company()),
            Subject::Target { target, .. } => Schema::single_field(target),
        }
    }

    pub fn known_info(&self) -> KnownInfo<'_> {
        match &self.subject {
            Subject::Company { company_name } => KnownInfo::CompanyName(company_name),
            Subject::Target { input_info, .. } => KnownInfo::Fields(input_info),
        }
    }

    /// Short description for logs.
    pub fn label(&self) -> String {
        match &self.subject {
            Subject::Company { company_name } => company_name.clone(),
            Subject::Target { input_info, target } => match input_info.get("target").and_then(Value::as_str) {
                Some(entity) => format!("{} ({})", entity, target),
                None => target.clone(),
            },
        }
    }

    /// Shape the accepted record into the caller-facing output.
    pub fn finish(&self, record: Record) -> ResearchOutput {
        match &self.subject {
            Subject::Company { .. } => ResearchOutput::Info { info: record },
            Subject::Target { target, .. } => ResearchOutput::Output {
                output: record.take(target).unwrap_or(Value::Null),
            },
        }
    }
}

/// Result of a finished session.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResearchOutput {
    Info { info: Record },
    Output { output: Value },
}

impl ResearchOutput {
    /// The value as plain text, for table cells and terminal output.
    pub fn as_text(&self) -> String {
        match self {
            ResearchOutput::Output { output: Value::String(s) } => s.clone(),
            ResearchOutput::Output { output } => output.to_string(),
            ResearchOutput::Info { info } => serde_json::to_value(info)
                .map(|v| v.to_string())
                .unwrap_or_default(),
        }
    }
}
