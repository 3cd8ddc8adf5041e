use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Body of `POST /chat`. Keys are optional on the wire so that a missing key
/// is reported as invalid input instead of a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: Option<String>,
    pub user_data: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Body of `POST /ecg` and `POST /model`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportRequest {
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub prediction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Response languages supported by the triage chat. Codes are matched exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum Language {
    #[strum(serialize = "en")]
    English,
    #[strum(serialize = "hi")]
    Hindi,
    #[strum(serialize = "mr")]
    Marathi,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Marathi => "Marathi",
        }
    }
}

/// Which of the three services a process exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ServiceKind {
    Chat,
    Ecg,
    Xray,
    All,
}

impl ServiceKind {
    pub fn serves(&self, other: ServiceKind) -> bool {
        *self == ServiceKind::All || *self == other
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ServiceKind::Chat | ServiceKind::All => 8000,
            ServiceKind::Ecg => 8001,
            ServiceKind::Xray => 8002,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn language_codes_are_exact() {
        assert_eq!(Language::from_str("hi"), Ok(Language::Hindi));
        assert_eq!(Language::Marathi.to_string(), "mr");
        assert!(Language::from_str("EN").is_err());
        assert!(Language::from_str("fr").is_err());
    }

    #[test]
    fn service_all_serves_everything() {
        assert!(ServiceKind::All.serves(ServiceKind::Ecg));
        assert!(ServiceKind::Xray.serves(ServiceKind::Xray));
        assert!(!ServiceKind::Chat.serves(ServiceKind::Xray));
        assert_eq!(ServiceKind::from_str("xray"), Ok(ServiceKind::Xray));
        assert_eq!(ServiceKind::Ecg.default_port(), 8001);
    }
}
