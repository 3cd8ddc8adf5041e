use std::fmt;
use std::str::FromStr;

pub use shared::Language;

use crate::acquisition::ImageReference;
use crate::classifier::ClassificationResult;

/// Reply sent, with a success status, when the chat language is not supported.
pub const UNSUPPORTED_LANGUAGE_REPLY: &str = "Unsupported language.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

pub fn parse_language(code: &str) -> Result<Language, UnsupportedLanguage> {
    Language::from_str(code).map_err(|_| UnsupportedLanguage(code.to_string()))
}

/// Imaging modality a diagnostic report is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFamily {
    Ecg,
    Xray,
}

impl ReportFamily {
    fn role(&self) -> &'static str {
        match self {
            ReportFamily::Ecg => "an expert cardiologist analyzing ECG readings",
            ReportFamily::Xray => "an expert radiologist analyzing X-ray images",
        }
    }

    pub fn modality(&self) -> &'static str {
        match self {
            ReportFamily::Ecg => "ECG",
            ReportFamily::Xray => "X-ray",
        }
    }
}

/// The single instruction string sent to the generative model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPrompt(String);

impl CompiledPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompiledPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn compile_triage(language: Language, user_data: &str, prompt: &str) -> CompiledPrompt {
    let body = match language {
        Language::English => format!(
            "You will receive the user's medical history: {user_data}\n\
             You are a professional doctor. Assist the user with their basic questions: {prompt}\n\n\
             If the user mentions symptoms like cough, fever, or any other illness, provide advice \
             on possible home remedies, and suggest basic steps to take at home. You should not \
             diagnose but rather offer helpful tips to manage the symptoms. Answer professionally \
             and very briefly. Remind the user to consult a healthcare professional if the \
             symptoms persist."
        ),
        Language::Hindi => format!(
            "उपयोगकर्ता की चिकित्सा इतिहास प्राप्त होगा: {user_data}\n\
             आप एक पेशेवर डॉक्टर हैं, उपयोगकर्ता के सामान्य सवालों में सहायता करें: {prompt}\n\n\
             यदि उपयोगकर्ता खांसी, बुखार या अन्य किसी बीमारी के लक्षणों का उल्लेख करता है, तो घर के इलाज \
             के लिए सलाह दें, और घर पर उठाए जाने वाले बुनियादी कदमों का सुझाव दें। आपको निदान नहीं करना \
             चाहिए, बल्कि लक्षणों को प्रबंधित करने के लिए सहायक सुझाव देना चाहिए। उपयोगकर्ता को याद \
             दिलाएं कि यदि लक्षण बने रहें, तो उन्हें स्वास्थ्य पेशेवर से परामर्श करना चाहिए।"
        ),
        Language::Marathi => format!(
            "उपयोगकर्त्याचा वैद्यकीय इतिहास मिळेल: {user_data}\n\
             तुम्ही एक व्यावसायिक डॉक्टर आहात, वापरकर्त्याच्या सामान्य प्रश्नांची उत्तरे द्या: {prompt}\n\n\
             जर वापरकर्त्याने खोकला, ताप किंवा इतर कोणत्याही आजाराच्या लक्षणांचा उल्लेख केला, तर \
             घरगुती उपचारांबद्दल सल्ला द्या आणि घरच्या घरी करण्यासाठी काही सोप्या उपायांचा सुचवणूक करा. \
             तुम्हाला निदान करू नये, तर लक्षणांचा व्यवस्थापन करण्यासाठी मदत करणारे टिप्स द्यावीत. जर \
             लक्षणे टिकली तर, वापरकर्त्याला आरोग्य तज्ञाशी सल्लामसलत करण्याची आठवण द्या."
        ),
    };
    CompiledPrompt(format!("Answer in {}.\n{}", language.name(), body))
}

pub fn compile_report(
    family: ReportFamily,
    result: &ClassificationResult,
    reference: &ImageReference,
) -> CompiledPrompt {
    let modality = family.modality();
    CompiledPrompt(format!(
        "You are {role}.\n\
         Keep the response within 5-6 lines.\n\n\
         Context:\n\
         - {modality} Analysis Result: {label}\n\
         - Patient {modality}: {reference}\n\n\
         Provide a concise analysis including:\n\
         - Diagnosis summary\n\
         - Key findings\n\
         - Immediate actions (if critical)\n\
         - Follow-up recommendations",
        role = family.role(),
        label = result.label,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triage_embeds_inputs_for_every_language() {
        for language in [Language::English, Language::Hindi, Language::Marathi] {
            let compiled = compile_triage(language, "no known conditions", "I have a cough");
            let text = compiled.as_str();
            assert!(text.contains("no known conditions"), "{language}");
            assert!(text.contains("I have a cough"), "{language}");
            assert!(text.starts_with(&format!("Answer in {}.", language.name())));
        }
    }

    #[test]
    fn hindi_triage_requests_hindi() {
        let compiled = compile_triage(Language::Hindi, "no known conditions", "I have a cough");
        assert!(compiled.as_str().contains("Answer in Hindi."));
        assert!(compiled.as_str().contains("पेशेवर डॉक्टर"));
    }

    #[test]
    fn english_triage_casts_a_doctor_without_diagnosis() {
        let text = compile_triage(Language::English, "asthma", "fever since monday").to_string();
        assert!(text.contains("You are a professional doctor."));
        assert!(text.contains("should not diagnose"));
    }

    #[test]
    fn triage_compilation_is_deterministic() {
        let a = compile_triage(Language::Marathi, "diabetes", "headache");
        let b = compile_triage(Language::Marathi, "diabetes", "headache");
        assert_eq!(a, b);
    }

    #[test]
    fn language_codes_parse_exactly() {
        assert_eq!(parse_language("mr"), Ok(Language::Marathi));
        assert_eq!(parse_language("fr"), Err(UnsupportedLanguage("fr".into())));
        assert!(parse_language("").is_err());
    }

    #[test]
    fn ecg_report_casts_cardiologist() {
        let result = ClassificationResult {
            label: "Abnormal Heartbeat".into(),
            confidence: 0.7,
        };
        let reference = ImageReference::parse("http://example.com/ecg.png");
        let text = compile_report(ReportFamily::Ecg, &result, &reference).to_string();
        assert!(text.contains("expert cardiologist"));
        assert!(text.contains("- ECG Analysis Result: Abnormal Heartbeat"));
        assert!(text.contains("- Patient ECG: http://example.com/ecg.png"));
        assert!(text.contains("Follow-up recommendations"));
    }

    #[test]
    fn xray_report_casts_radiologist() {
        let result = ClassificationResult {
            label: "Pneumonia".into(),
            confidence: 0.91,
        };
        let reference = ImageReference::parse("scans/chest.jpeg");
        let text = compile_report(ReportFamily::Xray, &result, &reference).to_string();
        assert!(text.contains("expert radiologist"));
        assert!(text.contains("- X-ray Analysis Result: Pneumonia"));
        assert!(text.contains("- Patient X-ray: scans/chest.jpeg"));
        assert!(!text.contains("cardiologist"));
    }
}
