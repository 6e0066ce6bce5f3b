use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{malformed, non_empty, KycProvider, ProviderKind};
use crate::config::IdenfyConfig;
use crate::errors::{AppError, Result};
use crate::models::kyc::{AddressInfo, PassportInfo, ProviderCallback};
use crate::services::storage::ObjectStorage;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest<'a> {
    client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
    documents: Vec<&'static str>,
    utility_bill: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    #[serde(default)]
    auth_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VerificationStatus {
    overall: String,
    suspicion_reasons: Vec<String>,
    deny_reasons: Vec<String>,
    auto_face: String,
    auto_document: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VerificationData {
    doc_number: String,
    doc_expiry: String,
    doc_nationality: String,
    doc_dob: String,
    doc_date_of_issue: String,
    doc_sex: String,
    birth_place: String,
    age_estimate: String,
    authority: String,
    full_name: String,
    address: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileUrls {
    #[serde(rename = "FACE")]
    face: String,
    #[serde(rename = "FRONT")]
    front: String,
    #[serde(rename = "UTILITY_BILL")]
    utility_bill: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VerificationCallback {
    #[serde(rename = "final")]
    is_final: bool,
    status: VerificationStatus,
    data: VerificationData,
    file_urls: FileUrls,
    client_id: String,
}

/// Overall verdict, then the detail codes that explain it, joined with `|`.
fn compose_status(status: &VerificationStatus) -> String {
    let mut parts = vec![status.overall.clone()];
    if status.overall.eq_ignore_ascii_case("approved") {
        parts.push(status.auto_face.clone());
        parts.push(status.auto_document.clone());
    } else {
        parts.extend(status.deny_reasons.iter().cloned());
        parts.extend(status.suspicion_reasons.iter().cloned());
    }
    parts.join("|")
}

/// Passport and proof-of-address checks.
pub struct IdenfyProvider {
    client: Client,
    config: IdenfyConfig,
    storage: Arc<dyn ObjectStorage>,
}

impl IdenfyProvider {
    pub fn new(client: Client, config: IdenfyConfig, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { client, config, storage }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Copies a provider-hosted file into our storage, keeping the provider URL if that fails.
    async fn rehost(&self, name: String, source_url: String) -> Option<String> {
        if source_url.is_empty() {
            return None;
        }
        match self.storage.upload(&name, &source_url).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(action = "idenfy_rehost_failed", file = %name, error = %e);
                Some(source_url)
            }
        }
    }
}

#[async_trait]
impl KycProvider for IdenfyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Idenfy
    }

    async fn create_link(&self, submission_id: &Uuid, first_name: &str, last_name: &str) -> Result<String> {
        let request = CreateSessionRequest {
            client_id: submission_id.to_string(),
            first_name: Some(first_name).filter(|n| !n.is_empty()),
            last_name: Some(last_name).filter(|n| !n.is_empty()),
            documents: vec!["PASSPORT"],
            utility_bill: true,
        };

        let response = self
            .client
            .post(format!("{}/api/v2/token", self.base()))
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .json(&request)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderError(format!(
                "failed to create Idenfy verification session: status code {}: {}",
                status.as_u16(),
                body
            )));
        }

        let session: SessionResponse = response.json().await?;
        if session.auth_token.is_empty() {
            return Err(AppError::ProviderError("Idenfy session has no auth token".to_string()));
        }

        Ok(format!("{}/api/v2/redirect?authToken={}", self.base(), session.auth_token))
    }

    async fn parse_callback(&self, body: &[u8]) -> Result<ProviderCallback> {
        let callback: VerificationCallback =
            serde_json::from_slice(body).map_err(|e| malformed(self.kind(), e))?;

        if !callback.is_final {
            info!(action = "idenfy_interim_callback_ignored", client_id = %callback.client_id);
            return Ok(ProviderCallback::empty());
        }

        let submission_id = match Uuid::parse_str(&callback.client_id) {
            Ok(id) => id,
            Err(_) => {
                warn!(action = "idenfy_unknown_client", client_id = %callback.client_id);
                return Ok(ProviderCallback::empty());
            }
        };

        let client_id = &callback.client_id;
        let files = callback.file_urls;
        let (front, face, utility_bill) = tokio::join!(
            self.rehost(format!("{}-passport-front", client_id), files.front),
            self.rehost(format!("{}-passport-face", client_id), files.face),
            self.rehost(format!("{}-utility-bill", client_id), files.utility_bill),
        );

        let data = callback.data;
        let passport_info = PassportInfo {
            kyc_submission_id: submission_id,
            status: compose_status(&callback.status),
            document_number: non_empty(data.doc_number),
            full_name: non_empty(data.full_name),
            sex: non_empty(data.doc_sex),
            nationality: non_empty(data.doc_nationality),
            date_of_birth: non_empty(data.doc_dob),
            date_of_issue: non_empty(data.doc_date_of_issue),
            expiry_date: non_empty(data.doc_expiry),
            birth_place: non_empty(data.birth_place),
            authority: non_empty(data.authority),
            age_estimate: non_empty(data.age_estimate),
            face_match: callback.status.auto_face == "FACE_MATCH",
            front_image_url: front,
            face_image_url: face,
        };

        let address_info = AddressInfo {
            kyc_submission_id: submission_id,
            address: non_empty(data.address),
            proof_of_address_url: utility_bill,
        };

        Ok(ProviderCallback {
            submission_id: Some(submission_id),
            passport_info: Some(passport_info),
            address_info: Some(address_info),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Uploads succeed unless the name contains `fail_on`.
    struct FakeStorage {
        fail_on: Option<&'static str>,
        uploaded: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStorage for FakeStorage {
        async fn upload(&self, name: &str, _source_url: &str) -> Result<String> {
            if self.fail_on.map_or(false, |f| name.contains(f)) {
                return Err(AppError::UploadError("bucket unavailable".to_string()));
            }
            self.uploaded.lock().unwrap().push(name.to_string());
            Ok(format!("https://storage.test/{}", name))
        }
    }

    fn provider(fail_on: Option<&'static str>) -> (IdenfyProvider, Arc<FakeStorage>) {
        let storage = Arc::new(FakeStorage {
            fail_on,
            uploaded: Mutex::new(Vec::new()),
        });
        let provider = IdenfyProvider::new(Client::new(), IdenfyConfig::default(), storage.clone());
        (provider, storage)
    }

    fn approved_body(client_id: &str) -> Vec<u8> {
        json!({
            "final": true,
            "status": {
                "overall": "APPROVED",
                "autoFace": "FACE_MATCH",
                "autoDocument": "DOC_VALIDATED",
                "denyReasons": [],
                "suspicionReasons": []
            },
            "data": {
                "docNumber": "A1234567",
                "docSex": "FEMALE",
                "docNationality": "ID",
                "docDob": "1990-01-01",
                "docExpiry": "2030-01-01",
                "fullName": "SITI RAHMA",
                "address": "Jl. Sudirman 1, Jakarta"
            },
            "fileUrls": {
                "FRONT": "https://idenfy.test/front.png",
                "FACE": "https://idenfy.test/face.png",
                "UTILITY_BILL": "https://idenfy.test/bill.pdf"
            },
            "clientId": client_id
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_approved_callback() {
        let (provider, storage) = provider(None);
        let id = Uuid::new_v4();

        let callback = provider.parse_callback(&approved_body(&id.to_string())).await.unwrap();
        assert_eq!(callback.submission_id, Some(id));

        let passport = callback.passport_info.unwrap();
        assert_eq!(passport.status, "APPROVED|FACE_MATCH|DOC_VALIDATED");
        assert!(passport.face_match);
        assert_eq!(passport.document_number.as_deref(), Some("A1234567"));
        assert_eq!(
            passport.front_image_url,
            Some(format!("https://storage.test/{}-passport-front", id))
        );

        let address = callback.address_info.unwrap();
        assert_eq!(address.address.as_deref(), Some("Jl. Sudirman 1, Jakarta"));
        assert_eq!(
            address.proof_of_address_url,
            Some(format!("https://storage.test/{}-utility-bill", id))
        );
        assert_eq!(storage.uploaded.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_denied_callback_lists_reasons() {
        let (provider, _) = provider(None);
        let body = json!({
            "final": true,
            "status": {
                "overall": "DENIED",
                "autoFace": "FACE_MISMATCH",
                "denyReasons": ["FACE_MISMATCH", "DOC_EXPIRED"],
                "suspicionReasons": ["FACE_SUSPECTED"]
            },
            "clientId": Uuid::new_v4().to_string()
        });

        let callback = provider.parse_callback(body.to_string().as_bytes()).await.unwrap();
        let passport = callback.passport_info.unwrap();
        assert_eq!(passport.status, "DENIED|FACE_MISMATCH|DOC_EXPIRED|FACE_SUSPECTED");
        assert!(!passport.face_match);
        assert_eq!(passport.front_image_url, None);
    }

    #[tokio::test]
    async fn test_rehost_failure_keeps_remote_url() {
        let (provider, _) = provider(Some("passport-face"));
        let id = Uuid::new_v4();

        let callback = provider.parse_callback(&approved_body(&id.to_string())).await.unwrap();
        let passport = callback.passport_info.unwrap();
        assert_eq!(passport.face_image_url.as_deref(), Some("https://idenfy.test/face.png"));
        assert_eq!(
            passport.front_image_url,
            Some(format!("https://storage.test/{}-passport-front", id))
        );
    }

    #[tokio::test]
    async fn test_interim_and_unknown_callbacks_are_empty() {
        let (provider, _) = provider(None);

        let interim = json!({ "final": false, "clientId": Uuid::new_v4().to_string() });
        let callback = provider.parse_callback(interim.to_string().as_bytes()).await.unwrap();
        assert!(callback.is_unrecognized());

        let unknown = json!({ "final": true, "clientId": "not-a-submission" });
        let callback = provider.parse_callback(unknown.to_string().as_bytes()).await.unwrap();
        assert!(callback.is_unrecognized());
        assert!(!callback.has_records());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (provider, _) = provider(None);
        let result = provider.parse_callback(b"not json").await;
        assert!(matches!(result, Err(AppError::ProviderError(_))));
    }
}
