use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::{malformed, non_empty, KycProvider, ProviderKind};
use crate::config::CreditChekConfig;
use crate::errors::{AppError, Result};
use crate::models::kyc::{BankInfo, EmploymentInfo, ProviderCallback};

const INCOME_TRANSACTION_EVENT: &str = "income_transaction";
const PDF_UPLOAD_EVENT: &str = "pdf_upload";

#[derive(Debug, Deserialize)]
struct CallbackEvent {
    #[serde(default)]
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IncomeTransaction {
    success: bool,
    bvn: String,
    account_number: String,
    account_name: String,
    bank_name: String,
    balance: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PdfUpload {
    success: bool,
    bvn: String,
    borrower_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Edti {
    average_monthly_income: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InsightData {
    #[serde(rename = "EDTI")]
    edti: Edti,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IncomeInsight {
    data: InsightData,
}

/// Bank-statement income checks for Nigerian applicants. Callbacks carry the
/// applicant's BVN rather than our submission id.
pub struct CreditChekProvider {
    client: Client,
    config: CreditChekConfig,
}

impl CreditChekProvider {
    pub fn new(client: Client, config: CreditChekConfig) -> Self {
        Self { client, config }
    }

    async fn average_monthly_income(&self, borrower_id: &str) -> Result<f64> {
        let url = format!(
            "{}/income/insight-data/{}",
            self.config.base_url.trim_end_matches('/'),
            borrower_id
        );
        let insight: IncomeInsight = self
            .client
            .get(&url)
            .header("token", &self.config.public_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let raw = insight.data.edti.average_monthly_income;
        raw.trim()
            .parse()
            .map_err(|_| AppError::ProviderError(format!("invalid average monthly income: {:?}", raw)))
    }

    fn income_transaction(&self, data: Value) -> Result<ProviderCallback> {
        let tx: IncomeTransaction = serde_json::from_value(data.clone()).map_err(|e| malformed(self.kind(), e))?;
        if !tx.success || tx.bvn.is_empty() {
            return Ok(ProviderCallback::empty());
        }

        Ok(ProviderCallback {
            bank_info: Some(BankInfo {
                kyc_submission_id: Uuid::nil(),
                account_holder: non_empty(tx.account_name),
                bank_name: non_empty(tx.bank_name),
                account_number: non_empty(tx.account_number),
                balance: tx.balance,
                account_balance_risk_level: None,
                provider_response: data,
            }),
            id_number: Some(tx.bvn),
            ..Default::default()
        })
    }

    async fn pdf_upload(&self, data: Value) -> Result<ProviderCallback> {
        let upload: PdfUpload = serde_json::from_value(data.clone()).map_err(|e| malformed(self.kind(), e))?;
        if !upload.success || upload.bvn.is_empty() {
            return Ok(ProviderCallback::empty());
        }

        let employment_info = match self.average_monthly_income(&upload.borrower_id).await {
            Ok(average) => Some(EmploymentInfo {
                kyc_submission_id: Uuid::nil(),
                average_salary: average,
                employment_status: average > 0.0,
                provider_response: data,
                ..Default::default()
            }),
            Err(e) => {
                warn!(action = "creditchek_income_insight_failed", borrower_id = %upload.borrower_id, error = %e);
                None
            }
        };

        Ok(ProviderCallback {
            id_number: Some(upload.bvn),
            employment_info,
            ..Default::default()
        })
    }
}

#[async_trait]
impl KycProvider for CreditChekProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CreditChek
    }

    /// Onboarding is hosted by the provider; the link is the same for every applicant.
    async fn create_link(&self, _submission_id: &Uuid, _first_name: &str, _last_name: &str) -> Result<String> {
        Ok(self.config.onboarding_url.clone())
    }

    async fn parse_callback(&self, body: &[u8]) -> Result<ProviderCallback> {
        let event: CallbackEvent = serde_json::from_slice(body).map_err(|e| malformed(self.kind(), e))?;

        match event.event.as_str() {
            INCOME_TRANSACTION_EVENT => self.income_transaction(event.data),
            PDF_UPLOAD_EVENT => self.pdf_upload(event.data).await,
            other => {
                info!(action = "creditchek_event_ignored", event = %other);
                Ok(ProviderCallback::empty())
            }
        }
    }
}
