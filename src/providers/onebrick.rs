use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::{malformed, non_empty, KycProvider, ProviderKind};
use crate::config::OneBrickConfig;
use crate::errors::{AppError, Result};
use crate::models::kyc::{BankInfo, EmploymentInfo, ProviderCallback};

const NO_TOKEN_IN_RESPONSE: &str = "no token found in the response";

#[derive(Debug, Default, Deserialize)]
struct TokenData {
    #[serde(default)]
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    data: TokenData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackEntry {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    user_id: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Balances {
    #[serde(default)]
    available: f64,
    #[serde(default)]
    current: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    #[serde(default)]
    account_holder: String,
    #[serde(default)]
    account_number: String,
    #[serde(default)]
    bank_name: Option<String>,
    #[serde(default)]
    balances: Balances,
}

#[derive(Debug, Deserialize)]
struct AccountList {
    #[serde(default)]
    data: Vec<Account>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SalaryRecord {
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    salary: String,
    #[serde(default)]
    month_name: String,
}

#[derive(Debug, Deserialize)]
struct SalaryList {
    #[serde(default)]
    data: Vec<SalaryRecord>,
}

/// Employer name (last non-blank one wins) and the mean salary rounded to cents.
fn summarize_salaries(records: &[SalaryRecord]) -> Result<(Option<String>, f64)> {
    if records.is_empty() {
        return Err(AppError::ProviderError("no salary records".to_string()));
    }

    let mut employer = None;
    let mut total = 0.0;
    for record in records {
        let salary: f64 = record
            .salary
            .trim()
            .parse()
            .map_err(|_| AppError::ProviderError(format!("invalid salary value: {}", record.salary)))?;
        if !record.company_name.is_empty() {
            employer = Some(record.company_name.clone());
        }
        total += salary;
    }

    let average = total / records.len() as f64;
    Ok((employer, (average * 100.0).round() / 100.0))
}

/// Bank account and salary data for Indonesian applicants.
pub struct OneBrickProvider {
    client: Client,
    config: OneBrickConfig,
}

impl OneBrickProvider {
    pub fn new(client: Client, config: OneBrickConfig) -> Self {
        Self { client, config }
    }

    async fn request<T: DeserializeOwned>(&self, path: &str, auth: String) -> Result<T> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, auth)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = body.get("message").cloned().unwrap_or_default();
            return Err(AppError::ProviderError(format!("error fetching {}: {}", url, message)));
        }

        Ok(response.json().await?)
    }

    async fn fetch_public_access_token(&self) -> Result<String> {
        let credentials = general_purpose::STANDARD
            .encode(format!("{}:{}", self.config.client_id, self.config.client_secret));
        let token: TokenResponse = self.request("auth/token", format!("Basic {}", credentials)).await?;

        if token.data.access_token.is_empty() {
            return Err(AppError::ProviderError(NO_TOKEN_IN_RESPONSE.to_string()));
        }
        Ok(token.data.access_token)
    }

    async fn bank_info(&self, submission_id: Uuid, user_token: &str) -> Result<Option<BankInfo>> {
        let accounts: AccountList = self.request("account/list", format!("Bearer {}", user_token)).await?;
        let account = match accounts.data.into_iter().next() {
            Some(account) => account,
            None => return Ok(None),
        };

        Ok(Some(BankInfo {
            kyc_submission_id: submission_id,
            balance: account.balances.current,
            provider_response: serde_json::to_value(&account)?,
            account_holder: non_empty(account.account_holder),
            account_number: non_empty(account.account_number),
            bank_name: account.bank_name,
            account_balance_risk_level: None,
        }))
    }

    async fn employment_info(&self, submission_id: Uuid, user_token: &str) -> Result<EmploymentInfo> {
        let salaries: SalaryList = self.request("income/salary", format!("Bearer {}", user_token)).await?;
        let (employer_name, average_salary) = summarize_salaries(&salaries.data)?;

        Ok(EmploymentInfo {
            kyc_submission_id: submission_id,
            employer_name,
            average_salary,
            employment_status: average_salary > 0.0,
            provider_response: serde_json::to_value(&salaries.data)?,
            ..Default::default()
        })
    }
}

#[async_trait]
impl KycProvider for OneBrickProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OneBrick
    }

    async fn create_link(&self, submission_id: &Uuid, _first_name: &str, _last_name: &str) -> Result<String> {
        let token = self.fetch_public_access_token().await?;
        let user_id = submission_id.to_string();
        let url = Url::parse_with_params(
            &self.config.widget_url,
            &[
                ("accessToken", token.as_str()),
                ("redirect_url", self.config.redirect_url.as_str()),
                ("user_id", user_id.as_str()),
            ],
        )
        .map_err(|e| AppError::ConfigurationError(format!("Invalid ONEBRICK_WIDGET_URL: {}", e)))?;

        Ok(url.to_string())
    }

    async fn parse_callback(&self, body: &[u8]) -> Result<ProviderCallback> {
        let entries: Vec<CallbackEntry> = serde_json::from_slice(body).map_err(|e| malformed(self.kind(), e))?;
        let entry = match entries.into_iter().next() {
            Some(entry) => entry,
            None => return Ok(ProviderCallback::empty()),
        };

        let submission_id = match Uuid::parse_str(&entry.user_id) {
            Ok(id) => id,
            Err(_) => {
                warn!(action = "onebrick_unknown_user", user_id = %entry.user_id);
                return Ok(ProviderCallback::empty());
            }
        };

        let (bank, employment) = tokio::join!(
            self.bank_info(submission_id, &entry.access_token),
            self.employment_info(submission_id, &entry.access_token),
        );

        let bank_info = bank.unwrap_or_else(|e| {
            warn!(action = "onebrick_account_fetch_failed", submission_id = %submission_id, error = %e);
            None
        });
        let employment_info = employment
            .map_err(|e| {
                warn!(action = "onebrick_salary_fetch_failed", submission_id = %submission_id, error = %e);
            })
            .ok();

        Ok(ProviderCallback {
            submission_id: Some(submission_id),
            bank_info,
            employment_info,
            ..Default::default()
        })
    }
}
