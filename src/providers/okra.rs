use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{malformed, non_empty, KycProvider, ProviderKind};
use crate::config::OkraConfig;
use crate::errors::Result;
use crate::models::kyc::{EmploymentInfo, ProviderCallback};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Source {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Details {
    source: Source,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PastThreeMonths {
    average_per_month: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct History {
    past_three_months: PastThreeMonths,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OtherStreams {
    details: Details,
    history: History,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Income {
    other_streams: OtherStreams,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IncomeCallback {
    customer_bvn: String,
    income: Income,
}

/// Employment checks for Nigerian applicants, correlated by BVN.
pub struct OkraProvider {
    config: OkraConfig,
}

impl OkraProvider {
    pub fn new(config: OkraConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl KycProvider for OkraProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Okra
    }

    async fn create_link(&self, _submission_id: &Uuid, _first_name: &str, _last_name: &str) -> Result<String> {
        Ok(self.config.link_url.clone())
    }

    async fn parse_callback(&self, body: &[u8]) -> Result<ProviderCallback> {
        let raw: Value = serde_json::from_slice(body).map_err(|e| malformed(self.kind(), e))?;
        let callback: IncomeCallback = serde_json::from_value(raw.clone()).map_err(|e| malformed(self.kind(), e))?;

        if callback.customer_bvn.trim().is_empty() {
            info!(action = "okra_callback_without_bvn");
            return Ok(ProviderCallback::empty());
        }

        let streams = callback.income.other_streams;
        let average = streams.history.past_three_months.average_per_month;

        Ok(ProviderCallback {
            id_number: Some(callback.customer_bvn),
            employment_info: Some(EmploymentInfo {
                kyc_submission_id: Uuid::nil(),
                employer_name: non_empty(streams.details.source.kind),
                average_salary: average,
                employment_status: average > 0.0,
                provider_response: raw,
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> OkraProvider {
        OkraProvider::new(OkraConfig {
            link_url: "https://app.okra.ng/test".to_string(),
        })
    }

    #[tokio::test]
    async fn test_income_callback() {
        let body = json!({
            "customerBvn": "22212345678",
            "income": {
                "other_streams": {
                    "details": { "source": { "type": "Salary - Dangote Group" } },
                    "history": { "past_three_months": { "average_per_month": 350000.0, "occurrence": 3 } }
                }
            }
        });

        let callback = provider().parse_callback(body.to_string().as_bytes()).await.unwrap();
        assert_eq!(callback.id_number.as_deref(), Some("22212345678"));
        assert_eq!(callback.kinds().len(), 1);

        let employment = callback.employment_info.unwrap();
        assert_eq!(employment.average_salary, 350000.0);
        assert!(employment.employment_status);
        assert_eq!(employment.employer_name.as_deref(), Some("Salary - Dangote Group"));
        assert_eq!(employment.provider_response["customerBvn"], "22212345678");
    }

    #[tokio::test]
    async fn test_no_income_means_unemployed() {
        let body = json!({ "customerBvn": "22212345678" });
        let callback = provider().parse_callback(body.to_string().as_bytes()).await.unwrap();
        let employment = callback.employment_info.unwrap();
        assert_eq!(employment.average_salary, 0.0);
        assert!(!employment.employment_status);
    }

    #[tokio::test]
    async fn test_missing_bvn_is_unrecognized() {
        let callback = provider().parse_callback(b"{}").await.unwrap();
        assert!(callback.is_unrecognized());
    }

    #[tokio::test]
    async fn test_static_link() {
        let link = provider().create_link(&Uuid::new_v4(), "", "").await.unwrap();
        assert_eq!(link, "https://app.okra.ng/test");
    }
}
