//! Threshold classification for financial and employment data.
//!
//! Everything here is pure: the engine feeds in a record and the owning
//! organization's [`RiskParameter`] and gets the record back with its risk
//! fields filled in.

use crate::models::kyc::{BankInfo, EmploymentInfo, RiskLevel};
use crate::models::risk_parameter::RiskParameter;

/// `Low Risk` iff `value >= threshold`. A value that is not a number never meets a threshold.
pub fn classify_threshold(value: f64, threshold: f64) -> RiskLevel {
    if value >= threshold {
        RiskLevel::Low
    } else {
        RiskLevel::High
    }
}

/// `High Risk` only when the organization requires employment and the applicant has none.
pub fn classify_employment(requires_employment: bool, employed: bool) -> RiskLevel {
    if requires_employment && !employed {
        RiskLevel::High
    } else {
        RiskLevel::Low
    }
}

pub fn assess_bank_info(mut info: BankInfo, params: &RiskParameter) -> BankInfo {
    info.account_balance_risk_level = Some(classify_threshold(info.balance, params.account_balance));
    info
}

pub fn assess_employment_info(mut info: EmploymentInfo, params: &RiskParameter) -> EmploymentInfo {
    info.average_salary_risk_level = Some(classify_threshold(info.average_salary, params.average_salary));
    info.employment_risk_level = Some(classify_employment(params.employment_status, info.employment_status));
    info
}
