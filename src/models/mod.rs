pub mod auth;
pub mod kyc;
pub mod package;
pub mod risk_parameter;
