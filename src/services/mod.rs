pub mod auth;
pub mod jwt;
pub mod kyc_service;
pub mod notification_service;
pub mod package_service;
pub mod risk;
pub mod risk_parameter_service;
pub mod storage;
