pub mod audit_log;
pub mod health;
pub mod metrics;
pub mod ocr;
pub mod whitelist;
