pub mod chart_service;
pub mod email_service;
pub mod report_service;
pub mod storage_service;
pub mod tracker_service;
