pub mod ai_service;
pub mod candidate_service;
pub mod exam_score_service;
pub mod field_extractor;
pub mod form_client;
pub mod import_service;
pub mod ingestion_service;
pub mod name_matcher;
pub mod notification_service;
pub mod requirements_service;
pub mod resolver;
