//! Layout Validator Common Library
//!
//! 検証APIクライアントとCLIで共有される型とレポート生成

pub mod types;
pub mod error;
pub mod report;
pub mod export;

pub use types::{
    ErrorRecord, HistoryEntry, LayoutSummary, ReportData, ValidationOutcome, ValidationResult,
    ValidationStats, SAVED_AT_FIELD,
};
pub use error::{Error, Result};
pub use report::{build_csv, build_text, remote_report_file_name, report_file_name, ReportFormat};
#[cfg(feature = "excel")]
pub use report::build_excel;
