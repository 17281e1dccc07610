mod client;

pub use client::{
    ApiClient, ApiResponse, MultipartForm, ProgressFn, RequestBody, RequestOptions,
};
pub use reqwest::Method;

/// エンドポイント
pub mod endpoints {
    pub const LIST_SHEETS: &str = "/listar-abas-excel";
    pub const VALIDATE_LAYOUT: &str = "/validar-layout";
    pub const VALIDATE_FILE: &str = "/validar-arquivo";

    pub fn download_report(timestamp: &str) -> String {
        format!("/download-relatorio/{}", timestamp)
    }
}
