//! レイアウト/データファイル検証クライアント
//!
//! 検証APIへのアップロード、結果のキャッシュ、レポート出力を行う。

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod storage;
pub mod upload;
pub mod workflow;
