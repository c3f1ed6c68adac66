//! 外部チェッカーへの検証クライアント
//!
//! 通知されたIDごとに `GET <checker>/objects/{id}` を発行し、
//! バッチ全体の期限内に得られた結果だけを返す。

mod client;

pub use client::{ProbeError, VerificationClient};
