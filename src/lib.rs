//! Naver Cafe 検索結果クローラー
//!
//! - 検索結果ページを1ページずつたどって記事ロケーターを抽出
//! - 記事ごとにフィールドを段階的フォールバックで抽出
//! - レコード1件ごとにCSVへ逐次保存（中断しても直前までの結果が残る）
//! - 記事本文のHTMLスナップショットを個別ファイルにアーカイブ
//!
//! ブラウザの認証（手動ログイン）はコアの範囲外で、認証済みの
//! レンダリングセッションを受け取って動く。
//!
//! # 使用例
//!
//! ```rust,ignore
//! use cafe_crawler::{BrowserSession, CafeConfig, CafeCrawler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CafeConfig::new("https://cafe.naver.com/...&page={page}");
//!
//!     let mut session = BrowserSession::launch(&config).await.unwrap();
//!     session.open_login_page(&config.login_url).await.unwrap();
//!     // ここで操作者がログインを済ませるのを待つ
//!
//!     let mut crawler = CafeCrawler::new(config).unwrap();
//!     let summary = crawler.crawl(&mut session).await;
//!     println!("収集件数: {}", summary.record_count);
//! }
//! ```

pub mod cafe;
pub mod error;
pub mod service;
pub mod traits;

// 主要な型をリエクスポート
pub use cafe::{
    ArchiveWriter, ArticleRecord, BrowserSession, CafeConfig, CafeCrawler, CrawlSummary,
    ResultSink, TerminationCause,
};
pub use error::CrawlerError;
pub use service::{CrawlRequest, CrawlService};
pub use traits::CafeSession;
