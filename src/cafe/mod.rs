//! Naver Cafe 検索結果クローラーモジュール
//!
//! 検索結果を1ページずつたどり、記事ごとにフィールドを抽出して
//! CSVと記事別HTMLアーカイブに逐次保存する

mod archive;
mod crawler;
mod extract;
mod session;
mod sink;
mod types;

pub use archive::ArchiveWriter;
pub use crawler::CafeCrawler;
pub use extract::{
    extract_archive_title, extract_locators, extract_record, post_number_from_locator,
    SelectorStrategy, MAX_COMMENTS,
};
pub use session::BrowserSession;
pub use sink::ResultSink;
pub use types::{ArticleRecord, CafeConfig, CrawlSummary, TerminationCause};
