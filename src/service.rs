use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::cafe::{BrowserSession, CafeConfig, CafeCrawler, CrawlSummary};
use crate::error::CrawlerError;

/// クロールリクエスト
///
/// ログイン不要のカフェを対象にした一括実行用。手動ログインの合図を
/// 挟みたい場合は [`CafeCrawler`] と [`BrowserSession`] を直接使う。
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub search_url_template: String,
    pub crawl_all_pages: bool,
    pub page_limit: u64,
    pub save_archives: bool,
    pub headless: bool,
}

impl CrawlRequest {
    pub fn new(search_url_template: impl Into<String>) -> Self {
        Self {
            search_url_template: search_url_template.into(),
            crawl_all_pages: true,
            page_limit: 3,
            save_archives: true,
            headless: true,
        }
    }

    pub fn with_page_limit(mut self, limit: u64) -> Self {
        self.crawl_all_pages = false;
        self.page_limit = limit;
        self
    }

    pub fn with_save_archives(mut self, save: bool) -> Self {
        self.save_archives = save;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

impl From<CrawlRequest> for CafeConfig {
    fn from(req: CrawlRequest) -> Self {
        CafeConfig {
            search_url_template: req.search_url_template,
            crawl_all_pages: req.crawl_all_pages,
            page_limit: req.page_limit,
            save_archives: req.save_archives,
            headless: req.headless,
            ..Default::default()
        }
    }
}

/// tower::Serviceを実装したクローラーサービス
#[derive(Debug, Clone, Default)]
pub struct CrawlService {
    // 将来的な拡張用（レートリミット、キャッシュなど）
}

impl CrawlService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<CrawlRequest> for CrawlService {
    type Response = CrawlSummary;
    type Error = CrawlerError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CrawlRequest) -> Self::Future {
        info!("クロールリクエスト受信: {}", req.search_url_template);

        Box::pin(async move {
            let config: CafeConfig = req.into();
            let mut crawler = CafeCrawler::new(config.clone())?;
            let mut session = BrowserSession::launch(&config).await?;

            let summary = crawler.crawl(&mut session).await;
            session.close().await?;

            info!(
                "クロール完了: {} 件, 終了理由: {}",
                summary.record_count, summary.termination
            );
            Ok(summary)
        })
    }
}
