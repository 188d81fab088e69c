//! chromiumoxide による [`CafeSession`] 実装
//!
//! ブラウザの起動とログイン画面への遷移まで面倒を見る。認証そのもの
//! （操作者の手動ログインと完了合図）はコアの範囲外で、呼び出し側が行う。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info};

use super::types::CafeConfig;
use crate::error::CrawlerError;
use crate::traits::CafeSession;

/// body出現待機のポーリング間隔
const BODY_POLL_INTERVAL_MS: u64 = 500;

/// cafe_main iframe があればその内容、なければトップレベルのHTMLを返す。
/// iframe は contentDocument 越しに読むだけで、閲覧コンテキストの
/// 切り替えは発生しない。
const ARTICLE_DOCUMENT_SCRIPT: &str = r#"
    (function() {
        var frame = document.getElementsByName('cafe_main')[0]
            || document.getElementById('cafe_main');
        if (frame && frame.contentDocument && frame.contentDocument.documentElement) {
            return frame.contentDocument.documentElement.outerHTML;
        }
        return document.documentElement.outerHTML;
    })()
"#;

pub struct BrowserSession {
    browser: Option<Browser>,
    page: Option<Page>,
    debug: bool,
}

impl BrowserSession {
    /// ブラウザを起動し、空ページを開いた状態のセッションを返す
    pub async fn launch(config: &CafeConfig) -> Result<Self, CrawlerError> {
        info!("ブラウザを初期化中...");

        let mut builder = BrowserConfig::builder()
            .window_size(1280, 900)
            .arg("--disable-blink-features=AutomationControlled");

        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| CrawlerError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CrawlerError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| CrawlerError::BrowserInit(e.to_string()))?;

        // 自動化検出対策: navigator.webdriver を隠す
        page.evaluate("Object.defineProperty(navigator, 'webdriver', {get: () => undefined})")
            .await
            .map_err(|e| CrawlerError::JavaScript(e.to_string()))?;

        info!("ブラウザ初期化完了");
        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            debug: config.debug,
        })
    }

    /// ログイン画面へ遷移する。ログイン完了の合図は呼び出し側が待つ
    pub async fn open_login_page(&mut self, login_url: &str) -> Result<(), CrawlerError> {
        let page = self.page()?;
        info!("ログインページへ遷移: {}", login_url);

        page.goto(login_url)
            .await
            .map_err(|e| CrawlerError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| CrawlerError::Navigation(e.to_string()))?;

        if self.debug {
            self.debug_screenshot("login").await;
        }
        Ok(())
    }

    /// リソース解放
    pub async fn close(&mut self) -> Result<(), CrawlerError> {
        info!("ブラウザを終了中...");
        self.page = None;
        self.browser = None;
        Ok(())
    }

    fn page(&self) -> Result<&Page, CrawlerError> {
        self.page
            .as_ref()
            .ok_or_else(|| CrawlerError::BrowserInit("ブラウザが初期化されていません".into()))
    }

    async fn debug_screenshot(&self, label: &str) {
        let Ok(page) = self.page() else {
            return;
        };
        if let Ok(screenshot) = page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
            debug!("{} screenshot: data:image/png;base64,{}", label, encoded);
        }
    }

    async fn evaluate_string(&self, script: &str) -> Result<String, CrawlerError> {
        let page = self.page()?;
        page.evaluate(script)
            .await
            .map_err(|e| CrawlerError::JavaScript(e.to_string()))?
            .into_value::<String>()
            .map_err(|e| CrawlerError::JavaScript(e.to_string()))
    }
}

#[async_trait]
impl CafeSession for BrowserSession {
    async fn is_alive(&mut self) -> bool {
        // 副作用のない現在位置の問い合わせ。失敗はすべて false に畳む
        let Ok(page) = self.page() else {
            return false;
        };
        match page.evaluate("window.location.href").await {
            Ok(result) => result.into_value::<String>().is_ok(),
            Err(_) => false,
        }
    }

    async fn goto(&mut self, url: &str) -> Result<(), CrawlerError> {
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| CrawlerError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_body(&mut self, timeout: Duration) -> Result<(), CrawlerError> {
        let page = self.page()?;
        let start = Instant::now();
        loop {
            let ready = page
                .evaluate("document.body !== null")
                .await
                .map(|v| v.into_value::<bool>().unwrap_or(false))
                .unwrap_or(false);
            if ready {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(CrawlerError::Timeout(format!(
                    "{}秒以内にbodyが出現しませんでした",
                    timeout.as_secs()
                )));
            }
            sleep(Duration::from_millis(BODY_POLL_INTERVAL_MS)).await;
        }
    }

    async fn results_document(&mut self) -> Result<String, CrawlerError> {
        self.evaluate_string("document.documentElement.outerHTML")
            .await
    }

    async fn article_document(&mut self) -> Result<String, CrawlerError> {
        let html = self.evaluate_string(ARTICLE_DOCUMENT_SCRIPT).await?;
        if self.debug {
            self.debug_screenshot("article").await;
        }
        Ok(html)
    }
}
