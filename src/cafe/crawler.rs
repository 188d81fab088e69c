//! クロールループ
//!
//! ページ送り → ロケーター抽出 → 記事ごとの抽出・アーカイブ・永続化を
//! 駆動する状態機械。失敗はこのループより外へは伝播させない: セッション
//! 喪失だけが即時終了で、ページ単位・記事単位・フィールド単位の失敗は
//! すべてスキップまたはセンチネル置換で吸収する。

use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use super::archive::ArchiveWriter;
use super::extract::{extract_archive_title, extract_locators, extract_record};
use super::sink::ResultSink;
use super::types::{ArticleRecord, CafeConfig, CrawlSummary, TerminationCause, CONTENT_NOT_FOUND};
use crate::error::CrawlerError;
use crate::traits::CafeSession;

/// 1ページあたりの処理記事数上限
const MAX_ARTICLES_PER_PAGE: usize = 10;

/// 診断メッセージの切り詰め長
const DIAGNOSTIC_LEN: usize = 50;

/// プロセス内限定のループ状態。永続化はしない
struct CrawlState {
    page: u64,
    records: usize,
    alive: bool,
}

pub struct CafeCrawler {
    config: CafeConfig,
    base: Url,
    sink: ResultSink,
    archiver: ArchiveWriter,
}

impl CafeCrawler {
    pub fn new(config: CafeConfig) -> Result<Self, CrawlerError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| CrawlerError::Config(format!("base_url が不正です: {}", e)))?;
        let sink = ResultSink::new(&config.csv_path);
        let archiver = ArchiveWriter::new(&config.archive_dir);
        Ok(Self {
            config,
            base,
            sink,
            archiver,
        })
    }

    pub fn records(&self) -> &[ArticleRecord] {
        self.sink.records()
    }

    /// クロールを実行する
    ///
    /// 認証済みのレンダリングセッションを受け取り、終了理由つきの
    /// サマリーを返す。エラーはこの関数から出ていかない。
    pub async fn crawl(&mut self, session: &mut dyn CafeSession) -> CrawlSummary {
        let mut state = CrawlState {
            page: 1,
            records: self.sink.len(),
            alive: true,
        };
        let mut pages_visited = 0u64;

        let termination = loop {
            if !self.config.crawl_all_pages && state.page > self.config.page_limit {
                info!("設定されたページ数上限 {} に到達しました", self.config.page_limit);
                break TerminationCause::PageLimitReached;
            }

            if self.config.crawl_all_pages {
                info!("=== Page {} 処理中 ===", state.page);
            } else {
                info!("=== Page {}/{} 処理中 ===", state.page, self.config.page_limit);
            }

            if !session.is_alive().await {
                state.alive = false;
                warn!("ブラウザセッションが失われました。クロールを中断します");
                warn!("ブラウザを開いたまま再実行してください");
                break TerminationCause::SessionLost;
            }

            let page_url = self.config.page_url(state.page);
            if let Err(e) = session.goto(&page_url).await {
                state.alive = false;
                warn!(
                    "Page {} への遷移に失敗: {}",
                    state.page,
                    truncate(&e.to_string(), DIAGNOSTIC_LEN)
                );
                break TerminationCause::SessionLost;
            }
            sleep(self.config.page_settle).await;

            // ページ単位の回復可能エラー: 読み込み失敗は次のページへ
            if let Err(e) = session.wait_for_body(self.config.ready_timeout).await {
                warn!("Page {} の読み込みに失敗、スキップします: {}", state.page, e);
                state.page += 1;
                continue;
            }

            let html = match session.results_document().await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Page {} の取得に失敗、スキップします: {}", state.page, e);
                    state.page += 1;
                    continue;
                }
            };

            let locators = extract_locators(&html, &self.base);
            info!("Page {}: {} 件の記事リンクを検出", state.page, locators.len());

            if locators.is_empty() {
                info!(
                    "Page {} に記事が見つかりません。最終ページと判断して終了します",
                    state.page
                );
                break TerminationCause::LastPage;
            }

            pages_visited += 1;
            let capped = locators.len().min(MAX_ARTICLES_PER_PAGE);
            let mut session_lost = false;

            for (i, locator) in locators.iter().take(MAX_ARTICLES_PER_PAGE).enumerate() {
                info!(
                    "  記事 {}/{} を処理中: {}",
                    i + 1,
                    capped,
                    truncate(locator, DIAGNOSTIC_LEN)
                );

                if !session.is_alive().await {
                    session_lost = true;
                    break;
                }

                // 記事単位の回復可能エラー: 遷移失敗はその記事だけスキップ
                if let Err(e) = session.goto(locator).await {
                    warn!(
                        "    記事の読み込みに失敗: {}",
                        truncate(&e.to_string(), DIAGNOSTIC_LEN)
                    );
                    continue;
                }
                sleep(self.config.article_settle).await;

                match self.process_article(session, locator).await {
                    Ok(title) => {
                        state.records += 1;
                        info!("    ✓ {}", truncate(&title, 30));
                    }
                    Err(e) => {
                        warn!(
                            "    ✗ 記事の処理に失敗: {}",
                            truncate(&e.to_string(), DIAGNOSTIC_LEN)
                        );
                    }
                }
            }

            if session_lost {
                state.alive = false;
                warn!("ブラウザセッションが失われました。クロールを中断します");
                break TerminationCause::SessionLost;
            }

            state.page += 1;
        };

        debug!(
            "終了時状態: page={}, records={}, alive={}",
            state.page, state.records, state.alive
        );

        let summary = CrawlSummary {
            pages_visited,
            record_count: state.records,
            termination,
            csv_path: self.sink.path().to_path_buf(),
            finished_at: Utc::now(),
        };

        info!("=== クロール完了 ({}) ===", summary.termination);
        info!("合計 {} 件の記事を収集しました", summary.record_count);
        info!("結果は {:?} に保存されています", summary.csv_path);
        summary
    }

    /// 記事1件の取得・抽出・アーカイブ・永続化
    async fn process_article(
        &mut self,
        session: &mut dyn CafeSession,
        locator: &str,
    ) -> Result<String, CrawlerError> {
        let html = session.article_document().await?;
        let mut record = extract_record(&html, locator);

        // 本文が取れたときだけアーカイブする。失敗は非致命
        if self.config.save_archives && record.content_html != CONTENT_NOT_FOUND {
            let header_title = extract_archive_title(&html);
            record.archive_path = self.archiver.archive(&record, header_title.as_deref());
        }

        let title = record.title.clone();
        self.sink.append(record)?;
        Ok(title)
    }
}

/// 文字単位で切り詰める（診断メッセージ用）
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::time::Duration;

    /// スクリプト化したフェイクセッション
    ///
    /// results_document は呼び出しごとに次のページHTMLを返し、尽きたら
    /// 空ページを返す。is_alive は指定回数だけ true を返した後 false。
    /// fail_body_on に入れた回数目の body 待機はタイムアウトする。
    struct FakeSession {
        result_pages: Vec<String>,
        served: usize,
        article_html: String,
        alive_budget: Option<usize>,
        alive_checks: usize,
        body_waits: usize,
        fail_body_on: HashSet<usize>,
        article_visits: Vec<String>,
        fail_goto: HashSet<String>,
    }

    impl FakeSession {
        fn new(result_pages: Vec<String>, article_html: &str) -> Self {
            Self {
                result_pages,
                served: 0,
                article_html: article_html.to_string(),
                alive_budget: None,
                alive_checks: 0,
                body_waits: 0,
                fail_body_on: HashSet::new(),
                article_visits: Vec::new(),
                fail_goto: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl CafeSession for FakeSession {
        async fn is_alive(&mut self) -> bool {
            self.alive_checks += 1;
            match self.alive_budget {
                Some(budget) => self.alive_checks <= budget,
                None => true,
            }
        }

        async fn goto(&mut self, url: &str) -> Result<(), CrawlerError> {
            if self.fail_goto.contains(url) {
                return Err(CrawlerError::Navigation("connection refused".into()));
            }
            if url.contains("/articles/") {
                self.article_visits.push(url.to_string());
            }
            Ok(())
        }

        async fn wait_for_body(&mut self, _timeout: Duration) -> Result<(), CrawlerError> {
            self.body_waits += 1;
            if self.fail_body_on.contains(&self.body_waits) {
                return Err(CrawlerError::Timeout("bodyが出現しませんでした".into()));
            }
            Ok(())
        }

        async fn results_document(&mut self) -> Result<String, CrawlerError> {
            let html = self
                .result_pages
                .get(self.served)
                .cloned()
                .unwrap_or_else(|| "<html><body></body></html>".to_string());
            self.served += 1;
            Ok(html)
        }

        async fn article_document(&mut self) -> Result<String, CrawlerError> {
            Ok(self.article_html.clone())
        }
    }

    fn results_page(article_ids: &[u64]) -> String {
        let links: String = article_ids
            .iter()
            .map(|id| format!("<a href=\"/articles/{id}\">글 {id}</a>"))
            .collect();
        format!("<html><body>{links}</body></html>")
    }

    const ARTICLE_HTML: &str = r#"<html><body>
        <h3 class="title_text">테스트 게시글</h3>
        <span class="date">2024.03.01.</span>
        <span class="nickname">게임조아</span>
        <div class="ArticleContentBox"><p>본문</p></div>
    </body></html>"#;

    fn test_config(dir: &std::path::Path) -> CafeConfig {
        CafeConfig {
            search_url_template: "https://cafe.naver.com/search?page={page}".to_string(),
            csv_path: dir.join("results.csv"),
            archive_dir: dir.join("saved_html"),
            save_archives: false,
            page_settle: Duration::ZERO,
            article_settle: Duration::ZERO,
            ready_timeout: Duration::ZERO,
            ..Default::default()
        }
    }

    fn count_csv_rows(path: &PathBuf) -> usize {
        let bytes = std::fs::read(path).unwrap();
        csv::Reader::from_reader(&bytes[3..]).records().count()
    }

    #[tokio::test]
    async fn test_empty_first_page_terminates_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = CafeCrawler::new(test_config(dir.path())).unwrap();
        let mut session = FakeSession::new(vec![], ARTICLE_HTML);

        let summary = crawler.crawl(&mut session).await;
        assert_eq!(summary.termination, TerminationCause::LastPage);
        assert_eq!(summary.record_count, 0);
        assert_eq!(summary.pages_visited, 0);
        // 1件も永続化していないのでCSVは作られない
        assert!(!dir.path().join("results.csv").exists());
    }

    #[tokio::test]
    async fn test_page_limit_reached() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path()).with_page_limit(1);
        let mut crawler = CafeCrawler::new(config).unwrap();
        let mut session = FakeSession::new(
            vec![results_page(&[1, 2]), results_page(&[3])],
            ARTICLE_HTML,
        );

        let summary = crawler.crawl(&mut session).await;
        assert_eq!(summary.termination, TerminationCause::PageLimitReached);
        assert_eq!(summary.record_count, 2);
        assert_eq!(summary.pages_visited, 1);
        assert_eq!(count_csv_rows(&dir.path().join("results.csv")), 2);
    }

    #[tokio::test]
    async fn test_session_lost_preserves_completed_pages() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = CafeCrawler::new(test_config(dir.path())).unwrap();

        // 3ページ × 1記事。ページごとに生存確認が2回（ページ前+記事前）
        // 走るので、6回目まで生きて7回目（Page 4 の前）で死ぬ
        let mut session = FakeSession::new(
            vec![
                results_page(&[1]),
                results_page(&[2]),
                results_page(&[3]),
                results_page(&[4]),
            ],
            ARTICLE_HTML,
        );
        session.alive_budget = Some(6);

        let summary = crawler.crawl(&mut session).await;
        assert_eq!(summary.termination, TerminationCause::SessionLost);
        assert_eq!(summary.record_count, 3);
        // Page 4 の記事は1件も永続化されていない
        assert_eq!(count_csv_rows(&dir.path().join("results.csv")), 3);
    }

    #[tokio::test]
    async fn test_page_body_timeout_skips_to_next_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = CafeCrawler::new(test_config(dir.path())).unwrap();
        let mut session = FakeSession::new(vec![results_page(&[1])], ARTICLE_HTML);
        // Page 1 の body 待機をタイムアウトさせる
        session.fail_body_on.insert(1);

        let summary = crawler.crawl(&mut session).await;
        // Page 1 はスキップされ（行もpages_visitedも増えない）、
        // Page 2 で記事1件を処理し、Page 3 が空で終了する
        assert_eq!(summary.termination, TerminationCause::LastPage);
        assert_eq!(summary.record_count, 1);
        assert_eq!(summary.pages_visited, 1);
        assert_eq!(session.body_waits, 3);
        assert_eq!(
            session.article_visits,
            vec!["https://cafe.naver.com/articles/1"]
        );
        assert_eq!(count_csv_rows(&dir.path().join("results.csv")), 1);
    }

    #[tokio::test]
    async fn test_article_navigation_failure_skips_article() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = CafeCrawler::new(test_config(dir.path())).unwrap();
        let mut session = FakeSession::new(vec![results_page(&[1, 2])], ARTICLE_HTML);
        session
            .fail_goto
            .insert("https://cafe.naver.com/articles/1".to_string());

        let summary = crawler.crawl(&mut session).await;
        // 1記事目は遷移失敗でスキップ、2記事目は成功、次ページは空で終了
        assert_eq!(summary.termination, TerminationCause::LastPage);
        assert_eq!(summary.record_count, 1);
        assert_eq!(count_csv_rows(&dir.path().join("results.csv")), 1);
    }

    #[tokio::test]
    async fn test_articles_capped_at_ten_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = CafeCrawler::new(test_config(dir.path())).unwrap();
        let ids: Vec<u64> = (1..=14).collect();
        let mut session = FakeSession::new(vec![results_page(&ids)], ARTICLE_HTML);

        let summary = crawler.crawl(&mut session).await;
        assert_eq!(summary.record_count, 10);
        assert_eq!(session.article_visits.len(), 10);
        assert_eq!(summary.termination, TerminationCause::LastPage);
    }

    #[tokio::test]
    async fn test_archives_written_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.save_archives = true;
        let mut crawler = CafeCrawler::new(config).unwrap();
        let mut session = FakeSession::new(vec![results_page(&[1])], ARTICLE_HTML);

        let summary = crawler.crawl(&mut session).await;
        assert_eq!(summary.record_count, 1);
        let archived = crawler.records()[0].archive_path.clone().unwrap();
        assert!(archived.exists());
        assert_eq!(archived.file_name().unwrap(), "테스트_게시글.html");
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("가나다라마바사", 3), "가나다...");
    }
}
