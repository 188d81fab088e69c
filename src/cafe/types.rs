//! Naver Cafe クローラーの型定義

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// フィールド抽出に失敗したときのセンチネル値
pub const TITLE_NOT_FOUND: &str = "Title not found";
pub const DATE_NOT_FOUND: &str = "Date not found";
pub const AUTHOR_NOT_FOUND: &str = "Author not found";
pub const AUTHOR_ID_NOT_FOUND: &str = "ID not found";
pub const CONTENT_NOT_FOUND: &str = "Content HTML not found";
pub const COMMENT_TEXT_NOT_FOUND: &str = "Comment text not found";
pub const COMMENTER_NOT_FOUND: &str = "Commenter not found";
pub const NO_COMMENTS: &str = "No comments";

/// コメントのID/日付はドキュメントから抽出していない（既知のギャップ）。
/// 固定のプレースホルダーをそのまま出力する。
pub const COMMENT_ID_PLACEHOLDER: &str = "ID_not_extracted";
pub const COMMENT_DATE_PLACEHOLDER: &str = "Date_not_extracted";

/// 1記事分の抽出結果
///
/// コメント関連の4つのシーケンスは常に同じ長さになる。コメントが
/// 1件もない場合は4つとも `["No comments"]` の単一要素になる。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    /// ロケーター文字列から決定的に導出される記事番号
    pub post_number: String,
    pub date: String,
    pub author_id: String,
    pub author_nickname: String,
    /// 記事本文コンテナのinner HTML
    pub content_html: String,
    /// アーカイブ保存先（保存しなかった/失敗した場合は None）
    pub archive_path: Option<PathBuf>,
    pub commenter_ids: Vec<String>,
    pub commenter_nicknames: Vec<String>,
    pub comments: Vec<String>,
    pub comment_dates: Vec<String>,
}

/// クロール終了理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationCause {
    /// 記事リンクのないページに到達（最終ページと判断）
    LastPage,
    /// 設定されたページ数上限に到達
    PageLimitReached,
    /// ブラウザセッションが失われた
    SessionLost,
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationCause::LastPage => write!(f, "最終ページ到達"),
            TerminationCause::PageLimitReached => write!(f, "ページ数上限到達"),
            TerminationCause::SessionLost => write!(f, "セッション喪失"),
        }
    }
}

/// クロール実行結果のサマリー
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    /// 記事を処理したページ数
    pub pages_visited: u64,
    /// 永続化された記事数
    pub record_count: usize,
    pub termination: TerminationCause,
    pub csv_path: PathBuf,
    pub finished_at: DateTime<Utc>,
}

/// クロール設定
#[derive(Debug, Clone)]
pub struct CafeConfig {
    /// ログイン画面URL（認証自体は操作者が行う）
    pub login_url: String,
    /// 検索結果URLテンプレート。`{page}` がページ番号に置換される
    pub search_url_template: String,
    /// 相対hrefの解決に使うサイトのベースオリジン
    pub base_url: String,
    /// trueなら最終ページまで無制限にクロール
    pub crawl_all_pages: bool,
    /// crawl_all_pages が false のときのページ数上限
    pub page_limit: u64,
    /// 記事本文をHTMLファイルとして保存するか
    pub save_archives: bool,
    pub archive_dir: PathBuf,
    pub csv_path: PathBuf,
    /// ヘッドレスモード（手動ログインのため既定は表示モード）
    pub headless: bool,
    /// デバッグモード（スクリーンショット等）
    pub debug: bool,
    /// ページ遷移後の固定待機
    pub page_settle: Duration,
    /// 記事遷移後の固定待機
    pub article_settle: Duration,
    /// bodyの出現待機の上限
    pub ready_timeout: Duration,
}

impl Default for CafeConfig {
    fn default() -> Self {
        Self {
            login_url: "https://nid.naver.com/nidlogin.login".to_string(),
            search_url_template:
                "https://cafe.naver.com/f-e/cafes/12323151/menus/0?q=%EA%B2%8C%EC%9E%84%EC%A1%B0%EC%95%84&ta=WRITER&page={page}"
                    .to_string(),
            base_url: "https://cafe.naver.com".to_string(),
            crawl_all_pages: true,
            page_limit: 3,
            save_archives: true,
            archive_dir: PathBuf::from("saved_html"),
            csv_path: PathBuf::from("naver_cafe_crawling_results.csv"),
            headless: false,
            debug: false,
            page_settle: Duration::from_secs(3),
            article_settle: Duration::from_secs(2),
            ready_timeout: Duration::from_secs(10),
        }
    }
}

impl CafeConfig {
    pub fn new(search_url_template: impl Into<String>) -> Self {
        Self {
            search_url_template: search_url_template.into(),
            ..Default::default()
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

    /// ページ番号を埋めた検索結果URLを返す
    pub fn page_url(&self, page: u64) -> String {
        self.search_url_template
            .replace("{page}", &page.to_string())
    }
}
