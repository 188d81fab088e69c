//! 検索結果ページ・記事ページからの抽出ロジック
//!
//! レンダリング済みHTMLのスナップショット文字列に対する純粋関数として
//! 実装する。フィールドごとに順序付きのセレクター戦略リストを持ち、
//! 最初に空でないテキストを返した戦略を採用する。全滅した場合は
//! センチネル値に置き換え、レコード全体を捨てることはしない。

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::types::{
    ArticleRecord, AUTHOR_ID_NOT_FOUND, AUTHOR_NOT_FOUND, COMMENTER_NOT_FOUND,
    COMMENT_DATE_PLACEHOLDER, COMMENT_ID_PLACEHOLDER, COMMENT_TEXT_NOT_FOUND, CONTENT_NOT_FOUND,
    DATE_NOT_FOUND, NO_COMMENTS, TITLE_NOT_FOUND,
};

/// 1ページあたりの抽出コメント数上限
pub const MAX_COMMENTS: usize = 5;

/// 名前付きセレクター戦略
#[derive(Debug, Clone, Copy)]
pub struct SelectorStrategy {
    pub name: &'static str,
    pub selector: &'static str,
}

const TITLE_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy { name: "title_text", selector: ".title_text" },
    SelectorStrategy { name: "article_title", selector: ".ArticleTitle" },
    SelectorStrategy { name: "post_title", selector: ".post-title" },
    SelectorStrategy { name: "h3", selector: "h3" },
    SelectorStrategy { name: "h2", selector: "h2" },
];

const DATE_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy { name: "date", selector: ".date" },
    SelectorStrategy { name: "article_date", selector: ".ArticleDate" },
    SelectorStrategy { name: "post_date", selector: ".post-date" },
    SelectorStrategy { name: "created_date", selector: ".created-date" },
];

const AUTHOR_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy { name: "nickname", selector: ".nickname" },
    SelectorStrategy { name: "article_writer", selector: ".ArticleWriter" },
    SelectorStrategy { name: "author", selector: ".author" },
    SelectorStrategy { name: "writer", selector: ".writer" },
];

const AUTHOR_LINK_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy { name: "thumb", selector: ".thumb" },
    SelectorStrategy { name: "profile_link", selector: ".profile-link" },
];

const CONTENT_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy {
        name: "app_content_box",
        selector: "#app > div > div > div.ArticleContentBox",
    },
    SelectorStrategy { name: "content_box", selector: ".ArticleContentBox" },
    SelectorStrategy {
        name: "generic_content",
        selector: ".se-main-container, .post-content, .content",
    },
];

const COMMENT_TEXT_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy { name: "text_comment", selector: ".text_comment" },
    SelectorStrategy { name: "comment_text", selector: ".comment-text" },
];

const COMMENT_AUTHOR_STRATEGIES: &[SelectorStrategy] = &[
    SelectorStrategy { name: "comment_nickname", selector: ".comment_nickname" },
    SelectorStrategy { name: "comment_author", selector: ".comment-author" },
];

/// コメント要素の集合はフォールバックではなく和集合として扱う
const COMMENT_CONTAINER_SELECTOR: &str = ".comment_area, .CommentItem";

/// アーカイブファイル名用の記事ヘッダータイトル
const ARCHIVE_TITLE_SELECTOR: &str =
    "#app > div > div > div.ArticleContentBox > div.article_header > div:nth-child(1) > div > div > h3";

/// 検索結果ページから記事ロケーターを抽出する
///
/// `/articles/<id>` 形式と `articleid=<id>` 形式のhrefを対象に、相対
/// パスをベースオリジンで絶対化し、完全一致で重複排除する。戻り値の
/// 順序はドキュメント内の出現順（初出順）。空ベクタはクロールループの
/// 終了シグナルであってエラーではない。
pub fn extract_locators(html: &str, base: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut locators = Vec::new();
    for element in doc.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !href.contains("/articles/") && !href.contains("articleid=") {
            continue;
        }
        let absolute = if href.starts_with("http") {
            href.to_string()
        } else {
            match base.join(href) {
                Ok(url) => url.into(),
                Err(e) => {
                    debug!("href正規化に失敗: {} ({})", href, e);
                    continue;
                }
            }
        };
        if seen.insert(absolute.clone()) {
            locators.push(absolute);
        }
    }
    locators
}

/// ロケーター文字列から記事番号を導出する
///
/// ドキュメントの内容には依存しない。クエリ形式 `articleid=` を
/// パス形式 `articles/` より優先する。
pub fn post_number_from_locator(locator: &str) -> String {
    if let Some(rest) = locator.split("articleid=").nth(1) {
        rest.split('&').next().unwrap_or("").to_string()
    } else if let Some(rest) = locator.split("articles/").nth(1) {
        rest.split('?').next().unwrap_or("").to_string()
    } else {
        "Unknown".to_string()
    }
}

/// 記事ページからレコードを抽出する
///
/// 個々のフィールドの失敗はセンチネル値への置換で吸収し、抽出全体を
/// 失敗させない。
pub fn extract_record(html: &str, locator: &str) -> ArticleRecord {
    let doc = Html::parse_document(html);

    let title = first_text(&doc, TITLE_STRATEGIES)
        .unwrap_or_else(|| TITLE_NOT_FOUND.to_string());
    let date = first_text(&doc, DATE_STRATEGIES)
        .unwrap_or_else(|| DATE_NOT_FOUND.to_string());
    let author_nickname = first_text(&doc, AUTHOR_STRATEGIES)
        .unwrap_or_else(|| AUTHOR_NOT_FOUND.to_string());
    let author_id = extract_author_id(&doc);
    let content_html = first_inner_html(&doc, CONTENT_STRATEGIES)
        .unwrap_or_else(|| CONTENT_NOT_FOUND.to_string());
    let (commenter_ids, commenter_nicknames, comments, comment_dates) = extract_comments(&doc);

    ArticleRecord {
        title,
        post_number: post_number_from_locator(locator),
        date,
        author_id,
        author_nickname,
        content_html,
        archive_path: None,
        commenter_ids,
        commenter_nicknames,
        comments,
        comment_dates,
    }
}

/// アーカイブファイル名に使う記事ヘッダーのタイトルを抽出する
pub fn extract_archive_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse(ARCHIVE_TITLE_SELECTOR).ok()?;
    let element = doc.select(&selector).next()?;
    let text = element.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// 戦略リストを順に試し、最初に空でないテキストを返した要素を採用する
fn first_text(doc: &Html, strategies: &[SelectorStrategy]) -> Option<String> {
    for strategy in strategies {
        let Ok(selector) = Selector::parse(strategy.selector) else {
            continue;
        };
        if let Some(element) = doc.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                debug!("戦略 '{}' でテキスト抽出", strategy.name);
                return Some(text);
            }
        }
    }
    None
}

/// 戦略リストを順に試し、最初に空でないinner HTMLを返した要素を採用する
fn first_inner_html(doc: &Html, strategies: &[SelectorStrategy]) -> Option<String> {
    for strategy in strategies {
        let Ok(selector) = Selector::parse(strategy.selector) else {
            continue;
        };
        if let Some(element) = doc.select(&selector).next() {
            let html = element.inner_html();
            if !html.trim().is_empty() {
                debug!("戦略 '{}' で本文HTML抽出", strategy.name);
                return Some(html);
            }
        }
    }
    None
}

/// プロフィールリンクのhrefから作者IDを抽出する
///
/// リンク要素自体が見つからなければ "ID not found"。要素はあるが
/// `members/` を含まないhrefの場合は空文字列になる。
fn extract_author_id(doc: &Html) -> String {
    for strategy in AUTHOR_LINK_STRATEGIES {
        let Ok(selector) = Selector::parse(strategy.selector) else {
            continue;
        };
        if let Some(element) = doc.select(&selector).next() {
            let href = element.value().attr("href").unwrap_or("");
            return href
                .split("members/")
                .nth(1)
                .map(str::to_string)
                .unwrap_or_default();
        }
    }
    AUTHOR_ID_NOT_FOUND.to_string()
}

/// コメント4列を抽出する: (ids, nicknames, texts, dates)
///
/// 最初の5要素に限定。本文と作者は独立に抽出し、片方の失敗がもう
/// 片方を落とすことはない。両方とも取れない要素はスキップ。ID/日付は
/// ドキュメントからは抽出せず固定プレースホルダーを入れる。
/// 1件も取れなければ4列とも "No comments" の単一要素にそろえる。
fn extract_comments(doc: &Html) -> (Vec<String>, Vec<String>, Vec<String>, Vec<String>) {
    let mut ids = Vec::new();
    let mut nicknames = Vec::new();
    let mut texts = Vec::new();
    let mut dates = Vec::new();

    if let Ok(selector) = Selector::parse(COMMENT_CONTAINER_SELECTOR) {
        for element in doc.select(&selector).take(MAX_COMMENTS) {
            let text = scoped_text(element, COMMENT_TEXT_STRATEGIES);
            let author = scoped_text(element, COMMENT_AUTHOR_STRATEGIES);
            if text.is_none() && author.is_none() {
                continue;
            }
            texts.push(text.unwrap_or_else(|| COMMENT_TEXT_NOT_FOUND.to_string()));
            nicknames.push(author.unwrap_or_else(|| COMMENTER_NOT_FOUND.to_string()));
            ids.push(COMMENT_ID_PLACEHOLDER.to_string());
            dates.push(COMMENT_DATE_PLACEHOLDER.to_string());
        }
    }

    if texts.is_empty() {
        let marker = vec![NO_COMMENTS.to_string()];
        return (marker.clone(), marker.clone(), marker.clone(), marker);
    }
    (ids, nicknames, texts, dates)
}

/// 要素配下に限定した first_text
fn scoped_text(element: ElementRef<'_>, strategies: &[SelectorStrategy]) -> Option<String> {
    for strategy in strategies {
        let Ok(selector) = Selector::parse(strategy.selector) else {
            continue;
        };
        if let Some(node) = element.select(&selector).next() {
            let text = node.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}
