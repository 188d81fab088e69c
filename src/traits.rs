use async_trait::async_trait;
use std::time::Duration;

use crate::error::CrawlerError;

/// クロールループが消費するレンダリングセッション能力
///
/// 実装は [`crate::cafe::BrowserSession`]（chromiumoxide）。テストでは
/// スクリプト化したフェイクセッションでループを駆動できる。
#[async_trait]
pub trait CafeSession: Send + Sync {
    /// セッション生存確認
    ///
    /// ウィンドウが閉じられた・接続が切れた等の失敗はすべて `false` に
    /// 畳み込む。エラーを外に漏らさないこと。
    async fn is_alive(&mut self) -> bool;

    /// 指定URLへナビゲート
    async fn goto(&mut self, url: &str) -> Result<(), CrawlerError>;

    /// body要素の出現を待機（上限付きポーリング）
    async fn wait_for_body(&mut self, timeout: Duration) -> Result<(), CrawlerError>;

    /// 現在の検索結果ページのHTMLスナップショットを取得
    async fn results_document(&mut self) -> Result<String, CrawlerError>;

    /// 現在の記事ページのHTMLスナップショットを取得
    ///
    /// cafe_main iframe が存在する場合はその内容を返す。フレームの
    /// スコープ処理はこの中で完結し、トップレベルの閲覧コンテキストは
    /// どの失敗経路でも切り替わったまま残らない。
    async fn article_document(&mut self) -> Result<String, CrawlerError>;
}
