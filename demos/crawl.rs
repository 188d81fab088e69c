use cafe_crawler::{BrowserSession, CafeConfig, CafeCrawler};

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter("info,cafe_crawler=debug")
        .init();

    // 検索結果URLは環境変数で差し替え可能（{page} がページ番号になる）
    let config = match std::env::var("CAFE_SEARCH_URL") {
        Ok(url) => CafeConfig::new(url),
        Err(_) => CafeConfig::default(),
    };

    println!("==================================================");
    println!("Naver Cafe Search Result Crawler");
    println!("==================================================");

    let mut session = BrowserSession::launch(&config)
        .await
        .expect("ブラウザの起動に失敗しました");
    session
        .open_login_page(&config.login_url)
        .await
        .expect("ログインページへの遷移に失敗しました");

    // 手動ログイン（操作者の合図を待つ）
    println!("\n1. ブラウザで Naver にログインしてください。");
    println!("2. ログイン完了後、Enter を押してください。");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .expect("標準入力の読み取りに失敗しました");

    let mut crawler = CafeCrawler::new(config).expect("設定が不正です");
    let summary = crawler.crawl(&mut session).await;
    session
        .close()
        .await
        .expect("ブラウザの終了に失敗しました");

    println!("\n=== 収集結果 ===");
    println!("ページ数: {}", summary.pages_visited);
    println!("収集件数: {}", summary.record_count);
    println!("終了理由: {}", summary.termination);
    println!("CSV: {:?}", summary.csv_path);
    if let Ok(json) = serde_json::to_string_pretty(&summary) {
        println!("{}", json);
    }

    for record in crawler.records().iter().take(10) {
        println!("  - [{}] {} ({})", record.post_number, record.title, record.date);
    }
}
