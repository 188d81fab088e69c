//! 記事スナップショットのアーカイブ保存

use std::path::PathBuf;

use tracing::{info, warn};

use super::types::ArticleRecord;

pub struct ArchiveWriter {
    dir: PathBuf,
}

impl ArchiveWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 記事1件を自己完結したHTMLドキュメントとして保存する
    ///
    /// 本文抽出に成功したレコードに対してのみ呼ばれる。ファイル名は
    /// 記事ヘッダーのタイトル、なければレコードのタイトル1行目、それも
    /// 空なら `article_<post_number>`。書き込みに失敗しても致命的には
    /// せず `None` を返し、レコードはアーカイブパスなしで続行する。
    pub fn archive(&self, record: &ArticleRecord, header_title: Option<&str>) -> Option<PathBuf> {
        let title_for_filename = header_title
            .map(str::to_string)
            .or_else(|| record.title.lines().next().map(|l| l.trim().to_string()))
            .unwrap_or_default();

        let mut safe_title = sanitize_title(&title_for_filename);
        if safe_title.is_empty() {
            safe_title = format!("article_{}", record.post_number);
        }

        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("アーカイブディレクトリ作成に失敗: {}", e);
            return None;
        }

        let path = self.dir.join(format!("{}.html", safe_title));
        let document = render_document(record, &title_for_filename);

        match std::fs::write(&path, document) {
            Ok(()) => {
                info!("HTML保存: {:?}", path);
                Some(path)
            }
            Err(e) => {
                warn!("HTML保存に失敗: {}", e);
                None
            }
        }
    }
}

/// ファイル名として安全な形に正規化する
///
/// 英数字（Unicode含む）・空白・ハイフン・アンダースコアのみ残し、
/// 末尾空白を落とし、空白をアンダースコアに置換して50文字に切り詰める。
fn sanitize_title(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim_end().replace(' ', "_").chars().take(50).collect()
}

fn render_document(record: &ArticleRecord, title_for_filename: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{}</title>
</head>
<body>
    <h1>{}</h1>
    <p><strong>작성자:</strong> {} ({})</p>
    <p><strong>작성일:</strong> {}</p>
    <p><strong>게시글 번호:</strong> {}</p>
    <hr>
    {}
</body>
</html>"#,
        title_for_filename,
        record.title,
        record.author_nickname,
        record.author_id,
        record.date,
        record.post_number,
        record.content_html,
    )
}
