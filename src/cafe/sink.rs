//! 収集結果のCSVシンク
//!
//! レコード1件を追記するたびにCSVファイル全体を書き直す。書き込み
//! 効率よりも中断耐性を優先し、どの時点でプロセスが止まっても直前の
//! 記事までが必ずファイルに残る。

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::ArticleRecord;
use crate::error::CrawlerError;

/// UTF-8 BOM。Excel等で韓国語が化けないようにする（utf-8-sig 相当）
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const HEADERS: [&str; 11] = [
    "title",
    "post_number",
    "date",
    "author_id",
    "author_nickname",
    "article_content_html",
    "html_file_path",
    "commenter_ids",
    "commenter_nicknames",
    "comments",
    "comment_dates",
];

/// インメモリのレコード列とCSVファイルを排他的に所有するシンク
pub struct ResultSink {
    path: PathBuf,
    records: Vec<ArticleRecord>,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    /// レコードを追加し、CSVファイル全体を書き直す
    pub fn append(&mut self, record: ArticleRecord) -> Result<(), CrawlerError> {
        self.records.push(record);
        self.rewrite()?;
        debug!("CSV書き込み完了: {} 件", self.records.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ArticleRecord] {
        &self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rewrite(&self) -> Result<(), CrawlerError> {
        let mut file = File::create(&self.path)?;
        file.write_all(UTF8_BOM)?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(HEADERS)?;
        for record in &self.records {
            writer.write_record(&csv_row(record))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// コメント系シーケンスは "; " 区切りで1セルに畳む
fn csv_row(record: &ArticleRecord) -> [String; 11] {
    [
        record.title.clone(),
        record.post_number.clone(),
        record.date.clone(),
        record.author_id.clone(),
        record.author_nickname.clone(),
        record.content_html.clone(),
        record
            .archive_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        record.commenter_ids.join("; "),
        record.commenter_nicknames.join("; "),
        record.comments.join("; "),
        record.comment_dates.join("; "),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cafe::types::NO_COMMENTS;

    fn sample_record(title: &str, post_number: &str) -> ArticleRecord {
        ArticleRecord {
            title: title.to_string(),
            post_number: post_number.to_string(),
            date: "2024.03.01.".to_string(),
            author_id: "abcd123".to_string(),
            author_nickname: "게임조아".to_string(),
            content_html: "<p>본문, \"quoted\"</p>".to_string(),
            archive_path: None,
            commenter_ids: vec![NO_COMMENTS.to_string()],
            commenter_nicknames: vec![NO_COMMENTS.to_string()],
            comments: vec![NO_COMMENTS.to_string()],
            comment_dates: vec![NO_COMMENTS.to_string()],
        }
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let bytes = std::fs::read(path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let mut reader = csv::Reader::from_reader(&bytes[UTF8_BOM.len()..]);
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_append_rewrites_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut sink = ResultSink::new(&path);
        assert!(sink.is_empty());
        assert_eq!(sink.path(), path);

        sink.append(sample_record("첫 번째 글", "1")).unwrap();
        assert!(!sink.is_empty());
        let rows = read_rows(&path);
        assert_eq!(rows.len(), 1);

        sink.append(sample_record("두 번째 글", "2")).unwrap();
        let rows = read_rows(&path);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "첫 번째 글");
        assert_eq!(rows[1][0], "두 번째 글");
    }

    #[test]
    fn test_rerun_with_same_records_no_duplication() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        for _ in 0..2 {
            // 再実行: 新しいシンクが同じ2件を書き直しても行は2行のまま
            let mut sink = ResultSink::new(&path);
            sink.append(sample_record("a", "1")).unwrap();
            sink.append(sample_record("b", "2")).unwrap();
        }

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_non_ascii_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut sink = ResultSink::new(&path);

        let mut record = sample_record("한글 제목과 쉼표, 따옴표", "42");
        record.comments = vec!["댓글1".to_string(), "댓글2".to_string()];
        record.commenter_nicknames = vec!["유저1".to_string(), "유저2".to_string()];
        record.commenter_ids = vec!["ID_not_extracted".to_string(); 2];
        record.comment_dates = vec!["Date_not_extracted".to_string(); 2];
        sink.append(record).unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows[0][0], "한글 제목과 쉼표, 따옴표");
        assert_eq!(rows[0][5], "<p>본문, \"quoted\"</p>");
        assert_eq!(rows[0][9], "댓글1; 댓글2");
    }

    #[test]
    fn test_archive_path_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut sink = ResultSink::new(&path);

        let mut record = sample_record("a", "1");
        record.archive_path = Some(PathBuf::from("saved_html/a.html"));
        sink.append(record).unwrap();
        sink.append(sample_record("b", "2")).unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows[0][6], "saved_html/a.html");
        assert_eq!(rows[1][6], "");
    }
}
