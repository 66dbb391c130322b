// src/notice.rs
use serde::{Deserialize, Serialize};

/// Listing page polled on every run.
pub const DEFAULT_LISTING_URL: &str =
    "https://www.dongduk.ac.kr/www/contents/kor-noti.do?gotoMenuNo=kor-noti";

/// Per-notice view URL; the numeric id is appended verbatim.
pub const DEFAULT_VIEW_BASE_URL: &str =
    "https://www.dongduk.ac.kr/www/contents/kor-noti.do?schM=view&page=1&viewCount=10&id=";

const HEADER_LABEL: &str = "📢 [공지사항]";
const TITLE_LABEL: &str = "🔹 제목:";
const LINK_LABEL: &str = "🔗 링크:";

/// One published announcement. Built once per fetch, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeEntry {
    pub id: u64,
    pub title: String,
    /// Publication date exactly as the board renders it.
    pub date: String,
    pub link: String,
}

impl NoticeEntry {
    pub fn new(
        id: u64,
        title: impl Into<String>,
        date: impl Into<String>,
        view_base_url: &str,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            date: date.into(),
            link: notice_link(view_base_url, id),
        }
    }

    /// Chat message for this notice. Downstream readers match on this layout.
    pub fn to_message(&self) -> String {
        format!(
            "{HEADER_LABEL} {}\n{TITLE_LABEL} {}\n{LINK_LABEL} {}",
            self.date, self.title, self.link
        )
    }
}

pub fn notice_link(view_base_url: &str, id: u64) -> String {
    format!("{view_base_url}{id}")
}
