use serde::{Deserialize, Serialize};

/// 多值详情字段的拼接分隔符
///
/// 拼接是有损的（无法还原为列表），格式需要与既有导出保持一致。
pub const JOIN_DELIMITER: &str = "; ";

/// 同一条记录中多个图片链接之间的分隔符
pub const IMAGE_LINK_DELIMITER: &str = "\n";

/// 一条输出记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub document_number: String,
    pub book: String,
    pub page: String,
    pub recording_date: String,
    pub book_type: String,
    pub document_type: String,
    pub amount: String,
    pub grantor: String,
    pub grantee: String,
    pub reference: String,
    pub remarks: String,
    pub parcel_number: String,
    pub legal_description: String,
    pub property_description: String,
    pub image_links: String,
}

impl Record {
    /// 分隔文件的表头，与 `fields()` 一一对应
    pub const HEADERS: [&'static str; 15] = [
        "Document Number",
        "Book",
        "Page",
        "Recording Date",
        "Book Type",
        "Document Type",
        "Amount",
        "Grantor",
        "Grantee",
        "Reference",
        "Remarks",
        "Parcel Number",
        "Legal Description",
        "Property Description",
        "Image Links",
    ];

    pub fn fields(&self) -> [&str; 15] {
        [
            &self.document_number,
            &self.book,
            &self.page,
            &self.recording_date,
            &self.book_type,
            &self.document_type,
            &self.amount,
            &self.grantor,
            &self.grantee,
            &self.reference,
            &self.remarks,
            &self.parcel_number,
            &self.legal_description,
            &self.property_description,
            &self.image_links,
        ]
    }

    /// 追加一个图片链接
    pub fn push_image_link(&mut self, link: &str) {
        if !self.image_links.is_empty() {
            self.image_links.push_str(IMAGE_LINK_DELIMITER);
        }
        self.image_links.push_str(link);
    }
}

/// 把多值字段压平为单个字符串：去掉首尾空白和空值，按 `JOIN_DELIMITER` 拼接
pub fn flatten<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| v.as_ref().trim())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(JOIN_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_skips_blank_values() {
        let values = vec![" SMITH JOHN ", "", "  ", "DOE JANE"];
        assert_eq!(flatten(&values), "SMITH JOHN; DOE JANE");
        assert_eq!(flatten::<&str>(&[]), "");
    }

    #[test]
    fn test_push_image_link() {
        let mut record = Record::default();
        record.push_image_link("https://img/a.zip");
        record.push_image_link("https://img/b.zip");
        assert_eq!(record.image_links, "https://img/a.zip\nhttps://img/b.zip");
    }

    #[test]
    fn test_headers_match_fields() {
        let record = Record {
            document_number: "2024000123".into(),
            image_links: "x".into(),
            ..Default::default()
        };
        let fields = record.fields();
        assert_eq!(fields.len(), Record::HEADERS.len());
        assert_eq!(fields[0], "2024000123");
        assert_eq!(fields[14], "x");
    }
}
