//! 文档格式层
//!
//! 将 Word、PowerPoint、Excel 和问卷 CSV 统一为 [`Document`] 接口：
//! 按文档顺序列出可翻译的文本位置，按位置写回译文，并序列化为新文件。

pub mod csv;
pub mod docx;
pub mod package;
pub mod pptx;
mod slots;
#[cfg(test)]
pub(crate) mod test_support;
pub mod xlsx;
pub mod xml;

use std::fmt;
use std::path::Path;

use crate::translation::error::{TranslationError, TranslationResult};

pub use self::csv::{CsvDocument, CsvOptions};
pub use docx::DocxDocument;
pub use pptx::PptxDocument;
pub use xlsx::XlsxDocument;

// ============================================================================
// 核心类型
// ============================================================================

/// 文档类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum DocumentKind {
    Word,
    PowerPoint,
    Excel,
    Csv,
}

impl DocumentKind {
    /// 根据扩展名识别文档类型
    pub fn from_path<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "docx" => Ok(DocumentKind::Word),
            "pptx" => Ok(DocumentKind::PowerPoint),
            "xlsx" => Ok(DocumentKind::Excel),
            "csv" => Ok(DocumentKind::Csv),
            "xls" => Err(TranslationError::DocumentFormatError(
                "不支持旧版 .xls 文件，请先另存为 .xlsx".to_string(),
            )),
            _ => Err(TranslationError::DocumentFormatError(format!(
                "不支持的文件类型: {}",
                path.display()
            ))),
        }
    }

    /// 标准扩展名
    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Word => "docx",
            DocumentKind::PowerPoint => "pptx",
            DocumentKind::Excel => "xlsx",
            DocumentKind::Csv => "csv",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Word => "Word",
            DocumentKind::PowerPoint => "PowerPoint",
            DocumentKind::Excel => "Excel",
            DocumentKind::Csv => "CSV",
        };
        f.write_str(name)
    }
}

/// 文本在文档中的位置
///
/// 位置只由结构决定，同一文档两次提取得到相同的位置序列。
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub enum TextLocation {
    /// 工作表单元格，`sheet` 从 0 开始
    Cell {
        sheet: usize,
        sheet_name: String,
        coordinate: String,
    },
    /// 正文段落
    Paragraph { index: usize },
    /// 正文表格单元格
    TableCell { table: usize, row: usize, col: usize },
    /// 幻灯片文本框中的一个文本段，`slide` 从 1 开始
    SlideRun {
        slide: usize,
        shape: usize,
        paragraph: usize,
        run: usize,
    },
    /// 幻灯片表格单元格
    SlideTableCell {
        slide: usize,
        shape: usize,
        row: usize,
        col: usize,
    },
    /// CSV 单元格，译文写入 `write_column`
    CsvCell {
        row: usize,
        column: usize,
        write_column: usize,
    },
}

impl TextLocation {
    /// 稳定的位置标识
    pub fn id(&self) -> String {
        match self {
            TextLocation::Cell {
                sheet, coordinate, ..
            } => format!("sheet_{}_cell_{}", sheet, coordinate),
            TextLocation::Paragraph { index } => format!("para_{}", index),
            TextLocation::TableCell { table, row, col } => {
                format!("table_{}_row_{}_col_{}", table, row, col)
            }
            TextLocation::SlideRun {
                slide,
                shape,
                paragraph,
                run,
            } => format!("slide{}_shape{}_p{}_r{}", slide, shape, paragraph, run),
            TextLocation::SlideTableCell {
                slide,
                shape,
                row,
                col,
            } => format!("slide{}_shape{}_row{}_col{}", slide, shape, row, col),
            TextLocation::CsvCell { row, column, .. } => format!("row_{}_col_{}", row, column),
        }
    }
}

impl fmt::Display for TextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// 文档中未经处理的文本
#[derive(Debug, Clone, PartialEq)]
pub struct RawText {
    pub location: TextLocation,
    pub text: String,
}

/// 文档统一接口
pub trait Document: Send {
    fn kind(&self) -> DocumentKind;

    /// 按文档顺序列出所有带文本的位置
    ///
    /// 迭代器是惰性的，可以反复调用以重新遍历。
    fn text_units(&self) -> Box<dyn Iterator<Item = RawText> + '_>;

    /// 在指定位置写入文本
    fn write_text(&mut self, location: &TextLocation, text: &str) -> TranslationResult<()>;

    /// 序列化为新文件，输入字节保持不变
    fn to_bytes(&self) -> TranslationResult<Vec<u8>>;
}

/// 写回时找不到位置的统一错误
pub(crate) fn unknown_location(location: &TextLocation) -> TranslationError {
    TranslationError::SpliceError {
        unit_id: location.id(),
        message: "文档中不存在该位置".to_string(),
    }
}

// ============================================================================
// 打开文档
// ============================================================================

/// 按类型解析文档
pub fn open_document(kind: DocumentKind, bytes: &[u8]) -> TranslationResult<Box<dyn Document>> {
    open_document_with(kind, bytes, &CsvOptions::default())
}

/// 按类型解析文档，CSV 使用给定选项
pub fn open_document_with(
    kind: DocumentKind,
    bytes: &[u8],
    csv_options: &CsvOptions,
) -> TranslationResult<Box<dyn Document>> {
    let document: Box<dyn Document> = match kind {
        DocumentKind::Word => Box::new(DocxDocument::open(bytes)?),
        DocumentKind::PowerPoint => Box::new(PptxDocument::open(bytes)?),
        DocumentKind::Excel => Box::new(XlsxDocument::open(bytes)?),
        DocumentKind::Csv => Box::new(CsvDocument::open(bytes, csv_options)?),
    };
    Ok(document)
}

/// 从路径读取并解析文档
pub fn open_path<P: AsRef<Path>>(path: P) -> TranslationResult<Box<dyn Document>> {
    let path = path.as_ref();
    let kind = DocumentKind::from_path(path)?;
    let bytes = std::fs::read(path)?;
    open_document(kind, &bytes)
}
