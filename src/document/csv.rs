//! 问卷 CSV
//!
//! 第一行是表头，不参与翻译。默认模式下每个数据单元格就地翻译；
//! 列映射模式下只翻译目标列为空的行，译文写入目标列。

use csv::{ReaderBuilder, Terminator, WriterBuilder};

use super::{unknown_location, Document, DocumentKind, RawText, TextLocation};
use crate::translation::error::{TranslationError, TranslationResult};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 自动识别时考虑的分隔符
const CANDIDATE_DELIMITERS: &[u8] = b";,\t";

/// CSV 选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvOptions {
    /// 分隔符，`None` 时自动识别
    pub delimiter: Option<u8>,
    /// 列映射：源列表头
    pub source_column: Option<String>,
    /// 列映射：目标列表头
    pub target_column: Option<String>,
}

impl CsvOptions {
    fn mapping(&self) -> TranslationResult<Option<(&str, &str)>> {
        match (&self.source_column, &self.target_column) {
            (Some(source), Some(target)) => Ok(Some((source.as_str(), target.as_str()))),
            (None, None) => Ok(None),
            _ => Err(TranslationError::InvalidInput(
                "列映射需要同时指定源列和目标列".to_string(),
            )),
        }
    }
}

/// CSV 文档
#[derive(Debug, Clone)]
pub struct CsvDocument {
    delimiter: u8,
    had_bom: bool,
    /// 按输入的第一个换行保留 LF 或 CRLF
    terminator: Terminator,
    records: Vec<Vec<String>>,
    /// 列映射模式下的 (源列, 目标列)
    mapping: Option<(usize, usize)>,
}

/// 解码字节：UTF-8（可带 BOM），否则按 Windows-1252
fn decode(bytes: &[u8]) -> (String, bool) {
    let (body, had_bom) = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (rest, true),
        None => (bytes, false),
    };

    match std::str::from_utf8(body) {
        Ok(text) => (text.to_string(), had_bom),
        Err(_) => {
            tracing::debug!("CSV 不是 UTF-8，按 Windows-1252 解码");
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(body);
            (text.into_owned(), had_bom)
        }
    }
}

/// 按首行中出现次数最多的候选字符识别分隔符，默认逗号
fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or_default();
    CANDIDATE_DELIMITERS
        .iter()
        .copied()
        .map(|d| (d, first_line.bytes().filter(|&b| b == d).count()))
        .filter(|&(_, count)| count > 0)
        .max_by_key(|&(_, count)| count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

fn detect_terminator(text: &str) -> Terminator {
    match text.find('\n') {
        Some(end) if text[..end].ends_with('\r') => Terminator::CRLF,
        _ => Terminator::Any(b'\n'),
    }
}

fn column_position(header: &[String], name: &str) -> TranslationResult<usize> {
    header
        .iter()
        .position(|column| column.trim() == name.trim())
        .ok_or_else(|| TranslationError::DocumentFormatError(format!("CSV 中没有列 '{}'", name)))
}

impl CsvDocument {
    pub fn open(bytes: &[u8], options: &CsvOptions) -> TranslationResult<Self> {
        let (text, had_bom) = decode(bytes);
        let delimiter = options.delimiter.unwrap_or_else(|| detect_delimiter(&text));
        let terminator = detect_terminator(&text);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(text.as_bytes());

        let records = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect::<Vec<_>>()))
            .collect::<Result<Vec<_>, _>>()?;

        let mapping = match options.mapping()? {
            Some((source, target)) => {
                let header = records.first().map(Vec::as_slice).unwrap_or_default();
                Some((column_position(header, source)?, column_position(header, target)?))
            }
            None => None,
        };

        tracing::debug!(
            "CSV 文档: {} 行, 分隔符 {:?}, BOM {}",
            records.len(),
            delimiter as char,
            had_bom
        );

        Ok(Self {
            delimiter,
            had_bom,
            terminator,
            records,
            mapping,
        })
    }

    fn cell(&self, row: usize, column: usize) -> &str {
        self.records
            .get(row)
            .and_then(|record| record.get(column))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl Document for CsvDocument {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Csv
    }

    fn text_units(&self) -> Box<dyn Iterator<Item = RawText> + '_> {
        let rows = self.records.iter().enumerate().skip(1);
        match self.mapping {
            Some((source, target)) => Box::new(rows.filter_map(move |(row, _)| {
                if !self.cell(row, target).trim().is_empty() {
                    return None;
                }
                Some(RawText {
                    location: TextLocation::CsvCell {
                        row,
                        column: source,
                        write_column: target,
                    },
                    text: self.cell(row, source).to_string(),
                })
            })),
            None => Box::new(rows.flat_map(|(row, record)| {
                record.iter().enumerate().map(move |(column, text)| RawText {
                    location: TextLocation::CsvCell {
                        row,
                        column,
                        write_column: column,
                    },
                    text: text.clone(),
                })
            })),
        }
    }

    fn write_text(&mut self, location: &TextLocation, text: &str) -> TranslationResult<()> {
        let TextLocation::CsvCell {
            row, write_column, ..
        } = *location
        else {
            return Err(unknown_location(location));
        };
        if row == 0 {
            return Err(unknown_location(location));
        }

        let record = self
            .records
            .get_mut(row)
            .ok_or_else(|| unknown_location(location))?;
        if record.len() <= write_column {
            record.resize(write_column + 1, String::new());
        }
        record[write_column] = text.to_string();
        Ok(())
    }

    fn to_bytes(&self) -> TranslationResult<Vec<u8>> {
        let mut output = Vec::new();
        if self.had_bom {
            output.extend_from_slice(UTF8_BOM);
        }

        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .terminator(self.terminator)
            .flexible(true)
            .from_writer(output);
        for record in &self.records {
            writer.write_record(record)?;
        }

        writer
            .into_inner()
            .map_err(|e| TranslationError::IoError(e.error().to_string()))
    }
}
