//! Word 文档（.docx）
//!
//! 正文中的段落和表格单元格各自构成一个位置。

use super::package::OoxmlPackage;
use super::slots::{SlotTable, TextSlot};
use super::xml::{ElementId, XmlPart};
use super::{Document, DocumentKind, RawText, TextLocation};
use crate::translation::error::{TranslationError, TranslationResult};

/// 可包含文本段的段落内容容器
const RUN_CONTAINERS: &[&str] = &[
    "w:hyperlink",
    "w:ins",
    "w:smartTag",
    "w:fldSimple",
    "w:sdt",
    "w:sdtContent",
];

/// 文本段中的段内元素：`w:t`、换行 `w:br`/`w:cr` 和制表符 `w:tab`
///
/// 分页符和分栏符不属于文本，写回时保持原位。
fn run_segments(part: &XmlPart, run: ElementId) -> impl Iterator<Item = ElementId> + '_ {
    part.children(run).filter(move |&child| match part.name(child) {
        "w:t" | "w:cr" | "w:tab" => true,
        "w:br" => !matches!(
            part.attribute(child, "w:type").as_deref(),
            Some("page") | Some("column")
        ),
        _ => false,
    })
}

/// 段落中属于文本段的段内元素，不进入文本框等嵌入内容
fn paragraph_texts(part: &XmlPart, paragraph: ElementId) -> Vec<ElementId> {
    let mut texts = Vec::new();
    for child in part.children(paragraph) {
        match part.name(child) {
            "w:r" => texts.extend(run_segments(part, child)),
            name if RUN_CONTAINERS.contains(&name) => texts.extend(paragraph_texts(part, child)),
            _ => {}
        }
    }
    texts
}

/// Word 文档
#[derive(Debug, Clone)]
pub struct DocxDocument {
    package: OoxmlPackage,
    slots: SlotTable,
}

impl DocxDocument {
    pub fn open(bytes: &[u8]) -> TranslationResult<Self> {
        let mut package = OoxmlPackage::read(bytes)?;
        let part_name = package.main_document()?;
        let part = package.load_part(&part_name)?;

        let body = part
            .root("w:document")
            .and_then(|document| part.child_named(document, "w:body"))
            .ok_or_else(|| {
                TranslationError::DocumentFormatError(format!("{} 中没有 w:body", part_name))
            })?;

        let mut slots = Vec::new();
        let mut paragraph_index = 0;
        let mut table_index = 0;

        for child in part.children(body) {
            match part.name(child) {
                "w:p" => {
                    slots.push(TextSlot {
                        part: part_name.clone(),
                        location: TextLocation::Paragraph {
                            index: paragraph_index,
                        },
                        paragraphs: vec![paragraph_texts(part, child)],
                    });
                    paragraph_index += 1;
                }
                "w:tbl" => {
                    for (row, tr) in part.children_named(child, "w:tr").enumerate() {
                        for (col, tc) in part.children_named(tr, "w:tc").enumerate() {
                            slots.push(TextSlot {
                                part: part_name.clone(),
                                location: TextLocation::TableCell {
                                    table: table_index,
                                    row,
                                    col,
                                },
                                paragraphs: part
                                    .descendants_named(tc, "w:p")
                                    .into_iter()
                                    .map(|p| paragraph_texts(part, p))
                                    .collect(),
                            });
                        }
                    }
                    table_index += 1;
                }
                _ => {}
            }
        }

        tracing::debug!("Word 文档: {} 个段落, {} 个表格", paragraph_index, table_index);

        Ok(Self {
            package,
            slots: SlotTable::new(slots, true).with_inline_markers(),
        })
    }
}

impl Document for DocxDocument {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Word
    }

    fn text_units(&self) -> Box<dyn Iterator<Item = RawText> + '_> {
        Box::new(self.slots.texts(&self.package))
    }

    fn write_text(&mut self, location: &TextLocation, text: &str) -> TranslationResult<()> {
        self.slots.write(&mut self.package, location, text)
    }

    fn to_bytes(&self) -> TranslationResult<Vec<u8>> {
        self.package.to_bytes()
    }
}
