//! Excel 工作簿（.xlsx）
//!
//! 只处理共享字符串单元格和内联字符串单元格。公式、数字、布尔和错误单元格
//! 不会出现在位置表中，因此永远不会被改写。

use std::collections::HashMap;

use super::package::{rel_types, OoxmlPackage};
use super::slots::{SlotTable, TextSlot};
use super::xml::{ElementId, XmlPart};
use super::{Document, DocumentKind, RawText, TextLocation};
use crate::translation::error::{TranslationError, TranslationResult};

/// 工作簿
#[derive(Debug, Clone)]
pub struct XlsxDocument {
    package: OoxmlPackage,
    slots: SlotTable,
}

/// 带命名空间前缀的元素名
struct Names {
    prefix: String,
}

impl Names {
    /// 根据根元素推断前缀，`workbook` 或 `x:workbook`
    fn detect(part: &XmlPart, root_local: &str) -> Option<(Self, ElementId)> {
        let (prefix, root) = part
            .root(root_local)
            .map(|id| (String::new(), id))
            .or_else(|| find_prefixed_root(part, root_local))?;
        Some((Names { prefix }, root))
    }

    fn q(&self, local: &str) -> String {
        format!("{}{}", self.prefix, local)
    }
}

fn find_prefixed_root(part: &XmlPart, root_local: &str) -> Option<(String, ElementId)> {
    ["x:", "s:", "main:"].iter().find_map(|prefix| {
        part.root(&format!("{}{}", prefix, root_local))
            .map(|id| (prefix.to_string(), id))
    })
}

/// 字符串项中的文本元素：`t`，或富文本 `r/t`；注音 `rPh` 不包括在内
fn string_item_texts(part: &XmlPart, names: &Names, item: ElementId) -> Vec<ElementId> {
    let t = names.q("t");
    let direct: Vec<ElementId> = part.children_named(item, &t).collect();
    if !direct.is_empty() {
        return direct;
    }
    let r = names.q("r");
    part.children_named(item, &r)
        .flat_map(|run| part.children_named(run, &t).collect::<Vec<_>>())
        .collect()
}

/// 列号（从 1 开始）转换为列名
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        name.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// 从坐标中取出列号，例如 `AB12` -> 28
///
/// 没有字母或列号溢出时返回 `None`。
fn column_index(coordinate: &str) -> Option<usize> {
    let letters: String = coordinate.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }
    letters
        .to_ascii_uppercase()
        .bytes()
        .try_fold(0usize, |acc, b| acc.checked_mul(26)?.checked_add((b - b'A' + 1) as usize))
}

struct SheetRef {
    name: String,
    part: String,
}

fn workbook_sheets(package: &mut OoxmlPackage, workbook: &str) -> TranslationResult<Vec<SheetRef>> {
    let targets: HashMap<String, String> = package
        .relationships(workbook)?
        .into_iter()
        .filter(|rel| rel.rel_type.ends_with(rel_types::WORKSHEET))
        .map(|rel| (rel.id, rel.target))
        .collect();

    let part = package.load_part(workbook)?;
    let (names, root) = Names::detect(part, "workbook").ok_or_else(|| {
        TranslationError::DocumentFormatError(format!("{} 中没有 workbook", workbook))
    })?;

    let Some(sheets) = part.child_named(root, &names.q("sheets")) else {
        return Ok(Vec::new());
    };

    let mut result = Vec::new();
    for sheet in part.children_named(sheets, &names.q("sheet")) {
        let name = part.attribute(sheet, "name").unwrap_or_default();
        // 图表工作表等非普通工作表没有 worksheet 关系
        match part.attribute(sheet, "r:id").and_then(|id| targets.get(&id).cloned()) {
            Some(part) => result.push(SheetRef { name, part }),
            None => tracing::debug!("工作表 '{}' 不是普通工作表，跳过", name),
        }
    }
    Ok(result)
}

impl XlsxDocument {
    pub fn open(bytes: &[u8]) -> TranslationResult<Self> {
        let mut package = OoxmlPackage::read(bytes)?;
        let workbook = package.main_document()?;
        let sheets = workbook_sheets(&mut package, &workbook)?;

        let shared_strings_part = package
            .relationships(&workbook)?
            .into_iter()
            .find(|rel| rel.rel_type.ends_with(rel_types::SHARED_STRINGS))
            .map(|rel| rel.target);

        let mut to_load: Vec<String> = sheets.iter().map(|sheet| sheet.part.clone()).collect();
        to_load.extend(shared_strings_part.iter().cloned());
        package.load_parts(&to_load)?;

        // 共享字符串表：索引 -> 文本元素
        let shared_strings: Vec<Vec<ElementId>> = match &shared_strings_part {
            Some(name) => {
                let part = package.part(name)?;
                match Names::detect(part, "sst") {
                    Some((names, root)) => part
                        .children_named(root, &names.q("si"))
                        .map(|si| string_item_texts(part, &names, si))
                        .collect(),
                    None => Vec::new(),
                }
            }
            None => Vec::new(),
        };

        let mut slots = Vec::new();
        for (sheet_index, sheet) in sheets.iter().enumerate() {
            let part = package.part(&sheet.part)?;
            let Some((names, root)) = Names::detect(part, "worksheet") else {
                tracing::warn!("工作表 '{}' 结构无法识别，跳过", sheet.name);
                continue;
            };
            let Some(sheet_data) = part.child_named(root, &names.q("sheetData")) else {
                continue;
            };

            for (row_position, row) in part.children_named(sheet_data, &names.q("row")).enumerate() {
                let row_number = part
                    .attribute(row, "r")
                    .and_then(|r| r.parse::<usize>().ok())
                    .unwrap_or(row_position + 1);
                let mut next_column = 1;

                for cell in part.children_named(row, &names.q("c")) {
                    let coordinate = match part.attribute(cell, "r") {
                        Some(r) => r,
                        None => format!("{}{}", column_name(next_column), row_number),
                    };
                    next_column = column_index(&coordinate).unwrap_or(next_column).saturating_add(1);

                    if part.child_named(cell, &names.q("f")).is_some() {
                        continue;
                    }

                    let (slot_part, elements) = match part.attribute(cell, "t").as_deref() {
                        Some("s") => {
                            let index = part
                                .child_named(cell, &names.q("v"))
                                .and_then(|v| part.text(v).trim().parse::<usize>().ok());
                            match (index, &shared_strings_part) {
                                (Some(index), Some(sst)) if index < shared_strings.len() => {
                                    (sst.clone(), shared_strings[index].clone())
                                }
                                _ => {
                                    tracing::warn!(
                                        "单元格 {}!{} 的共享字符串索引无效",
                                        sheet.name,
                                        coordinate
                                    );
                                    continue;
                                }
                            }
                        }
                        Some("inlineStr") => match part.child_named(cell, &names.q("is")) {
                            Some(is) => (sheet.part.clone(), string_item_texts(part, &names, is)),
                            None => continue,
                        },
                        _ => continue,
                    };

                    slots.push(TextSlot {
                        part: slot_part,
                        location: TextLocation::Cell {
                            sheet: sheet_index,
                            sheet_name: sheet.name.clone(),
                            coordinate,
                        },
                        paragraphs: vec![elements],
                    });
                }
            }
        }

        tracing::debug!("Excel 文档: {} 个工作表, {} 个文本单元格", sheets.len(), slots.len());

        Ok(Self {
            package,
            slots: SlotTable::new(slots, true),
        })
    }
}

impl Document for XlsxDocument {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Excel
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
