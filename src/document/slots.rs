//! OOXML 文本位置表
//!
//! 每个位置记录所在部件和按段落分组的段内元素（文本元素以及换行、制表符元素）。
//! 读取时段落以换行连接。写回时如果译文行数与段落数相同，每行写回各自的段落；
//! 否则整段文本写入第一个文本元素，其余文本元素清空。

use std::collections::HashMap;

use super::package::OoxmlPackage;
use super::xml::{ElementId, XmlPart};
use super::{unknown_location, RawText, TextLocation};
use crate::translation::error::{TranslationError, TranslationResult};

#[derive(Debug, Clone)]
pub(crate) struct TextSlot {
    pub part: String,
    pub location: TextLocation,
    pub paragraphs: Vec<Vec<ElementId>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SlotTable {
    slots: Vec<TextSlot>,
    index: HashMap<TextLocation, usize>,
    /// 写入时是否补 `xml:space="preserve"`
    preserve_space: bool,
    /// 写入时 `\n`、`\t` 是否转成换行、制表符元素
    inline_markers: bool,
}

impl SlotTable {
    pub fn new(slots: Vec<TextSlot>, preserve_space: bool) -> Self {
        let index = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.location.clone(), i))
            .collect();
        Self {
            slots,
            index,
            preserve_space,
            inline_markers: false,
        }
    }

    /// 段内换行和制表符写成 `br`、`tab` 元素（Word 文本段）
    pub fn with_inline_markers(mut self) -> Self {
        self.inline_markers = true;
        self
    }

    /// 按文档顺序读取所有位置的文本
    pub fn texts<'a>(&'a self, package: &'a OoxmlPackage) -> impl Iterator<Item = RawText> + 'a {
        self.slots.iter().filter_map(move |slot| {
            let part = package.part(&slot.part).ok()?;
            let text = slot
                .paragraphs
                .iter()
                .map(|elements| part.joined_text(elements))
                .collect::<Vec<_>>()
                .join("\n");
            Some(RawText {
                location: slot.location.clone(),
                text,
            })
        })
    }

    /// 写回文本
    pub fn write(
        &self,
        package: &mut OoxmlPackage,
        location: &TextLocation,
        text: &str,
    ) -> TranslationResult<()> {
        let slot = self
            .index
            .get(location)
            .map(|&i| &self.slots[i])
            .ok_or_else(|| unknown_location(location))?;

        let part = package.part_mut(&slot.part)?;
        let lines: Vec<&str> = text.split('\n').collect();

        // 多段落位置：行数与段落数一致，且每个非空行都有可写入的文本元素
        let per_paragraph = slot.paragraphs.len() > 1
            && lines.len() == slot.paragraphs.len()
            && slot
                .paragraphs
                .iter()
                .zip(&lines)
                .all(|(elements, line)| line.is_empty() || first_text(part, elements).is_some());

        if per_paragraph {
            for (elements, line) in slot.paragraphs.iter().zip(lines) {
                self.write_elements(part, elements.iter().copied(), line);
            }
            return Ok(());
        }

        let mut elements = slot.paragraphs.iter().flatten().copied();
        if !elements.clone().any(|id| part.marker(id).is_none()) {
            return Err(TranslationError::SpliceError {
                unit_id: location.id(),
                message: "没有可写入的文本节点".to_string(),
            });
        }
        self.write_elements(part, &mut elements, text);
        Ok(())
    }

    /// 文本写入第一个文本元素，其余文本元素清空，原有的换行、制表符元素删除
    fn write_elements(&self, part: &mut XmlPart, elements: impl Iterator<Item = ElementId>, text: &str) {
        let mut written = false;
        for id in elements {
            if part.marker(id).is_some() {
                part.remove(id);
            } else if written {
                part.set_text(id, "", false);
            } else {
                if self.inline_markers {
                    part.set_text_with_markers(id, text, self.preserve_space);
                } else {
                    part.set_text(id, text, self.preserve_space);
                }
                written = true;
            }
        }
    }
}

fn first_text(part: &XmlPart, elements: &[ElementId]) -> Option<ElementId> {
    elements.iter().copied().find(|&id| part.marker(id).is_none())
}
