//! PowerPoint 演示文稿（.pptx）
//!
//! 幻灯片按 `p:sldIdLst` 顺序从 1 编号。文本框中的每个 `a:r` 是一个位置，
//! 表格中的每个单元格是一个位置。

use std::collections::HashMap;

use super::package::{rel_types, OoxmlPackage};
use super::slots::{SlotTable, TextSlot};
use super::xml::{ElementId, XmlPart};
use super::{Document, DocumentKind, RawText, TextLocation};
use crate::translation::error::{TranslationError, TranslationResult};

/// `p:spTree` 中计入形状编号的元素
const SHAPE_ELEMENTS: &[&str] = &[
    "p:sp",
    "p:grpSp",
    "p:graphicFrame",
    "p:cxnSp",
    "p:pic",
    "p:contentPart",
];

/// 演示文稿
#[derive(Debug, Clone)]
pub struct PptxDocument {
    package: OoxmlPackage,
    slots: SlotTable,
}

/// 按顺序列出幻灯片部件
fn slide_parts(package: &mut OoxmlPackage, presentation: &str) -> TranslationResult<Vec<String>> {
    let targets: HashMap<String, String> = package
        .relationships(presentation)?
        .into_iter()
        .filter(|rel| rel.rel_type.ends_with(rel_types::SLIDE))
        .map(|rel| (rel.id, rel.target))
        .collect();

    let part = package.load_part(presentation)?;
    let root = part.root("p:presentation").ok_or_else(|| {
        TranslationError::DocumentFormatError(format!("{} 中没有 p:presentation", presentation))
    })?;

    let Some(list) = part.child_named(root, "p:sldIdLst") else {
        return Ok(Vec::new());
    };

    part.children_named(list, "p:sldId")
        .map(|slide| {
            part.attribute(slide, "r:id")
                .and_then(|id| targets.get(&id).cloned())
                .ok_or_else(|| {
                    TranslationError::DocumentFormatError("幻灯片关系缺失".to_string())
                })
        })
        .collect()
}

/// 单元格或文本框中按段落分组的 `a:t`
fn text_body_paragraphs(part: &XmlPart, body: ElementId) -> Vec<Vec<ElementId>> {
    part.children_named(body, "a:p")
        .map(|p| {
            part.children_named(p, "a:r")
                .flat_map(|r| part.children_named(r, "a:t"))
                .collect()
        })
        .collect()
}

fn collect_slide(part_name: &str, part: &XmlPart, slide: usize, slots: &mut Vec<TextSlot>) {
    let tree = part
        .root("p:sld")
        .and_then(|sld| part.child_named(sld, "p:cSld"))
        .and_then(|c_sld| part.child_named(c_sld, "p:spTree"));
    let Some(tree) = tree else {
        tracing::warn!("幻灯片 {} 没有形状树，跳过", slide);
        return;
    };

    let shapes = part
        .children(tree)
        .filter(|&child| SHAPE_ELEMENTS.contains(&part.name(child)));

    for (shape, element) in shapes.enumerate() {
        match part.name(element) {
            "p:sp" => {
                let Some(body) = part.child_named(element, "p:txBody") else {
                    continue;
                };
                for (paragraph, p) in part.children_named(body, "a:p").enumerate() {
                    for (run, r) in part.children_named(p, "a:r").enumerate() {
                        slots.push(TextSlot {
                            part: part_name.to_string(),
                            location: TextLocation::SlideRun {
                                slide,
                                shape,
                                paragraph,
                                run,
                            },
                            paragraphs: vec![part.children_named(r, "a:t").collect()],
                        });
                    }
                }
            }
            "p:graphicFrame" => {
                let Some(table) = part.descendants_named(element, "a:tbl").into_iter().next() else {
                    continue;
                };
                for (row, tr) in part.children_named(table, "a:tr").enumerate() {
                    for (col, tc) in part.children_named(tr, "a:tc").enumerate() {
                        let paragraphs = part
                            .child_named(tc, "a:txBody")
                            .map(|body| text_body_paragraphs(part, body))
                            .unwrap_or_default();
                        slots.push(TextSlot {
                            part: part_name.to_string(),
                            location: TextLocation::SlideTableCell {
                                slide,
                                shape,
                                row,
                                col,
                            },
                            paragraphs,
                        });
                    }
                }
            }
            _ => {}
        }
    }
}

impl PptxDocument {
    pub fn open(bytes: &[u8]) -> TranslationResult<Self> {
        let mut package = OoxmlPackage::read(bytes)?;
        let presentation = package.main_document()?;
        let slides = slide_parts(&mut package, &presentation)?;
        package.load_parts(&slides)?;

        let mut slots = Vec::new();
        for (index, part_name) in slides.iter().enumerate() {
            collect_slide(part_name, package.part(part_name)?, index + 1, &mut slots);
        }

        tracing::debug!("PowerPoint 文档: {} 张幻灯片, {} 个文本位置", slides.len(), slots.len());

        Ok(Self {
            package,
            slots: SlotTable::new(slots, false),
        })
    }
}

impl Document for PptxDocument {
    fn kind(&self) -> DocumentKind {
        DocumentKind::PowerPoint
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::build_package;

    const PRESENTATION: &str = r#"<p:presentation xmlns:p="urn:p" xmlns:r="urn:r"><p:sldIdLst><p:sldId id="257" r:id="rId3"/><p:sldId id="256" r:id="rId2"/></p:sldIdLst></p:presentation>"#;
    const PRESENTATION_RELS: &str = r#"<Relationships><Relationship Id="rId2" Type="http://x/slide" Target="slides/slide1.xml"/><Relationship Id="rId3" Type="http://x/slide" Target="slides/slide2.xml"/><Relationship Id="rId9" Type="http://x/slideMaster" Target="slideMasters/slideMaster1.xml"/></Relationships>"#;
    const SLIDE_TEXT: &str = r#"<p:sld xmlns:p="urn:p" xmlns:a="urn:a"><p:cSld><p:spTree><p:nvGrpSpPr/><p:grpSpPr/>
<p:sp><p:txBody><a:bodyPr/><a:p><a:r><a:t>Hello</a:t></a:r><a:r><a:t> world</a:t></a:r></a:p><a:p><a:r><a:t>Second</a:t></a:r></a:p></p:txBody></p:sp>
<p:pic/>
<p:sp><p:txBody><a:p><a:r><a:t>Thank you</a:t></a:r></a:p></p:txBody></p:sp>
</p:spTree></p:cSld></p:sld>"#;
    const SLIDE_TABLE: &str = r#"<p:sld xmlns:p="urn:p" xmlns:a="urn:a"><p:cSld><p:spTree>
<p:graphicFrame><a:graphic><a:graphicData><a:tbl><a:tr><a:tc><a:txBody><a:p><a:r><a:t>Name</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:p><a:r><a:t>Line 1</a:t></a:r></a:p><a:p><a:r><a:t>Line 2</a:t></a:r></a:p></a:txBody></a:tc></a:tr></a:tbl></a:graphicData></a:graphic></p:graphicFrame>
</p:spTree></p:cSld></p:sld>"#;

    fn sample() -> Vec<u8> {
        build_package(
            &[
                ("ppt/presentation.xml", PRESENTATION),
                ("ppt/_rels/presentation.xml.rels", PRESENTATION_RELS),
                ("ppt/slides/slide1.xml", SLIDE_TEXT),
                ("ppt/slides/slide2.xml", SLIDE_TABLE),
            ],
            "ppt/presentation.xml",
        )
    }

    #[test]
    fn test_slide_order_and_ids() {
        let doc = PptxDocument::open(&sample()).unwrap();
        let units: Vec<_> = doc.text_units().map(|u| (u.location.id(), u.text)).collect();
        assert_eq!(
            units,
            vec![
                // sldIdLst 中 rId3 (slide2.xml) 排在前面
                ("slide1_shape0_row0_col0".to_string(), "Name".to_string()),
                ("slide1_shape0_row0_col1".to_string(), "Line 1\nLine 2".to_string()),
                ("slide2_shape0_p0_r0".to_string(), "Hello".to_string()),
                ("slide2_shape0_p0_r1".to_string(), " world".to_string()),
                ("slide2_shape0_p1_r0".to_string(), "Second".to_string()),
                ("slide2_shape2_p0_r0".to_string(), "Thank you".to_string()),
            ]
        );
    }

    #[test]
    fn test_write_run_and_cell() {
        let mut doc = PptxDocument::open(&sample()).unwrap();
        let run = TextLocation::SlideRun {
            slide: 2,
            shape: 2,
            paragraph: 0,
            run: 0,
        };
        let cell = TextLocation::SlideTableCell {
            slide: 1,
            shape: 0,
            row: 0,
            col: 1,
        };
        doc.write_text(&run, "Danke").unwrap();
        doc.write_text(&cell, "Zeile").unwrap();

        let reopened = PptxDocument::open(&doc.to_bytes().unwrap()).unwrap();
        let texts: HashMap<_, _> = reopened
            .text_units()
            .map(|u| (u.location, u.text))
            .collect();
        assert_eq!(texts[&run], "Danke");
        assert_eq!(texts[&cell], "Zeile\n");
    }

    #[test]
    fn test_cell_lines_go_back_into_their_paragraphs() {
        let mut doc = PptxDocument::open(&sample()).unwrap();
        let cell = TextLocation::SlideTableCell {
            slide: 1,
            shape: 0,
            row: 0,
            col: 1,
        };
        doc.write_text(&cell, "Zeile 1\nZeile 2").unwrap();

        let reopened = PptxDocument::open(&doc.to_bytes().unwrap()).unwrap();
        let text = reopened
            .text_units()
            .find(|u| u.location == cell)
            .map(|u| u.text)
            .unwrap();
        assert_eq!(text, "Zeile 1\nZeile 2");
    }
}
