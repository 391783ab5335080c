//! OOXML 压缩包读写
//!
//! 包中所有条目按原顺序保留。需要处理的 XML 部件按需并行解析，
//! 写出时只有被修改的部件重新序列化，其余条目（包括媒体文件）原样复制。

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use rayon::prelude::*;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::xml::XmlPart;
use crate::translation::error::{TranslationError, TranslationResult};

/// 关系类型后缀
pub mod rel_types {
    pub const OFFICE_DOCUMENT: &str = "/officeDocument";
    pub const WORKSHEET: &str = "/worksheet";
    pub const SHARED_STRINGS: &str = "/sharedStrings";
    pub const SLIDE: &str = "/slide";
}

#[derive(Debug, Clone)]
struct PackageEntry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// 包内关系
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// 已解析为包内绝对路径
    pub target: String,
}

/// OOXML 包
#[derive(Debug, Clone)]
pub struct OoxmlPackage {
    entries: Vec<PackageEntry>,
    parts: HashMap<String, XmlPart>,
}

impl OoxmlPackage {
    /// 读取压缩包
    pub fn read(bytes: &[u8]) -> TranslationResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).map_err(|e| {
                TranslationError::DocumentFormatError(format!("读取 {} 失败: {}", file.name(), e))
            })?;
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }

        Ok(Self {
            entries,
            parts: HashMap::new(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    fn raw(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.data.as_slice())
    }

    /// 并行解析指定部件，已解析的部件跳过
    pub fn load_parts(&mut self, names: &[String]) -> TranslationResult<()> {
        let pending: Vec<(&String, &[u8])> = names
            .iter()
            .filter(|name| !self.parts.contains_key(name.as_str()))
            .map(|name| {
                self.raw(name)
                    .map(|data| (name, data))
                    .ok_or_else(|| {
                        TranslationError::DocumentFormatError(format!("缺少部件 {}", name))
                    })
            })
            .collect::<TranslationResult<_>>()?;

        let parsed: Vec<(String, XmlPart)> = pending
            .par_iter()
            .map(|(name, data)| XmlPart::parse(name, data).map(|part| ((*name).clone(), part)))
            .collect::<TranslationResult<_>>()?;

        self.parts.extend(parsed);
        Ok(())
    }

    /// 解析单个部件并返回
    pub fn load_part(&mut self, name: &str) -> TranslationResult<&XmlPart> {
        self.load_parts(&[name.to_string()])?;
        self.part(name)
    }

    pub fn part(&self, name: &str) -> TranslationResult<&XmlPart> {
        self.parts
            .get(name)
            .ok_or_else(|| TranslationError::DocumentFormatError(format!("部件 {} 未加载", name)))
    }

    pub fn part_mut(&mut self, name: &str) -> TranslationResult<&mut XmlPart> {
        self.parts
            .get_mut(name)
            .ok_or_else(|| TranslationError::DocumentFormatError(format!("部件 {} 未加载", name)))
    }

    /// 读取某个部件的关系表
    ///
    /// `source` 为空字符串时读取包级关系 `_rels/.rels`。
    pub fn relationships(&mut self, source: &str) -> TranslationResult<Vec<Relationship>> {
        let (dir, rels_name) = rels_path(source);
        if !self.contains(&rels_name) {
            return Ok(Vec::new());
        }

        let part = self.load_part(&rels_name)?;
        let Some(root) = part.root("Relationships") else {
            return Err(TranslationError::DocumentFormatError(format!(
                "{} 不是关系部件",
                rels_name
            )));
        };

        let relationships = part
            .children_named(root, "Relationship")
            .filter(|&rel| part.attribute(rel, "TargetMode").as_deref() != Some("External"))
            .filter_map(|rel| {
                Some(Relationship {
                    id: part.attribute(rel, "Id")?,
                    rel_type: part.attribute(rel, "Type")?,
                    target: resolve_target(&dir, &part.attribute(rel, "Target")?),
                })
            })
            .collect();

        Ok(relationships)
    }

    /// 包级主文档路径
    pub fn main_document(&mut self) -> TranslationResult<String> {
        self.relationships("")?
            .into_iter()
            .find(|rel| rel.rel_type.ends_with(rel_types::OFFICE_DOCUMENT))
            .map(|rel| rel.target)
            .ok_or_else(|| TranslationError::DocumentFormatError("找不到主文档关系".to_string()))
    }

    /// 写出新的压缩包
    pub fn to_bytes(&self) -> TranslationResult<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);

            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)?;
                continue;
            }

            zip.start_file(entry.name.as_str(), options)?;
            match self.parts.get(&entry.name) {
                Some(part) if part.is_modified() => zip.write_all(&part.to_bytes()?)?,
                _ => zip.write_all(&entry.data)?,
            }
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// 部件所在目录及其关系部件路径
fn rels_path(source: &str) -> (String, String) {
    match source.rsplit_once('/') {
        Some((dir, file)) => (dir.to_string(), format!("{}/_rels/{}.rels", dir, file)),
        None if source.is_empty() => (String::new(), "_rels/.rels".to_string()),
        None => (String::new(), format!("_rels/{}.rels", source)),
    }
}

/// 将关系目标解析为包内绝对路径
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::build_zip;

    #[test]
    fn test_target_resolution() {
        assert_eq!(resolve_target("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("ppt/slides", "../media/image1.png"), "ppt/media/image1.png");
        assert_eq!(resolve_target("xl", "/xl/sharedStrings.xml"), "xl/sharedStrings.xml");
        assert_eq!(resolve_target("", "word/document.xml"), "word/document.xml");
        assert_eq!(rels_path("xl/workbook.xml").1, "xl/_rels/workbook.xml.rels");
        assert_eq!(rels_path("").1, "_rels/.rels");
    }

    #[test]
    fn test_relationships_and_roundtrip() {
        let bytes = build_zip(&[
            (
                "_rels/.rels",
                r#"<Relationships><Relationship Id="rId1" Type="http://x/officeDocument" Target="word/document.xml"/></Relationships>"#,
            ),
            ("word/document.xml", "<w:document><w:t>Hi</w:t></w:document>"),
            ("word/media/logo.bin", "\u{1}\u{2}binary"),
        ]);

        let mut package = OoxmlPackage::read(&bytes).unwrap();
        assert_eq!(package.main_document().unwrap(), "word/document.xml");

        package.load_parts(&["word/document.xml".to_string()]).unwrap();
        let part = package.part_mut("word/document.xml").unwrap();
        let root = part.root("w:document").unwrap();
        let text = part.descendants_named(root, "w:t")[0];
        part.set_text(text, "Hallo", false);

        let output = OoxmlPackage::read(&package.to_bytes().unwrap()).unwrap();
        assert_eq!(
            output.raw("word/document.xml"),
            Some("<w:document><w:t>Hallo</w:t></w:document>".as_bytes())
        );
        assert_eq!(output.raw("word/media/logo.bin"), Some("\u{1}\u{2}binary".as_bytes()));
    }

    #[test]
    fn test_missing_part_and_bad_zip() {
        let bytes = build_zip(&[("a.xml", "<a/>")]);
        let mut package = OoxmlPackage::read(&bytes).unwrap();
        assert!(matches!(
            package.load_parts(&["b.xml".to_string()]),
            Err(TranslationError::DocumentFormatError(_))
        ));
        assert!(matches!(
            OoxmlPackage::read(b"not a zip"),
            Err(TranslationError::DocumentFormatError(_))
        ));
    }
}
