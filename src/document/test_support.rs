//! 单元测试用的最小 OOXML 包

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// 按给定内容打包
pub fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// 打包并补上指向 `main_part` 的包级关系
pub fn build_package(files: &[(&str, &str)], main_part: &str) -> Vec<u8> {
    let rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="{}"/></Relationships>"#,
        main_part
    );
    let mut all = vec![("_rels/.rels", rels.as_str())];
    all.extend_from_slice(files);
    build_zip(&all)
}
