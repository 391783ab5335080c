// 集成测试公共模块
//
// 提供脚本化的翻译客户端、测试配置和文档样例

use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use office_translator::document::{open_document_with, CsvOptions, DocumentKind};
use office_translator::translation::client::{BatchRequest, TranslationClient};
use office_translator::translation::config::TranslationConfig;
use office_translator::translation::error::{TranslationError, TranslationResult};
use office_translator::translation::{JobContext, TranslationService};

// ============================================================================
// 脚本化客户端
// ============================================================================

/// 按字典翻译的客户端
///
/// 字典的键是实际发送的文本（占位符已屏蔽），字典中没有的文本不出现在响应中。
#[derive(Default)]
pub struct MockClient {
    dictionary: HashMap<String, String>,
    /// 依次返回的错误，用完后按字典翻译
    scripted_errors: Mutex<VecDeque<TranslationError>>,
    /// 每次调用都返回的错误
    always_fail: Option<TranslationError>,
    credential_error: Option<TranslationError>,
    calls: AtomicUsize,
    requests: Mutex<Vec<BatchRequest>>,
}

impl MockClient {
    pub fn with_dictionary(pairs: &[(&str, &str)]) -> Self {
        Self {
            dictionary: pairs
                .iter()
                .map(|(source, target)| (source.to_string(), target.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing_with(mut self, error: TranslationError) -> Self {
        self.always_fail = Some(error);
        self
    }

    pub fn then_errors(self, errors: Vec<TranslationError>) -> Self {
        *self.scripted_errors.lock().unwrap_or_else(PoisonError::into_inner) = errors.into();
        self
    }

    pub fn rejecting_credentials(mut self) -> Self {
        self.credential_error = Some(TranslationError::CredentialError("invalid key".to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<BatchRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// 所有请求中发送过的文本
    pub fn sent_texts(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .flat_map(|request| request.texts.into_values())
            .collect()
    }
}

#[async_trait]
impl TranslationClient for MockClient {
    async fn translate_batch(&self, request: &BatchRequest) -> TranslationResult<HashMap<String, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(error) = &self.always_fail {
            return Err(error.clone());
        }
        if let Some(error) = self
            .scripted_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return Err(error);
        }

        Ok(request
            .texts
            .iter()
            .filter_map(|(key, text)| {
                self.dictionary
                    .get(text)
                    .map(|translated| (key.clone(), translated.clone()))
            })
            .collect())
    }

    async fn ensure_credentials(&self) -> TranslationResult<()> {
        match &self.credential_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

// ============================================================================
// 配置和服务
// ============================================================================

/// 测试配置：不限流，重试几乎不等待
pub fn test_config(batch_size: usize) -> TranslationConfig {
    TranslationConfig {
        batch_size,
        rate_limit_enabled: false,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 2,
        retry_jitter: false,
        ..TranslationConfig::default()
    }
}

pub fn service_with(client: &Arc<MockClient>, config: TranslationConfig) -> TranslationService {
    TranslationService::with_client(config, Arc::clone(client) as Arc<dyn TranslationClient>)
        .expect("test config should be valid")
}

/// 运行一个任务，返回任务上下文和结果
pub async fn run(
    service: &TranslationService,
    kind: DocumentKind,
    input: &[u8],
) -> (JobContext, TranslationResult<Vec<u8>>) {
    let mut job = service.new_job(format!("input.{}", kind.extension()), kind);
    let result = service.run_job(&mut job, input, &CsvOptions::default()).await;
    (job, result)
}

/// 重新打开输出文件，列出所有位置的文本
pub fn texts_of(kind: DocumentKind, bytes: &[u8]) -> Vec<String> {
    open_document_with(kind, bytes, &CsvOptions::default())
        .expect("output should reopen")
        .text_units()
        .map(|unit| unit.text)
        .collect()
}

// ============================================================================
// 文档样例
// ============================================================================

pub fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn package_rels(main_part: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="{}"/></Relationships>"#,
        main_part
    )
}

/// Word 文档：三个段落和一个表格
pub fn docx_fixture() -> Vec<u8> {
    let rels = package_rels("word/document.xml");
    build_zip(&[
        ("_rels/.rels", &rels),
        (
            "word/document.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Hello</w:t></w:r></w:p>
<w:p><w:r><w:t>42</w:t></w:r></w:p>
<w:p><w:r><w:t>Thank</w:t></w:r><w:r><w:t xml:space="preserve"> you</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Goodbye</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:sectPr/>
</w:body></w:document>"#,
        ),
    ])
}

/// PowerPoint 文档：一张幻灯片，一个文本框和一个表格
pub fn pptx_fixture() -> Vec<u8> {
    let rels = package_rels("ppt/presentation.xml");
    build_zip(&[
        ("_rels/.rels", &rels),
        (
            "ppt/presentation.xml",
            r#"<p:presentation xmlns:p="urn:p" xmlns:r="urn:r"><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst></p:presentation>"#,
        ),
        (
            "ppt/_rels/presentation.xml.rels",
            r#"<Relationships><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/></Relationships>"#,
        ),
        (
            "ppt/slides/slide1.xml",
            r#"<p:sld xmlns:p="urn:p" xmlns:a="urn:a"><p:cSld><p:spTree>
<p:sp><p:txBody><a:p><a:r><a:t>Hello</a:t></a:r></a:p></p:txBody></p:sp>
<p:graphicFrame><a:graphic><a:graphicData><a:tbl><a:tr><a:tc><a:txBody><a:p><a:r><a:t>Thank you</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:p><a:r><a:t>2024</a:t></a:r></a:p></a:txBody></a:tc></a:tr></a:tbl></a:graphicData></a:graphic></p:graphicFrame>
</p:spTree></p:cSld></p:sld>"#,
        ),
    ])
}

/// Excel 工作簿：共享字符串、内联字符串、数字和公式
pub fn xlsx_fixture() -> Vec<u8> {
    let rels = package_rels("xl/workbook.xml");
    build_zip(&[
        ("_rels/.rels", &rels),
        (
            "xl/workbook.xml",
            r#"<workbook xmlns="urn:main" xmlns:r="urn:r"><sheets><sheet name="Fragen" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#,
        ),
        (
            "xl/sharedStrings.xml",
            r#"<sst xmlns="urn:main"><si><t>Hello</t></si><si><t>Thank you</t></si></sst>"#,
        ),
        (
            "xl/worksheets/sheet1.xml",
            r#"<worksheet xmlns="urn:main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>42</v></c><c r="C1" t="s"><v>1</v></c></row>
<row r="2"><c r="A2" t="str"><f>A1</f><v>Hello</v></c><c r="B2" t="inlineStr"><is><t>Goodbye</t></is></c></row>
</sheetData></worksheet>"#,
        ),
    ])
}

/// 默认词典
pub const GERMAN: &[(&str, &str)] = &[
    ("Hello", "Hallo"),
    ("Thank you", "Danke"),
    ("Goodbye", "Auf Wiedersehen"),
];
