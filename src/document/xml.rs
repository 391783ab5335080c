//! OOXML 部件的事件级表示
//!
//! 部件被解析为 quick-xml 事件列表和一棵扁平的元素树。写回只记录在覆盖表中，
//! 序列化时替换或删除对应元素，其余事件原样输出。

use std::collections::HashMap;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::translation::error::{TranslationError, TranslationResult};

/// 元素树中的节点
#[derive(Debug, Clone)]
struct Node {
    name: String,
    start: usize,
    end: usize,
    children: Vec<usize>,
}

/// 元素句柄
pub type ElementId = usize;

/// 单个元素的覆盖
#[derive(Debug, Clone)]
enum Override {
    Text {
        text: String,
        preserve_space: bool,
        /// 文本中的 `\n` 和 `\t` 写成同级的换行、制表符元素
        split_markers: bool,
    },
    Removed,
}

/// 段内换行和制表符元素（`w:br`、`w:cr`、`w:tab`）读作的字符
fn inline_marker(name: &str) -> Option<char> {
    match name.rsplit(':').next() {
        Some("br") | Some("cr") => Some('\n'),
        Some("tab") => Some('\t'),
        _ => None,
    }
}

/// 带命名空间前缀的元素名，例如 `w:t` 的前缀是 `w:`
fn sibling_name(name: &str, local: &str) -> String {
    match name.rsplit_once(':') {
        Some((prefix, _)) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

/// 解析后的 XML 部件
#[derive(Debug, Clone)]
pub struct XmlPart {
    events: Vec<Event<'static>>,
    nodes: Vec<Node>,
    roots: Vec<ElementId>,
    overrides: HashMap<ElementId, Override>,
}

fn qualified_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

impl XmlPart {
    /// 解析部件
    ///
    /// # 参数
    /// * `part_name` - 包内路径，只用于错误信息
    /// * `bytes` - 部件原始字节
    pub fn parse(part_name: &str, bytes: &[u8]) -> TranslationResult<Self> {
        let context = |e: quick_xml::Error| {
            TranslationError::from(e).with_context(format!("部件 {}", part_name))
        };

        let mut reader = Reader::from_reader(bytes);
        let mut events = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();
        let mut roots = Vec::new();
        let mut stack: Vec<ElementId> = Vec::new();

        loop {
            let event = reader.read_event().map_err(context)?;
            let index = events.len();
            match &event {
                Event::Eof => break,
                Event::Start(start) | Event::Empty(start) => {
                    let id = nodes.len();
                    let parent = stack.last().copied();
                    nodes.push(Node {
                        name: qualified_name(start),
                        start: index,
                        end: index,
                        children: Vec::new(),
                    });
                    match parent {
                        Some(parent) => nodes[parent].children.push(id),
                        None => roots.push(id),
                    }
                    if matches!(event, Event::Start(_)) {
                        stack.push(id);
                    }
                }
                Event::End(_) => {
                    let id = stack.pop().ok_or_else(|| {
                        TranslationError::DocumentFormatError(format!(
                            "部件 {} 中存在多余的结束标签",
                            part_name
                        ))
                    })?;
                    nodes[id].end = index;
                }
                _ => {}
            }
            events.push(event.into_owned());
        }

        if !stack.is_empty() {
            return Err(TranslationError::DocumentFormatError(format!(
                "部件 {} 中存在未闭合的元素",
                part_name
            )));
        }

        Ok(Self {
            events,
            nodes,
            roots,
            overrides: HashMap::new(),
        })
    }

    /// 第一个名为 `name` 的根元素
    pub fn root(&self, name: &str) -> Option<ElementId> {
        self.roots
            .iter()
            .copied()
            .find(|&id| self.nodes[id].name == name)
    }

    pub fn name(&self, id: ElementId) -> &str {
        &self.nodes[id].name
    }

    /// 全部直接子元素
    pub fn children(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        self.nodes[id].children.iter().copied()
    }

    /// 指定名称的直接子元素
    pub fn children_named<'a>(
        &'a self,
        id: ElementId,
        name: &'a str,
    ) -> impl Iterator<Item = ElementId> + 'a {
        self.children(id).filter(move |&child| self.nodes[child].name == name)
    }

    pub fn child_named(&self, id: ElementId, name: &str) -> Option<ElementId> {
        self.children_named(id, name).next()
    }

    /// 文档顺序中指定名称的后代元素（深度优先）
    pub fn descendants_named(&self, id: ElementId, name: &str) -> Vec<ElementId> {
        let mut found = Vec::new();
        let mut pending: Vec<ElementId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(current) = pending.pop() {
            if self.nodes[current].name == name {
                found.push(current);
            }
            pending.extend(self.nodes[current].children.iter().rev().copied());
        }
        found
    }

    /// 读取属性值
    pub fn attribute(&self, id: ElementId, key: &str) -> Option<String> {
        let start = match &self.events[self.nodes[id].start] {
            Event::Start(start) | Event::Empty(start) => start,
            _ => return None,
        };
        start
            .attributes()
            .with_checks(false)
            .flatten()
            .find(|attr| attr.key.as_ref() == key.as_bytes())
            .map(|attr| match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            })
    }

    /// 段内换行或制表符元素对应的字符
    pub fn marker(&self, id: ElementId) -> Option<char> {
        inline_marker(&self.nodes[id].name)
    }

    /// 元素当前的文本内容（含已记录的覆盖）
    ///
    /// 换行和制表符元素分别读作 `\n` 和 `\t`，已删除的元素读作空串。
    pub fn text(&self, id: ElementId) -> String {
        match self.overrides.get(&id) {
            Some(Override::Text { text, .. }) => return text.clone(),
            Some(Override::Removed) => return String::new(),
            None => {}
        }
        if let Some(marker) = self.marker(id) {
            return marker.to_string();
        }

        let node = &self.nodes[id];
        let mut text = String::new();
        for event in &self.events[node.start..=node.end] {
            match event {
                Event::Text(content) => match content.unescape() {
                    Ok(value) => text.push_str(&value),
                    Err(_) => text.push_str(&String::from_utf8_lossy(content)),
                },
                Event::CData(content) => text.push_str(&String::from_utf8_lossy(content)),
                _ => {}
            }
        }
        text
    }

    /// 多个元素文本的拼接
    pub fn joined_text(&self, ids: &[ElementId]) -> String {
        ids.iter().map(|&id| self.text(id)).collect()
    }

    /// 替换元素文本
    ///
    /// `preserve_space` 为真时补上 `xml:space="preserve"`。
    pub fn set_text(&mut self, id: ElementId, text: &str, preserve_space: bool) {
        self.overrides.insert(
            id,
            Override::Text {
                text: text.to_string(),
                preserve_space,
                split_markers: false,
            },
        );
    }

    /// 替换元素文本，`\n` 和 `\t` 写成同级的 `br`、`tab` 元素
    pub fn set_text_with_markers(&mut self, id: ElementId, text: &str, preserve_space: bool) {
        self.overrides.insert(
            id,
            Override::Text {
                text: text.to_string(),
                preserve_space,
                split_markers: true,
            },
        );
    }

    /// 序列化时删除元素
    pub fn remove(&mut self, id: ElementId) {
        self.overrides.insert(id, Override::Removed);
    }

    pub fn is_modified(&self) -> bool {
        !self.overrides.is_empty()
    }

    /// 序列化部件
    pub fn to_bytes(&self) -> TranslationResult<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        let starts: HashMap<usize, ElementId> = self
            .overrides
            .keys()
            .map(|&id| (self.nodes[id].start, id))
            .collect();

        let mut index = 0;
        while index < self.events.len() {
            let event = &self.events[index];
            let Some(&id) = starts.get(&index) else {
                writer.write_event(event)?;
                index += 1;
                continue;
            };

            let node = &self.nodes[id];
            let original = match event {
                Event::Start(start) | Event::Empty(start) => start,
                _ => {
                    writer.write_event(event)?;
                    index += 1;
                    continue;
                }
            };

            if let Override::Text {
                text,
                preserve_space,
                split_markers,
            } = &self.overrides[&id]
            {
                let mut start = BytesStart::new(node.name.clone());
                for attr in original.attributes().with_checks(false).flatten() {
                    if *preserve_space && attr.key.as_ref() == b"xml:space" {
                        continue;
                    }
                    start.push_attribute(attr);
                }
                if *preserve_space {
                    start.push_attribute(("xml:space", "preserve"));
                }

                if *split_markers {
                    write_with_markers(&mut writer, &node.name, &start, text)?;
                } else {
                    write_text_element(&mut writer, &node.name, &start, text)?;
                }
            }
            index = node.end + 1;
        }

        Ok(writer.into_inner())
    }
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    start: &BytesStart<'_>,
    text: &str,
) -> TranslationResult<()> {
    writer.write_event(Event::Start(start.borrow()))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// 按换行和制表符切分，片段之间插入 `br` 或 `tab` 空元素
fn write_with_markers(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    start: &BytesStart<'_>,
    text: &str,
) -> TranslationResult<()> {
    let mut piece_start = 0;
    for (offset, marker) in text.match_indices(['\n', '\t']) {
        write_text_element(writer, name, start, &text[piece_start..offset])?;
        let local = if marker == "\n" { "br" } else { "tab" };
        writer.write_event(Event::Empty(BytesStart::new(sibling_name(name, local))))?;
        piece_start = offset + marker.len();
    }
    write_text_element(writer, name, start, &text[piece_start..])
}
