//! Shared test scaffolding: a minimal markup parser implementing
//! `SourceTreeProvider`, plus lookup helpers over the output tree.

#![allow(dead_code)]

use serde_json::Value;

use weft_engine::output::{walk_elements, NodeId, OutputElement};
use weft_engine::{Engine, EngineConfig, HostId, SourceAttr, SourceElement, SourceNode, SourceTreeProvider};

pub struct MarkupProvider;

impl SourceTreeProvider for MarkupProvider {
    fn parse(&self, text: &str) -> Vec<SourceNode> {
        Parser::new(text).parse_nodes(None)
    }
}

pub fn engine() -> Engine {
    Engine::new(Box::new(MarkupProvider))
}

pub fn engine_with(config: EngineConfig) -> Engine {
    Engine::with_config(Box::new(MarkupProvider), config)
}

pub fn render(template: &str, data: Value) -> (Engine, HostId) {
    let engine = engine();
    let host = engine.mount(template, data);
    (engine, host)
}

/// Ids of every output element with the given tag, document order.
pub fn ids_by_tag(engine: &Engine, host: HostId, tag: &str) -> Vec<NodeId> {
    let host = engine.host(host).expect("live host");
    let output = host.output.borrow();
    let mut ids = Vec::new();
    walk_elements(&output, &mut |el: &OutputElement| {
        if el.tag == tag {
            ids.push(el.id);
        }
    });
    ids
}

pub fn first_by_tag(engine: &Engine, host: HostId, tag: &str) -> NodeId {
    ids_by_tag(engine, host, tag)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no <{tag}> in output"))
}

struct Parser {
    input: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        Parser {
            input: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        let pattern: Vec<char> = s.chars().collect();
        self.input[self.pos..].starts_with(&pattern)
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.chars().count();
            true
        } else {
            false
        }
    }

    fn take_until(&mut self, stop: &str) -> String {
        let mut out = String::new();
        while self.pos < self.input.len() && !self.starts_with(stop) {
            out.push(self.input[self.pos]);
            self.pos += 1;
        }
        out
    }

    fn parse_nodes(&mut self, closing: Option<&str>) -> Vec<SourceNode> {
        let mut nodes = Vec::new();
        loop {
            if self.pos >= self.input.len() {
                break;
            }
            if self.starts_with("</") {
                if let Some(tag) = closing {
                    let close = format!("</{tag}>");
                    if self.eat(&close) {
                        break;
                    }
                }
                // Stray close tag: swallow it so parsing can continue.
                self.take_until(">");
                self.eat(">");
                continue;
            }
            if self.starts_with("<!--") {
                self.eat("<!--");
                let body = self.take_until("-->");
                self.eat("-->");
                nodes.push(SourceNode::Comment(body));
                continue;
            }
            if self.peek() == Some('<') {
                nodes.push(self.parse_element());
                continue;
            }
            let text = self.take_until("<");
            nodes.push(SourceNode::Text(text));
        }
        nodes
    }

    fn parse_element(&mut self) -> SourceNode {
        self.eat("<");
        let mut tag = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                tag.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        let mut element = SourceElement::new(tag.clone());
        loop {
            while self.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
                self.pos += 1;
            }
            match self.peek() {
                None => return SourceNode::Element(element),
                Some('>') => {
                    self.pos += 1;
                    element.children = self.parse_nodes(Some(&tag));
                    return SourceNode::Element(element);
                }
                Some('/') => {
                    self.eat("/>");
                    return SourceNode::Element(element);
                }
                _ => {
                    let attr = self.parse_attr();
                    element.attrs.push(attr);
                }
            }
        }
    }

    fn parse_attr(&mut self) -> SourceAttr {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '=' || c == '>' || c == '/' {
                break;
            }
            name.push(c);
            self.pos += 1;
        }
        let mut value = String::new();
        if self.peek() == Some('=') {
            self.pos += 1;
            match self.peek() {
                Some(q @ ('"' | '\'')) => {
                    self.pos += 1;
                    while let Some(c) = self.peek() {
                        if c == q {
                            self.pos += 1;
                            break;
                        }
                        value.push(c);
                        self.pos += 1;
                    }
                }
                _ => {
                    while let Some(c) = self.peek() {
                        if c.is_whitespace() || c == '>' || c == '/' {
                            break;
                        }
                        value.push(c);
                        self.pos += 1;
                    }
                }
            }
        }
        SourceAttr { name, value }
    }
}
