//! Parses HTML into the `crate::dom::dom_tree` tree with html5ever.

use crate::dom::dom_tree::{self, Node, NodeRef};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{
    interface::{ElemName, ElementFlags, NodeOrText, QuirksMode, TreeSink},
    Attribute, LocalName, Namespace, QualName,
};
use log::debug;
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

/// Creates a DOM tree from the provided HTML content.
pub fn create_dom_tree(html_content: &str) -> dom_tree::Document {
    html5ever::parse_document(PageTreeSink::new(), Default::default()).one(html_content)
}

/// Builds a `dom_tree::Document` as html5ever reports nodes.
pub struct PageTreeSink {
    document: dom_tree::Document,
    quirks_mode: RefCell<QuirksMode>,
}

impl PageTreeSink {
    pub fn new() -> Self {
        Self {
            document: dom_tree::new_document(),
            quirks_mode: RefCell::new(QuirksMode::NoQuirks),
        }
    }
}

impl Default for PageTreeSink {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct PageElemName {
    ns: Namespace,
    local: LocalName,
}

impl ElemName for PageElemName {
    fn local_name(&self) -> &LocalName {
        &self.local
    }

    fn ns(&self) -> &Namespace {
        &self.ns
    }
}

fn set_parent(child: &NodeRef, parent: &NodeRef) {
    if let Node::Element(ref mut element) = *child.borrow_mut() {
        element.parent = Some(Rc::downgrade(parent));
    }
}

fn into_node(child: NodeOrText<NodeRef>) -> NodeRef {
    match child {
        NodeOrText::AppendNode(node) => node,
        NodeOrText::AppendText(text) => Rc::new(RefCell::new(Node::Text(text.to_string()))),
    }
}

impl TreeSink for PageTreeSink {
    type Handle = NodeRef;
    type Output = dom_tree::Document;
    type ElemName<'a>
        = PageElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self.document
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        debug!("html parse error: {msg}");
    }

    fn get_document(&self) -> Self::Handle {
        self.document.root.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        match &*target.borrow() {
            Node::Element(element) => PageElemName {
                ns: element.qual_name.ns.clone(),
                local: element.qual_name.local.clone(),
            },
            _ => PageElemName {
                ns: Namespace::from(""),
                local: LocalName::from(""),
            },
        }
    }

    fn create_element(&self, name: QualName, attrs: Vec<Attribute>, _flags: ElementFlags) -> Self::Handle {
        let attributes = attrs
            .into_iter()
            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
            .collect();
        Rc::new(RefCell::new(Node::Element(dom_tree::ElementNode::new(
            name, attributes,
        ))))
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        Rc::new(RefCell::new(Node::Comment(text.to_string())))
    }

    fn create_pi(&self, _target: StrTendril, data: StrTendril) -> Self::Handle {
        Rc::new(RefCell::new(Node::Comment(data.to_string())))
    }

    /// Appends a node, merging adjacent text into the previous text node.
    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        if let NodeOrText::AppendText(ref text) = child {
            let parent_node = parent.borrow();
            if let Some(last) = parent_node.children().last() {
                if let Node::Text(ref mut existing) = *last.borrow_mut() {
                    existing.push_str(text);
                    return;
                }
            }
        }
        let child = into_node(child);
        set_parent(&child, parent);
        if let Some(children) = parent.borrow_mut().children_mut() {
            children.push(child);
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if dom_tree::parent(element).is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        *self.document.doctype.borrow_mut() = Some(dom_tree::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        });
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        *self.quirks_mode.borrow_mut() = mode;
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let Some(parent) = dom_tree::parent(sibling) else {
            return;
        };
        let child = into_node(child);
        set_parent(&child, &parent);
        let mut parent_node = parent.borrow_mut();
        if let Some(children) = parent_node.children_mut() {
            let position = children
                .iter()
                .position(|c| Rc::ptr_eq(c, sibling))
                .unwrap_or(children.len());
            children.insert(position, child);
        }
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        if let Node::Element(ref mut element) = *target.borrow_mut() {
            for attr in attrs {
                let key = attr.name.local.to_string();
                if !element.attributes.iter().any(|(k, _)| *k == key) {
                    element.attributes.push((key, attr.value.to_string()));
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        let Some(parent) = dom_tree::parent(target) else {
            return;
        };
        if let Some(children) = parent.borrow_mut().children_mut() {
            children.retain(|c| !Rc::ptr_eq(c, target));
        }
        if let Node::Element(ref mut element) = *target.borrow_mut() {
            element.parent = None;
        }
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let moved = match node.borrow_mut().children_mut() {
            Some(children) => std::mem::take(children),
            None => return,
        };
        for child in &moved {
            set_parent(child, new_parent);
        }
        if let Some(children) = new_parent.borrow_mut().children_mut() {
            children.extend(moved);
        }
    }
}
