use html5ever::QualName;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub mod dom_tree {
    use super::*;

    pub type NodeRef = Rc<RefCell<Node>>;

    #[derive(Debug, Clone)]
    pub enum Node {
        DocumentRoot(DocumentRootNode),
        Element(ElementNode),
        Text(String),
        Comment(String),
    }

    #[derive(Debug, Clone, Default)]
    pub struct DocumentRootNode {
        pub children: Vec<NodeRef>,
    }

    #[derive(Debug, Clone)]
    pub struct ElementNode {
        pub tag: String,
        pub qual_name: QualName,
        pub attributes: Vec<(String, String)>,
        pub children: Vec<NodeRef>,
        pub parent: Option<Weak<RefCell<Node>>>,
    }

    #[derive(Debug)]
    pub struct Document {
        pub root: NodeRef,
        pub doctype: RefCell<Option<Doctype>>,
    }

    #[derive(Debug)]
    pub struct Doctype {
        pub name: String,
        pub public_id: String,
        pub system_id: String,
    }

    impl ElementNode {
        pub fn new(qual_name: QualName, attributes: Vec<(String, String)>) -> Self {
            ElementNode {
                tag: qual_name.local.to_ascii_lowercase().to_string(),
                qual_name,
                attributes,
                children: Vec::new(),
                parent: None,
            }
        }

        /// Attribute lookup; names are matched case-insensitively.
        pub fn attr(&self, name: &str) -> Option<&str> {
            self.attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        pub fn id(&self) -> Option<&str> {
            self.attr("id").filter(|id| !id.is_empty())
        }

        pub fn class_list(&self) -> Vec<&str> {
            self.attr("class")
                .map(|c| c.split_whitespace().collect())
                .unwrap_or_default()
        }

        pub fn has_class(&self, class: &str) -> bool {
            self.class_list().contains(&class)
        }
    }

    impl Node {
        pub fn as_element(&self) -> Option<&ElementNode> {
            match self {
                Node::Element(element) => Some(element),
                _ => None,
            }
        }

        pub fn children(&self) -> &[NodeRef] {
            match self {
                Node::DocumentRoot(root) => &root.children,
                Node::Element(element) => &element.children,
                Node::Text(_) | Node::Comment(_) => &[],
            }
        }

        pub fn children_mut(&mut self) -> Option<&mut Vec<NodeRef>> {
            match self {
                Node::DocumentRoot(root) => Some(&mut root.children),
                Node::Element(element) => Some(&mut element.children),
                Node::Text(_) | Node::Comment(_) => None,
            }
        }

        /// Concatenated text of all descendant text nodes.
        pub fn text_content(&self) -> String {
            match self {
                Node::Text(text) => text.clone(),
                Node::Comment(_) => String::new(),
                _ => self
                    .children()
                    .iter()
                    .map(|child| child.borrow().text_content())
                    .collect(),
            }
        }
    }

    pub fn is_element(node: &NodeRef) -> bool {
        matches!(*node.borrow(), Node::Element(_))
    }

    /// Element children only, in document order.
    pub fn element_children(node: &NodeRef) -> Vec<NodeRef> {
        node.borrow()
            .children()
            .iter()
            .filter(|child| is_element(child))
            .cloned()
            .collect()
    }

    pub fn parent(node: &NodeRef) -> Option<NodeRef> {
        match &*node.borrow() {
            Node::Element(element) => element.parent.as_ref().and_then(Weak::upgrade),
            _ => None,
        }
    }

    /// The parent, if it is an element.
    pub fn parent_element(node: &NodeRef) -> Option<NodeRef> {
        parent(node).filter(is_element)
    }

    /// Preceding element siblings, nearest first.
    pub fn previous_element_siblings(node: &NodeRef) -> Vec<NodeRef> {
        let Some(parent) = parent(node) else {
            return Vec::new();
        };
        let siblings = element_children(&parent);
        let Some(position) = siblings.iter().position(|s| Rc::ptr_eq(s, node)) else {
            return Vec::new();
        };
        siblings[..position].iter().rev().cloned().collect()
    }

    /// Depth-first, document-order list of every element under `node`.
    pub fn descendant_elements(node: &NodeRef) -> Vec<NodeRef> {
        let mut out = Vec::new();
        for child in element_children(node) {
            out.push(child.clone());
            out.extend(descendant_elements(&child));
        }
        out
    }

    impl Document {
        /// The `<html>` element.
        pub fn document_element(&self) -> Option<NodeRef> {
            element_children(&self.root).into_iter().next()
        }
    }

    pub fn new_document() -> Document {
        Document {
            root: Rc::new(RefCell::new(Node::DocumentRoot(DocumentRootNode::default()))),
            doctype: RefCell::new(None),
        }
    }
}
