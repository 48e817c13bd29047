use std::cell::RefCell;
use std::rc::Rc;

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, SerializableHandle};
use quick_xml::escape::escape;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

pub(crate) fn new_element(name: &str, attrs: &[(&str, &str)]) -> Handle {
    Node::new(NodeData::Element {
        name: QualName::new(None, Namespace::from(XHTML_NS), LocalName::from(name)),
        attrs: RefCell::new(
            attrs
                .iter()
                .map(|&(key, value)| Attribute {
                    name: QualName::new(None, Namespace::from(""), LocalName::from(key)),
                    value: StrTendril::from(value),
                })
                .collect(),
        ),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

pub(crate) fn new_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    })
}

fn qualified(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local),
        None => name.local.to_string(),
    }
}

/// Attribute name as written to xml. Only the always-bound `xml` and `xmlns`
/// prefixes survive, other prefixes (`xlink:href`) would be undeclared.
fn xml_attr_name(name: &QualName) -> String {
    match name.prefix.as_deref() {
        Some(prefix @ ("xml" | "xmlns")) => format!("{}:{}", prefix, name.local),
        _ => name.local.to_string(),
    }
}

pub(crate) trait NodeExt {
    fn handle(&self) -> &Handle;

    fn local_name(&self) -> Option<String> {
        match &self.handle().data {
            NodeData::Element { name, .. } => Some(name.local.to_string()),
            _ => None,
        }
    }

    fn is_element(&self, tag: &str) -> bool {
        self.local_name().as_deref() == Some(tag)
    }

    fn attr(&self, key: &str) -> Option<String> {
        match &self.handle().data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|attr| &*attr.name.local == key)
                .map(|attr| attr.value.to_string()),
            _ => None,
        }
    }

    /// First attribute value whose qualified name satisfies `pred`.
    fn find_attr<F: Fn(&str) -> bool>(&self, pred: F) -> Option<String> {
        match &self.handle().data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|attr| pred(&qualified(&attr.name)))
                .map(|attr| attr.value.to_string()),
            _ => None,
        }
    }

    fn remove_attr(&self, key: &str) {
        if let NodeData::Element { attrs, .. } = &self.handle().data {
            attrs.borrow_mut().retain(|attr| &*attr.name.local != key);
        }
    }

    fn parent(&self) -> Option<Handle> {
        let node = self.handle();
        let weak = node.parent.take();
        let parent = weak.as_ref().and_then(|w| w.upgrade());
        node.parent.set(weak);
        parent
    }

    /// Element descendants in document order, `self` excluded.
    fn descendants(&self) -> Vec<Handle> {
        fn walk(node: &Handle, found: &mut Vec<Handle>) {
            for child in node.children.borrow().iter() {
                if let NodeData::Element { .. } = child.data {
                    found.push(child.clone());
                }
                walk(child, found);
            }
        }

        let mut found = Vec::new();
        walk(self.handle(), &mut found);
        found
    }

    fn elements_named(&self, tag: &str) -> Vec<Handle> {
        self.descendants()
            .into_iter()
            .filter(|node| node.is_element(tag))
            .collect()
    }

    fn detach(&self) {
        let node = self.handle();
        if let Some(parent) = self.parent() {
            parent
                .children
                .borrow_mut()
                .retain(|child| !Rc::ptr_eq(child, node));
        }
        node.parent.set(None);
    }

    fn clear_children(&self) {
        for child in self.handle().children.take() {
            child.parent.set(None);
        }
    }

    fn append(&self, child: Handle) {
        child.parent.set(Some(Rc::downgrade(self.handle())));
        self.handle().children.borrow_mut().push(child);
    }

    /// Inserts `node` right before `self` in its parent.
    fn insert_before(&self, node: Handle) {
        if let Some(parent) = self.parent() {
            let mut children = parent.children.borrow_mut();
            let position = children
                .iter()
                .position(|child| Rc::ptr_eq(child, self.handle()))
                .unwrap_or(children.len());
            node.parent.set(Some(Rc::downgrade(&parent)));
            children.insert(position, node);
        }
    }

    /// Applies `repl` to every attribute value named in `attrs` of `self` and
    /// every element below it.
    fn rewrite_attrs<F: Fn(&str, &str) -> Option<String>>(&self, repl: F) {
        let mut nodes = vec![self.handle().clone()];
        nodes.extend(self.descendants());
        for node in nodes {
            if let NodeData::Element { attrs, .. } = &node.data {
                for attr in attrs.borrow_mut().iter_mut() {
                    if let Some(new_value) = repl(&attr.name.local, &attr.value) {
                        attr.value = StrTendril::from(new_value);
                    }
                }
            }
        }
    }

    /// Html serialization of the node itself, as a browser would write it.
    fn to_html(&self) -> Option<String> {
        let mut buffer = Vec::new();
        let handle: SerializableHandle = self.handle().clone().into();
        serialize(
            &mut buffer,
            &handle,
            SerializeOpts {
                traversal_scope: TraversalScope::IncludeNode,
                ..Default::default()
            },
        )
        .ok()?;
        String::from_utf8(buffer).ok()
    }

    /// Xml-compatible serialization: childless elements self-close, text and
    /// attribute values are escaped, doctypes are dropped.
    fn to_xhtml(&self) -> String {
        fn render(node: &Handle, out: &mut String) {
            match &node.data {
                NodeData::Document => {
                    for child in node.children.borrow().iter() {
                        render(child, out);
                    }
                }
                NodeData::Element { name, attrs, .. } => {
                    out.push('<');
                    out.push_str(&name.local);
                    let mut written: Vec<String> = Vec::new();
                    for attr in attrs.borrow().iter() {
                        let key = xml_attr_name(&attr.name);
                        if written.contains(&key) {
                            continue;
                        }
                        out.push(' ');
                        out.push_str(&key);
                        written.push(key);
                        out.push_str("=\"");
                        out.push_str(&escape(&attr.value));
                        out.push('"');
                    }
                    let children = node.children.borrow();
                    if children.is_empty() {
                        out.push_str("/>");
                        return;
                    }
                    out.push('>');
                    for child in children.iter() {
                        render(child, out);
                    }
                    out.push_str("</");
                    out.push_str(&name.local);
                    out.push('>');
                }
                NodeData::Text { contents } => out.push_str(&escape(&contents.borrow())),
                NodeData::Comment { contents } => {
                    out.push_str("<!--");
                    out.push_str(contents);
                    out.push_str("-->");
                }
                NodeData::Doctype { .. } => {}
                NodeData::ProcessingInstruction { target, contents } => {
                    out.push_str("<?");
                    out.push_str(target);
                    out.push(' ');
                    out.push_str(contents);
                    out.push_str("?>");
                }
            }
        }

        let mut out = String::new();
        render(self.handle(), &mut out);
        out
    }
}

impl NodeExt for Handle {
    fn handle(&self) -> &Handle {
        self
    }
}
