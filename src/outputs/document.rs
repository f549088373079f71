//! Editable HTML documents for stamping report templates.
//!
//! A [`Document`] is a [`scraper::Html`] whose `ego_tree` is edited in
//! place. Nodes are addressed by [`NodeId`]. [`Document::deep_copy`] copies a
//! subtree into fresh nodes, so editing a stamped row never touches the
//! prototype or a sibling row. Detached nodes stay in the arena but are
//! unreachable from the root and never serialized.
//!
//! Serialization goes through html5ever with scripting enabled, matching how
//! the template was parsed, so `<noscript>` content round-trips unescaped.

use std::io;

use ego_tree::NodeId;
use ego_tree::iter::Edge;
use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope, serialize};
use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, QualName, ns};
use scraper::node::{Doctype, Element, Text};
use scraper::{Html, Node};

/// A parsed HTML document that can be edited and serialized.
#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse a full document. html5ever never fails; malformed markup is repaired
    /// and `<html>`, `<head>` and `<body>` are always present.
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// The attached element whose `id` attribute equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.html
            .tree
            .root()
            .descendants()
            .find(|node| {
                node.value()
                    .as_element()
                    .is_some_and(|el| attr_of(el, "id") == Some(id))
            })
            .map(|node| node.id())
    }

    /// The first attached element named `tag`, in document order.
    pub fn first_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.html
            .tree
            .root()
            .descendants()
            .find(|node| is_tag(node.value(), tag))
            .map(|node| node.id())
    }

    pub fn body(&self) -> Option<NodeId> {
        self.first_by_tag("body")
    }

    /// Elements named `tag` below `node` (not `node` itself), in document order.
    pub fn descendants_by_tag(&self, node: NodeId, tag: &str) -> Vec<NodeId> {
        match self.html.tree.get(node) {
            Some(node) => node
                .descendants()
                .skip(1)
                .filter(|d| is_tag(d.value(), tag))
                .map(|d| d.id())
                .collect(),
            None => Vec::new(),
        }
    }

    /// The first element named `tag` below `node`.
    pub fn first_below(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        self.html
            .tree
            .get(node)?
            .descendants()
            .skip(1)
            .find(|d| is_tag(d.value(), tag))
            .map(|d| d.id())
    }

    /// The closest element named `tag` that contains `node`, or `node` itself.
    pub fn closest(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let node = self.html.tree.get(node)?;
        if is_tag(node.value(), tag) {
            return Some(node.id());
        }
        node.ancestors()
            .find(|a| is_tag(a.value(), tag))
            .map(|a| a.id())
    }

    pub fn is_tag(&self, node: NodeId, tag: &str) -> bool {
        self.html
            .tree
            .get(node)
            .is_some_and(|node| is_tag(node.value(), tag))
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        let el = self.html.tree.get(node)?.value().as_element()?;
        attr_of(el, name)
    }

    /// Attributes are kept sorted by name, as scraper builds them.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.with_element(node, |el| {
            let key = attr_name(name);
            let value = StrTendril::from_slice(value);
            match el.attrs.binary_search_by(|(k, _)| k.cmp(&key)) {
                Ok(pos) => el.attrs[pos].1 = value,
                Err(pos) => el.attrs.insert(pos, (key, value)),
            }
        });
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        self.with_element(node, |el| el.attrs.retain(|(k, _)| &*k.local != name));
    }

    /// Set one CSS property in the `style` attribute, keeping the others.
    pub fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        let mut decls: Vec<String> = self
            .attr(node, "style")
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .filter(|d| {
                d.split(':')
                    .next()
                    .is_none_or(|p| !p.trim().eq_ignore_ascii_case(property))
            })
            .map(str::to_string)
            .collect();
        decls.push(format!("{property}: {value}"));
        self.set_attr(node, "style", &decls.join("; "));
    }

    /// Append a new `<name>` element with `attrs` under `parent`.
    pub fn append_element(&mut self, parent: NodeId, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(k, v)| Attribute {
                name: attr_name(k),
                value: StrTendril::from_slice(v),
            })
            .collect();
        let element = Element::new(QualName::new(None, ns!(html), LocalName::from(name)), attrs);
        let id = self.html.tree.orphan(Node::Element(element)).id();
        self.append_child(parent, id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let id = self
            .html
            .tree
            .orphan(Node::Text(Text {
                text: StrTendril::from_slice(text),
            }))
            .id();
        self.append_child(parent, id);
    }

    /// Replace every child of `node` with a single text node.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        let children: Vec<NodeId> = match self.html.tree.get(node) {
            Some(node) => node.children().map(|c| c.id()).collect(),
            None => return,
        };
        for child in children {
            self.detach(child);
        }
        self.append_text(node, text);
    }

    /// Move `child` (usually an orphan) to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(mut parent) = self.html.tree.get_mut(parent) {
            parent.append_id(child);
        }
    }

    /// Unlink `node` from its parent. It keeps its subtree.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(mut node) = self.html.tree.get_mut(node) {
            node.detach();
        }
    }

    /// Copy the subtree at `node` into new, unattached nodes and return the copy's root.
    pub fn deep_copy(&mut self, node: NodeId) -> Option<NodeId> {
        let (value, children) = {
            let source = self.html.tree.get(node)?;
            let children: Vec<NodeId> = source.children().map(|c| c.id()).collect();
            (source.value().clone(), children)
        };
        let copy = self.html.tree.orphan(value).id();
        for child in children {
            if let Some(child_copy) = self.deep_copy(child) {
                self.append_child(copy, child_copy);
            }
        }
        Some(copy)
    }

    /// Serialize everything reachable from the root.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let opts = SerializeOpts {
            scripting_enabled: true,
            traversal_scope: TraversalScope::IncludeNode,
            create_missing_parent: false,
        };
        serialize(&mut buf, self, opts)?;
        Ok(buf)
    }

    fn with_element<F>(&mut self, node: NodeId, edit: F)
    where
        F: FnOnce(&mut Element),
    {
        if let Some(mut node) = self.html.tree.get_mut(node) {
            if let Node::Element(el) = node.value() {
                edit(el);
            }
        }
    }

    /// Concatenated text below `node`.
    #[cfg(test)]
    pub fn text(&self, node: NodeId) -> String {
        match self.html.tree.get(node) {
            Some(node) => node
                .descendants()
                .filter_map(|d| d.value().as_text().map(|t| &**t))
                .collect(),
            None => String::new(),
        }
    }

    /// Attached elements named `tag`, in document order.
    #[cfg(test)]
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants_by_tag(self.html.tree.root().id(), tag)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: &mut S, _scope: TraversalScope) -> io::Result<()> {
        for edge in self.html.tree.root().traverse() {
            match edge {
                Edge::Open(node) => match node.value() {
                    Node::Doctype(doctype) => serializer.write_doctype(&doctype_body(doctype))?,
                    Node::Comment(comment) => serializer.write_comment(comment)?,
                    Node::Text(text) => serializer.write_text(text)?,
                    Node::Element(el) => serializer
                        .start_elem(el.name.clone(), el.attrs.iter().map(|(k, v)| (k, &v[..])))?,
                    _ => {}
                },
                Edge::Close(node) => {
                    if let Some(el) = node.value().as_element() {
                        serializer.end_elem(el.name.clone())?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Everything between `<!DOCTYPE ` and `>`, legacy identifiers included.
fn doctype_body(doctype: &Doctype) -> String {
    let mut out = doctype.name().to_string();
    match (doctype.public_id(), doctype.system_id()) {
        ("", "") => {}
        ("", system) => out.push_str(&format!(" SYSTEM \"{system}\"")),
        (public, "") => out.push_str(&format!(" PUBLIC \"{public}\"")),
        (public, system) => out.push_str(&format!(" PUBLIC \"{public}\" \"{system}\"")),
    }
    out
}

fn attr_name(name: &str) -> QualName {
    QualName::new(None, ns!(), LocalName::from(name))
}

fn attr_of<'a>(el: &'a Element, name: &str) -> Option<&'a str> {
    el.attrs
        .iter()
        .find(|(k, _)| &*k.local == name)
        .map(|(_, v)| &v[..])
}

fn is_tag(node: &Node, tag: &str) -> bool {
    node.as_element().is_some_and(|el| el.name() == tag)
}
