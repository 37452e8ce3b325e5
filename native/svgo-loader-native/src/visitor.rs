use crate::parse::{CommentNode, Document, Element, MarkupNode, TextNode};

/// The MarkupVisitor trait is the single traversal mechanism for parsed templates.
///
/// Rules:
/// 1. Children are walked in source order.
/// 2. Implementers override `visit_*` methods to add behavior and call the
///    matching `walk_*` function to continue. Calling it first gives a
///    post-order visit (children before their parent).
/// 3. `retain` is asked after each node was visited; returning false drops the
///    node from its parent's child list.
pub trait MarkupVisitor {
    fn visit_document(&mut self, document: &mut Document) {
        walk_document(self, document);
    }

    fn visit_children(&mut self, children: &mut Vec<MarkupNode>) {
        walk_children(self, children);
    }

    fn visit_node(&mut self, node: &mut MarkupNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &mut Element) {
        walk_element(self, element);
    }

    fn visit_text(&mut self, _text: &mut TextNode) {
        // Leaf node, nothing to walk by default
    }

    fn visit_comment(&mut self, _comment: &mut CommentNode) {}

    fn retain(&mut self, _node: &MarkupNode) -> bool {
        true
    }
}

/// Walks a whole document with `visitor`.
pub fn walk<V: MarkupVisitor + ?Sized>(document: &mut Document, visitor: &mut V) {
    visitor.visit_document(document);
}

pub fn walk_document<V: MarkupVisitor + ?Sized>(visitor: &mut V, document: &mut Document) {
    visitor.visit_children(&mut document.children);
}

pub fn walk_children<V: MarkupVisitor + ?Sized>(visitor: &mut V, children: &mut Vec<MarkupNode>) {
    children.retain_mut(|node| {
        visitor.visit_node(node);
        visitor.retain(node)
    });
}

pub fn walk_node<V: MarkupVisitor + ?Sized>(visitor: &mut V, node: &mut MarkupNode) {
    match node {
        MarkupNode::Element(el) => visitor.visit_element(el),
        MarkupNode::Text(t) => visitor.visit_text(t),
        MarkupNode::Comment(c) => visitor.visit_comment(c),
    }
}

pub fn walk_element<V: MarkupVisitor + ?Sized>(visitor: &mut V, element: &mut Element) {
    visitor.visit_children(&mut element.children);
}
