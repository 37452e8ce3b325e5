//! Scope Module for the SVGO loader
//!
//! Collects every lexically declared name in a file's script regions together
//! with the byte range in which the name is visible. The rewrite engine asks
//! the table whether a virtual icon tag is shadowed by a user declaration at
//! the tag's position.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, BindingIdentifier, BlockStatement, CatchClause, Class, ClassType,
    ForInStatement, ForOfStatement, ForStatement, Function, FunctionType, Program,
    VariableDeclaration, VariableDeclarationKind,
};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::scope::ScopeFlags;

use crate::parse::ScriptRegion;

/// One declared name and the byte range `[visible_from, visible_to)` it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRecord {
    pub name: String,
    pub visible_from: usize,
    pub visible_to: usize,
}

/// Every declaration seen during analysis. Records of exited scopes are kept,
/// so a lookup at any earlier offset stays answerable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeTable {
    records: Vec<ScopeRecord>,
}

impl ScopeTable {
    pub fn records(&self) -> &[ScopeRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_declared_at(&self, name: &str, offset: usize) -> bool {
        self.records
            .iter()
            .any(|r| r.name == name && r.visible_from <= offset && offset < r.visible_to)
    }

    fn declare(&mut self, name: &str, (visible_from, visible_to): (usize, usize)) {
        let exists = self.records.iter().any(|r| {
            r.name == name && r.visible_from == visible_from && r.visible_to == visible_to
        });
        if !exists {
            self.records.push(ScopeRecord {
                name: name.to_string(),
                visible_from,
                visible_to,
            });
        }
    }
}

/// Analysis result. A script that failed to parse still yields whatever
/// declarations the parser recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeOutcome {
    Complete(ScopeTable),
    Partial { table: ScopeTable, reason: String },
}

impl ScopeOutcome {
    pub fn table(&self) -> &ScopeTable {
        match self {
            ScopeOutcome::Complete(table) => table,
            ScopeOutcome::Partial { table, .. } => table,
        }
    }

    pub fn into_table(self) -> ScopeTable {
        match self {
            ScopeOutcome::Complete(table) => table,
            ScopeOutcome::Partial { table, .. } => table,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ScopeOutcome::Complete(_))
    }
}

/// Analyzes a single script whose text starts at offset 0.
pub fn analyze(script: &str) -> ScopeOutcome {
    analyze_regions(&[ScriptRegion {
        offset: 0,
        content: script,
        attributes: Default::default(),
    }])
}

/// Analyzes every script region of one file into a single table.
pub fn analyze_regions(regions: &[ScriptRegion<'_>]) -> ScopeOutcome {
    let mut table = ScopeTable::default();
    let mut reasons = Vec::new();

    for region in regions {
        if let Err(reason) = analyze_region(region, &mut table) {
            reasons.push(reason);
        }
    }

    if reasons.is_empty() {
        ScopeOutcome::Complete(table)
    } else {
        ScopeOutcome::Partial {
            table,
            reason: reasons.join("; "),
        }
    }
}

pub fn is_declared_at(table: &ScopeTable, name: &str, offset: usize) -> bool {
    table.is_declared_at(name, offset)
}

fn analyze_region(region: &ScriptRegion<'_>, table: &mut ScopeTable) -> Result<(), String> {
    // unlabeled scripts parse as TypeScript, which accepts plain JS too
    let lang = region.lang().unwrap_or("ts");
    let source_type = SourceType::default()
        .with_module(true)
        .with_typescript(!matches!(lang, "js" | "jsx"))
        .with_jsx(matches!(lang, "tsx" | "jsx"));

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, region.content, source_type).parse();

    let mut collector = ScopeCollector {
        table,
        base: region.offset,
        stack: Vec::new(),
        hoist: false,
    };
    collector.visit_program(&ret.program);

    if ret.panicked {
        return Err("script parser gave up".to_string());
    }
    match ret.errors.first() {
        Some(error) => Err(error.to_string()),
        None => Ok(()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct Frame {
    start: usize,
    end: usize,
    /// `var` declarations land in the nearest function-like frame.
    function_like: bool,
}

struct ScopeCollector<'t> {
    table: &'t mut ScopeTable,
    base: usize,
    stack: Vec<Frame>,
    hoist: bool,
}

impl ScopeCollector<'_> {
    fn enter(&mut self, span: oxc_span::Span, function_like: bool) {
        self.stack.push(Frame {
            start: self.base + span.start as usize,
            end: self.base + span.end as usize,
            function_like,
        });
    }

    fn exit(&mut self) {
        self.stack.pop();
    }

    fn range(frame: &Frame, depth: usize) -> (usize, usize) {
        // module level is visible to the whole file, template included
        if depth == 0 {
            (0, usize::MAX)
        } else {
            (frame.start, frame.end)
        }
    }

    fn target(&self) -> Option<(usize, usize)> {
        let depth = if self.hoist {
            self.stack.iter().rposition(|f| f.function_like)?
        } else {
            self.stack.len().checked_sub(1)?
        };
        Some(Self::range(&self.stack[depth], depth))
    }

    fn declare(&mut self, name: &str) {
        if let Some(range) = self.target() {
            self.table.declare(name, range);
        }
    }
}

impl<'a> Visit<'a> for ScopeCollector<'_> {
    fn visit_program(&mut self, program: &Program<'a>) {
        self.enter(program.span, true);
        oxc_ast_visit::walk::walk_program(self, program);
        self.exit();
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.declare(ident.name.as_str());
    }

    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        if decl.kind != VariableDeclarationKind::Var {
            oxc_ast_visit::walk::walk_variable_declaration(self, decl);
            return;
        }
        for declarator in &decl.declarations {
            self.hoist = true;
            self.visit_binding_pattern(&declarator.id);
            self.hoist = false;
            if let Some(init) = &declarator.init {
                self.visit_expression(init);
            }
        }
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        // a declaration's name belongs to the enclosing scope
        if func.r#type == FunctionType::FunctionDeclaration {
            if let Some(id) = &func.id {
                self.declare(id.name.as_str());
            }
        }
        self.enter(func.span, true);
        oxc_ast_visit::walk::walk_function(self, func, flags);
        self.exit();
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        self.enter(func.span, true);
        oxc_ast_visit::walk::walk_arrow_function_expression(self, func);
        self.exit();
    }

    fn visit_class(&mut self, class: &Class<'a>) {
        if class.r#type == ClassType::ClassDeclaration {
            if let Some(id) = &class.id {
                self.declare(id.name.as_str());
            }
        }
        self.enter(class.span, false);
        oxc_ast_visit::walk::walk_class(self, class);
        self.exit();
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        self.enter(block.span, false);
        oxc_ast_visit::walk::walk_block_statement(self, block);
        self.exit();
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        self.enter(stmt.span, false);
        oxc_ast_visit::walk::walk_for_statement(self, stmt);
        self.exit();
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        self.enter(stmt.span, false);
        oxc_ast_visit::walk::walk_for_in_statement(self, stmt);
        self.exit();
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        self.enter(stmt.span, false);
        oxc_ast_visit::walk::walk_for_of_statement(self, stmt);
        self.exit();
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        self.enter(clause.span, false);
        oxc_ast_visit::walk::walk_catch_clause(self, clause);
        self.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::script_regions;

    #[test]
    fn test_module_level_bindings_cover_whole_file() {
        let outcome = analyze("import SvgoIcon from './MyIcon.vue'\nconst size = 4");
        assert!(outcome.is_complete());
        let table = outcome.table();
        assert!(table.is_declared_at("SvgoIcon", 0));
        assert!(table.is_declared_at("SvgoIcon", 10_000));
        assert!(table.is_declared_at("size", 10_000));
        assert!(!table.is_declared_at("other", 5));
    }

    #[test]
    fn test_nested_frames_only_cover_their_span() {
        let src = "function outer(a) {\n  let inner = 1\n}\nconst after = 2";
        let table = analyze(src).into_table();
        let inside = src.find("inner").unwrap();
        let outside = src.find("after").unwrap();

        assert!(table.is_declared_at("inner", inside));
        assert!(!table.is_declared_at("inner", outside));
        assert!(table.is_declared_at("a", inside));
        assert!(!table.is_declared_at("a", outside));
        // function declarations belong to the enclosing scope
        assert!(table.is_declared_at("outer", outside));
    }

    #[test]
    fn test_var_hoists_out_of_blocks() {
        let src = "function f() {\n  if (x) { var hoisted = 1; let local = 2 }\n  return 0\n}";
        let table = analyze(src).into_table();
        let ret = src.find("return").unwrap();
        assert!(table.is_declared_at("hoisted", ret));
        assert!(!table.is_declared_at("local", ret));
    }

    #[test]
    fn test_exited_frames_are_retained() {
        let src = "{ let first = 1 }\n{ let second = 2 }";
        let table = analyze(src).into_table();
        assert!(table.is_declared_at("first", src.find("first").unwrap()));
        assert!(table.is_declared_at("second", src.find("second").unwrap()));
        assert!(!table.is_declared_at("first", src.find("second").unwrap()));
    }

    #[test]
    fn test_catch_and_loop_bindings() {
        let src = "for (const item of list) { use(item) }\ntry {} catch (err) { log(err) }\nend()";
        let table = analyze(src).into_table();
        assert!(table.is_declared_at("item", src.find("use").unwrap()));
        assert!(table.is_declared_at("err", src.find("log").unwrap()));
        assert!(!table.is_declared_at("item", src.find("end").unwrap()));
        assert!(!table.is_declared_at("err", src.find("end").unwrap()));
    }

    #[test]
    fn test_regions_use_file_offsets() {
        let file = "<script setup>\nconst x = () => { const y = 1 }\n</script>\n<template></template>";
        let regions = script_regions(file);
        let table = analyze_regions(&regions).into_table();
        let y = file.find("y =").unwrap();
        assert!(table.is_declared_at("y", y));
        assert!(!table.is_declared_at("y", file.find("<template>").unwrap()));
        assert!(table.is_declared_at("x", file.len() - 1));
    }

    #[test]
    fn test_lang_attribute_selects_dialect() {
        let jsx = "<script setup lang=\"jsx\">\nconst SvgoIcon = 1\nconst view = <div>{SvgoIcon}</div>\n</script>";
        let outcome = analyze_regions(&script_regions(jsx));
        assert!(outcome.is_complete());
        assert!(outcome.table().is_declared_at("SvgoIcon", jsx.len() - 1));

        // type annotations are not JavaScript
        for lang in ["js", "jsx"] {
            let file = format!("<script lang=\"{}\">\nlet size: number = 1\n</script>", lang);
            let outcome = analyze_regions(&script_regions(&file));
            assert!(!outcome.is_complete(), "lang={} accepted TypeScript", lang);
        }

        let ts = "<script lang=\"ts\">\nlet size: number = 1\n</script>";
        assert!(analyze_regions(&script_regions(ts)).is_complete());
    }

    #[test]
    fn test_parse_failure_is_partial_not_fatal() {
        let outcome = analyze("const ok = 1\nconst = = broken");
        match &outcome {
            ScopeOutcome::Partial { reason, .. } => assert!(!reason.is_empty()),
            other => panic!("expected partial outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_typescript_declarations() {
        let table = analyze("interface Props { a: string }\ntype Size = number\nenum Kind { A }").into_table();
        assert!(table.is_declared_at("Props", 0));
        assert!(table.is_declared_at("Size", 0));
        assert!(table.is_declared_at("Kind", 0));
    }
}
