//! Import/export skeleton of a transformed script.
//!
//! The skeleton lists every module request plus the byte ranges the renderer
//! has to rewrite to turn ES module syntax into calls on the module runtime.
//! All offsets refer to the transformed code the skeleton was extracted from.
//!
//! References to imported bindings are rewritten to property reads on the
//! imported module's exports, so they stay live across circular imports.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, Declaration, ExportDefaultDeclarationKind, ExportNamedDeclaration,
    Expression, IdentifierReference, ImportDeclarationSpecifier, ImportExpression,
    ModuleDeclaration, ModuleExportName, ObjectProperty, Program, TaggedTemplateExpression,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::{ParseOptions, Parser};
use oxc_semantic::{Scoping, SemanticBuilder, SymbolId};
use oxc_span::{GetSpan, SourceType};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestKind {
    /// `import` / `export ... from`
    Static,
    /// `require("x")`
    Require,
    /// `import("x")`
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub specifier: String,
    pub kind: RequestKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportBinding {
    Default(String),
    Namespace(String),
    Named { imported: String, local: String },
}

/// What an exported name evaluates to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// A binding declared in this module
    Local(String),
    /// A name re-exported from another module (`*` for the namespace)
    Reexport { request: usize, imported: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub exported: String,
    pub target: ExportTarget,
}

/// Where a reference to an imported binding appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSite {
    Value,
    /// Callee of a call or tag of a tagged template; `this` must stay undefined
    Callee,
    /// `{ name }` shorthand property
    Shorthand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditKind {
    /// Drop the range
    Remove,
    /// Drop the range; the bindings are declared at the top of the module
    Import {
        request: usize,
        bindings: Vec<ImportBinding>,
    },
    /// Replace `export default ` with a variable declaration
    DefaultExpression,
    /// Insert `;` after an anonymous default declaration turned expression
    Terminate,
    /// Replace an `import("x")` expression
    DynamicImport { request: usize },
    /// Replace a `require("x")` call
    Require { request: usize },
    /// Replace a reference to a default or named import
    ImportReference {
        request: usize,
        imported: String,
        site: ReferenceSite,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: u32,
    pub end: u32,
    pub kind: EditKind,
}

/// Name the default export is bound to when it is an expression.
pub const DEFAULT_BINDING: &str = "__kiln_default__";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skeleton {
    pub requests: Vec<Request>,
    pub edits: Vec<Edit>,
    pub exports: Vec<Export>,
    /// Requests whose whole namespace is re-exported
    pub star_exports: Vec<usize>,
    /// True when the module uses `import`/`export`
    pub is_esm: bool,
}

impl Skeleton {
    fn request(&mut self, specifier: &str, kind: RequestKind) -> usize {
        if let Some(idx) = self
            .requests
            .iter()
            .position(|r| r.specifier == specifier && r.kind == kind)
        {
            return idx;
        }
        self.requests.push(Request {
            specifier: specifier.to_string(),
            kind,
        });
        self.requests.len() - 1
    }

    /// Requests of one kind, in first-use order.
    pub fn requests_of(&self, kind: RequestKind) -> impl Iterator<Item = (usize, &Request)> {
        self.requests
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.kind == kind)
    }
}

/// Parse transformed code and extract its skeleton.
///
/// `module` selects ES module parsing; scripts may still use `require`.
pub fn extract(code: &str, module: bool) -> Result<Skeleton, String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs().with_module(module);
    let ret = Parser::new(&allocator, code, source_type)
        .with_options(ParseOptions {
            allow_return_outside_function: !module,
            ..ParseOptions::default()
        })
        .parse();

    if let Some(err) = ret.errors.first() {
        return Err(err.message.to_string());
    }

    // resolves import references; runs before collection so binding
    // identifiers carry their symbol ids
    let scoping = SemanticBuilder::new().build(&ret.program).semantic.into_scoping();

    let mut skeleton = Skeleton::default();
    let imports = collect_module_declarations(&ret.program, &mut skeleton);

    let mut visitor = BodyVisitor {
        skeleton: &mut skeleton,
        scoping: &scoping,
        imports: &imports,
    };
    visitor.visit_program(&ret.program);

    skeleton.edits.sort_by_key(|edit| (edit.start, edit.end));
    Ok(skeleton)
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
        ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
        ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
    }
}

/// Request and export name behind each default or named import binding.
type ImportSymbols = FxHashMap<SymbolId, (usize, String)>;

fn collect_module_declarations(program: &Program, skeleton: &mut Skeleton) -> ImportSymbols {
    let mut imports = ImportSymbols::default();
    for stmt in &program.body {
        let Some(decl) = stmt.as_module_declaration() else {
            continue;
        };
        skeleton.is_esm = true;
        let span = decl.span();

        match decl {
            ModuleDeclaration::ImportDeclaration(import) => {
                let request = skeleton.request(import.source.value.as_str(), RequestKind::Static);
                let mut bindings = Vec::new();
                for spec in import.specifiers.iter().flatten() {
                    let (binding, local) = match spec {
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            (ImportBinding::Default(s.local.name.to_string()), &s.local)
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            bindings.push(ImportBinding::Namespace(s.local.name.to_string()));
                            continue;
                        }
                        ImportDeclarationSpecifier::ImportSpecifier(s) => (
                            ImportBinding::Named {
                                imported: export_name(&s.imported),
                                local: s.local.name.to_string(),
                            },
                            &s.local,
                        ),
                    };
                    if let Some(symbol) = local.symbol_id.get() {
                        let imported = match &binding {
                            ImportBinding::Named { imported, .. } => imported.clone(),
                            _ => "default".to_string(),
                        };
                        imports.insert(symbol, (request, imported));
                    }
                    bindings.push(binding);
                }
                skeleton.edits.push(Edit {
                    start: span.start,
                    end: span.end,
                    kind: EditKind::Import { request, bindings },
                });
            }
            ModuleDeclaration::ExportNamedDeclaration(named) => {
                if let Some(declaration) = &named.declaration {
                    let mut names = Vec::new();
                    match declaration {
                        Declaration::VariableDeclaration(var) => {
                            for d in &var.declarations {
                                names.extend(
                                    d.id.get_binding_identifiers()
                                        .into_iter()
                                        .map(|ident| ident.name.to_string()),
                                );
                            }
                        }
                        Declaration::FunctionDeclaration(func) => {
                            names.extend(func.id.as_ref().map(|id| id.name.to_string()));
                        }
                        Declaration::ClassDeclaration(class) => {
                            names.extend(class.id.as_ref().map(|id| id.name.to_string()));
                        }
                        _ => {}
                    }
                    skeleton.exports.extend(names.into_iter().map(|name| Export {
                        exported: name.clone(),
                        target: ExportTarget::Local(name),
                    }));
                    skeleton.edits.push(Edit {
                        start: span.start,
                        end: declaration.span().start,
                        kind: EditKind::Remove,
                    });
                    continue;
                }

                let request = named
                    .source
                    .as_ref()
                    .map(|src| skeleton.request(src.value.as_str(), RequestKind::Static));
                for spec in &named.specifiers {
                    let local = export_name(&spec.local);
                    let target = match request {
                        Some(request) => ExportTarget::Reexport {
                            request,
                            imported: local,
                        },
                        None => ExportTarget::Local(local),
                    };
                    skeleton.exports.push(Export {
                        exported: export_name(&spec.exported),
                        target,
                    });
                }
                skeleton.edits.push(Edit {
                    start: span.start,
                    end: span.end,
                    kind: EditKind::Remove,
                });
            }
            ModuleDeclaration::ExportDefaultDeclaration(default) => {
                let inner = default.declaration.span();
                let named = match &default.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        Some(func.id.as_ref().map(|id| id.name.to_string()))
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        Some(class.id.as_ref().map(|id| id.name.to_string()))
                    }
                    _ => None,
                };
                let local = match named {
                    Some(Some(name)) => {
                        skeleton.edits.push(Edit {
                            start: span.start,
                            end: inner.start,
                            kind: EditKind::Remove,
                        });
                        name
                    }
                    Some(None) => {
                        skeleton.edits.push(Edit {
                            start: span.start,
                            end: inner.start,
                            kind: EditKind::DefaultExpression,
                        });
                        skeleton.edits.push(Edit {
                            start: inner.end,
                            end: inner.end,
                            kind: EditKind::Terminate,
                        });
                        DEFAULT_BINDING.to_string()
                    }
                    None => {
                        skeleton.edits.push(Edit {
                            start: span.start,
                            end: inner.start,
                            kind: EditKind::DefaultExpression,
                        });
                        DEFAULT_BINDING.to_string()
                    }
                };
                skeleton.exports.push(Export {
                    exported: "default".to_string(),
                    target: ExportTarget::Local(local),
                });
            }
            ModuleDeclaration::ExportAllDeclaration(all) => {
                let request = skeleton.request(all.source.value.as_str(), RequestKind::Static);
                match &all.exported {
                    Some(name) => skeleton.exports.push(Export {
                        exported: export_name(name),
                        target: ExportTarget::Reexport {
                            request,
                            imported: "*".to_string(),
                        },
                    }),
                    None => skeleton.star_exports.push(request),
                }
                skeleton.edits.push(Edit {
                    start: span.start,
                    end: span.end,
                    kind: EditKind::Remove,
                });
            }
            // TypeScript-only forms are gone after transformation
            _ => {}
        }
    }
    imports
}

/// Finds `import("x")`, `require("x")` and references to imported bindings
/// anywhere in the program.
struct BodyVisitor<'s> {
    skeleton: &'s mut Skeleton,
    scoping: &'s Scoping,
    imports: &'s ImportSymbols,
}

impl BodyVisitor<'_> {
    fn imported(&self, ident: &IdentifierReference) -> Option<&(usize, String)> {
        let reference = ident.reference_id.get()?;
        let symbol = self.scoping.get_reference(reference).symbol_id()?;
        self.imports.get(&symbol)
    }

    /// Records a rewrite when `expr` names an imported binding.
    fn rewrite_reference(&mut self, expr: &Expression, site: ReferenceSite) -> bool {
        let Expression::Identifier(ident) = expr else {
            return false;
        };
        self.push_reference(ident, site)
    }

    fn push_reference(&mut self, ident: &IdentifierReference, site: ReferenceSite) -> bool {
        let Some((request, imported)) = self.imported(ident).cloned() else {
            return false;
        };
        self.skeleton.edits.push(Edit {
            start: ident.span.start,
            end: ident.span.end,
            kind: EditKind::ImportReference {
                request,
                imported,
                site,
            },
        });
        true
    }
}

fn string_literal(expr: &Expression) -> Option<String> {
    match expr {
        Expression::StringLiteral(lit) => Some(lit.value.to_string()),
        Expression::TemplateLiteral(tpl) if tpl.expressions.is_empty() => tpl
            .quasis
            .first()
            .and_then(|q| q.value.cooked.as_ref())
            .map(|c| c.to_string()),
        _ => None,
    }
}

impl<'a> Visit<'a> for BodyVisitor<'_> {
    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        self.push_reference(it, ReferenceSite::Value);
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        // `export { x }` lists are removed whole; their getters are built
        // from the export table
        if let Some(declaration) = &it.declaration {
            self.visit_declaration(declaration);
        }
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand && self.rewrite_reference(&it.value, ReferenceSite::Shorthand) {
            return;
        }
        walk::walk_object_property(self, it);
    }

    fn visit_tagged_template_expression(&mut self, it: &TaggedTemplateExpression<'a>) {
        if self.rewrite_reference(&it.tag, ReferenceSite::Callee) {
            self.visit_template_literal(&it.quasi);
            return;
        }
        walk::walk_tagged_template_expression(self, it);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Some(specifier) = string_literal(&it.source) {
            let request = self.skeleton.request(&specifier, RequestKind::Dynamic);
            self.skeleton.edits.push(Edit {
                start: it.span.start,
                end: it.span.end,
                kind: EditKind::DynamicImport { request },
            });
            return;
        }
        walk::walk_import_expression(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        let is_require = matches!(&it.callee, Expression::Identifier(ident) if ident.name == "require");
        if is_require && it.arguments.len() == 1 {
            let specifier = match &it.arguments[0] {
                Argument::StringLiteral(lit) => Some(lit.value.to_string()),
                _ => None,
            };
            if let Some(specifier) = specifier {
                let request = self.skeleton.request(&specifier, RequestKind::Require);
                self.skeleton.edits.push(Edit {
                    start: it.span.start,
                    end: it.span.end,
                    kind: EditKind::Require { request },
                });
                return;
            }
        }
        if self.rewrite_reference(&it.callee, ReferenceSite::Callee) {
            for argument in &it.arguments {
                self.visit_argument(argument);
            }
            return;
        }
        walk::walk_call_expression(self, it);
    }
}
