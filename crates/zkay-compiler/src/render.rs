//! Text rendering
//!
//! Two renderers live here: a source-level printer for the resolved AST,
//! used in circuit comments and diagnostics, and the Solidity printer for
//! transformed [`PublicContract`]s.

use crate::ast::types::BuiltinOp;
use crate::ast::{Ast, ExprId, ExprKind, Mutability, StmtId, StmtKind, Visibility};
use crate::transform::public::{DataLocation, PubExpr, PubFunction, PubStmt, PubType, PublicContract};

pub const SOLIDITY_PRAGMA: &str = "pragma solidity ^0.8.0;";

const INDENT: &str = "    ";

// ============================================================================
// Source-level printing
// ============================================================================

/// Source text of an expression, with implicit conversions elided
pub fn source_expr(ast: &Ast, e: ExprId) -> String {
    let sub = |x: ExprId| {
        let text = source_expr(ast, x);
        if needs_parens_src(ast, x) {
            format!("({})", text)
        } else {
            text
        }
    };
    match &ast.expr(e).kind {
        ExprKind::Bool(b) => b.to_string(),
        ExprKind::Number(n) => n.to_string(),
        ExprKind::Me => "me".to_string(),
        ExprKind::Ident(v) => ast.var_name(*v),
        ExprKind::Builtin { op, args, .. } => match (op, args.as_slice()) {
            (BuiltinOp::Parenthesis, [a]) => format!("({})", source_expr(ast, *a)),
            (BuiltinOp::Ite, [c, t, o]) => format!("{} ? {} : {}", sub(*c), sub(*t), sub(*o)),
            (_, [a]) => format!("{}{}", op.symbol(), sub(*a)),
            (_, [a, b]) => format!("{} {} {}", sub(*a), op.symbol(), sub(*b)),
            _ => format!("{}(..)", op.symbol()),
        },
        ExprKind::Call { func, args } => {
            let args: Vec<String> = args.iter().map(|a| source_expr(ast, *a)).collect();
            format!("{}({})", ast.function(*func).name, args.join(", "))
        }
        ExprKind::Index { base, index } => format!("{}[{}]", sub(*base), source_expr(ast, *index)),
        ExprKind::Reclassify { expr, implicit: true, .. } | ExprKind::Cast { expr, implicit: true, .. } => {
            source_expr(ast, *expr)
        }
        ExprKind::Reclassify { expr, privacy, .. } => {
            format!("reveal({}, {})", source_expr(ast, *expr), ast.describe_privacy(privacy))
        }
        ExprKind::Cast { ty, expr, .. } => {
            format!("{}({})", ty.describe(&|v| ast.var_name(v)), source_expr(ast, *expr))
        }
        ExprKind::Tuple(elems) => {
            let elems: Vec<String> = elems.iter().map(|x| source_expr(ast, *x)).collect();
            format!("({})", elems.join(", "))
        }
    }
}

fn needs_parens_src(ast: &Ast, e: ExprId) -> bool {
    match &ast.expr(e).kind {
        ExprKind::Builtin { op, .. } => op.arity() > 1,
        ExprKind::Reclassify { expr, implicit: true, .. } | ExprKind::Cast { expr, implicit: true, .. } => {
            needs_parens_src(ast, *expr)
        }
        _ => false,
    }
}

/// One-line summary of a statement; compound statements show their head only
pub fn source_stmt(ast: &Ast, s: StmtId) -> String {
    let ex = |e: ExprId| source_expr(ast, e);
    match &ast.stmt(s).kind {
        StmtKind::Block(_) => "{ ... }".to_string(),
        StmtKind::If { cond, .. } => format!("if ({})", ex(*cond)),
        StmtKind::While { cond, .. } => format!("while ({})", ex(*cond)),
        StmtKind::DoWhile { cond, .. } => format!("do ... while ({})", ex(*cond)),
        StmtKind::For { cond, .. } => format!("for (...; {}; ...)", cond.map(ex).unwrap_or_default()),
        StmtKind::VarDecl { var, init } => {
            let v = ast.var(*var);
            let decl = format!("{} {}", ast.describe_type(&v.ty), v.name);
            match init {
                Some(e) => format!("{} = {}", decl, ex(*e)),
                None => decl,
            }
        }
        StmtKind::Assign { lhs, rhs } => format!("{} = {}", ex(*lhs), ex(*rhs)),
        StmtKind::Expr(e) => ex(*e),
        StmtKind::Require(e) => format!("require({})", ex(*e)),
        StmtKind::Return(Some(e)) => format!("return {}", ex(*e)),
        StmtKind::Return(None) => "return".to_string(),
        StmtKind::Break => "break".to_string(),
        StmtKind::Continue => "continue".to_string(),
    }
}

// ============================================================================
// Solidity printing
// ============================================================================

pub fn render_type(ty: &PubType) -> String {
    match ty {
        PubType::Bool => "bool".to_string(),
        PubType::Uint(b) => format!("uint{}", b),
        PubType::Int(b) => format!("int{}", b),
        PubType::Address => "address".to_string(),
        PubType::AddressPayable => "address payable".to_string(),
        PubType::Cipher(n) | PubType::Key(n) | PubType::Proof(n) | PubType::UintArray(Some(n)) => {
            format!("uint[{}]", n)
        }
        PubType::UintArray(None) => "uint[]".to_string(),
        PubType::Mapping { key, value } => format!("mapping({} => {})", render_type(key), render_type(value)),
        PubType::Array { elem, len: Some(n) } => format!("{}[{}]", render_type(elem), n),
        PubType::Array { elem, len: None } => format!("{}[]", render_type(elem)),
        PubType::Tuple(elems) => {
            let elems: Vec<String> = elems.iter().map(render_type).collect();
            format!("({})", elems.join(", "))
        }
        PubType::Struct(name) | PubType::Contract(name) => name.clone(),
    }
}

fn location(loc: Option<DataLocation>) -> &'static str {
    match loc {
        Some(DataLocation::Memory) => " memory",
        Some(DataLocation::Calldata) => " calldata",
        None => "",
    }
}

pub fn render_expr(e: &PubExpr) -> String {
    let sub = |x: &PubExpr| {
        let text = render_expr(x);
        if matches!(x, PubExpr::Op { op, .. } if op.arity() > 1) {
            format!("({})", text)
        } else {
            text
        }
    };
    let list = |xs: &[PubExpr]| xs.iter().map(render_expr).collect::<Vec<_>>().join(", ");
    match e {
        PubExpr::Bool(b) => b.to_string(),
        PubExpr::Number(n) => n.to_string(),
        PubExpr::Ident(name) => name.clone(),
        PubExpr::MsgSender => "msg.sender".to_string(),
        PubExpr::Member { base, member } => format!("{}.{}", sub(base), member),
        PubExpr::Index { base, index } => format!("{}[{}]", sub(base), render_expr(index)),
        PubExpr::Op { op, args } => match (op, args.as_slice()) {
            (BuiltinOp::Parenthesis, [a]) => format!("({})", render_expr(a)),
            (BuiltinOp::Ite, [c, t, o]) => format!("{} ? {} : {}", sub(c), sub(t), sub(o)),
            (_, [a]) => format!("{}{}", op.symbol(), sub(a)),
            (_, [a, b]) => format!("{} {} {}", sub(a), op.symbol(), sub(b)),
            _ => format!("{}({})", op.symbol(), list(args)),
        },
        PubExpr::Cast { ty, expr } => format!("{}({})", render_type(ty), render_expr(expr)),
        PubExpr::Call { name, args, .. } => format!("{}({})", name, list(args)),
        PubExpr::MethodCall { target, method, args } => format!("{}.{}({})", sub(target), method, list(args)),
        PubExpr::NewArray { len } => format!("new uint[]({})", render_expr(len)),
        PubExpr::Tuple(elems) => format!("({})", list(elems)),
    }
}

/// A statement without its terminating semicolon, for `for` headers
fn render_simple_stmt(s: &PubStmt) -> String {
    match s {
        PubStmt::VarDecl { ty, name, location: loc, init } => {
            let decl = format!("{}{} {}", render_type(ty), location(*loc), name);
            match init {
                Some(e) => format!("{} = {}", decl, render_expr(e)),
                None => decl,
            }
        }
        PubStmt::Assign { lhs, rhs } => format!("{} = {}", render_expr(lhs), render_expr(rhs)),
        PubStmt::Expr(e) => render_expr(e),
        _ => String::new(),
    }
}

struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, head: &str, body: &[PubStmt], tail: &str) {
        self.line(&format!("{} {{", head));
        self.depth += 1;
        self.stmts(body);
        self.depth -= 1;
        self.line(&format!("}}{}", tail));
    }

    fn stmts(&mut self, stmts: &[PubStmt]) {
        for s in stmts {
            self.stmt(s);
        }
    }

    fn stmt(&mut self, s: &PubStmt) {
        match s {
            PubStmt::Comment(text) => self.line(&format!("// {}", text)),
            PubStmt::Block(body) => {
                self.line("{");
                self.depth += 1;
                self.stmts(body);
                self.depth -= 1;
                self.line("}");
            }
            PubStmt::If { cond, then, otherwise } => {
                let head = format!("if ({})", render_expr(cond));
                match otherwise {
                    Some(o) => {
                        self.block(&head, then, "");
                        // rewrite the closing brace into `} else {`
                        self.out.truncate(self.out.len() - 1);
                        self.out.push_str(" else {\n");
                        self.depth += 1;
                        self.stmts(o);
                        self.depth -= 1;
                        self.line("}");
                    }
                    None => self.block(&head, then, ""),
                }
            }
            PubStmt::While { cond, body } => self.block(&format!("while ({})", render_expr(cond)), body, ""),
            PubStmt::DoWhile { body, cond } => self.block("do", body, &format!(" while ({});", render_expr(cond))),
            PubStmt::For { init, cond, update, body } => {
                let head = format!(
                    "for ({}; {}; {})",
                    init.as_deref().map(render_simple_stmt).unwrap_or_default(),
                    cond.as_ref().map(render_expr).unwrap_or_default(),
                    update.as_deref().map(render_simple_stmt).unwrap_or_default()
                );
                self.block(&head, body, "");
            }
            PubStmt::VarDecl { .. } | PubStmt::Assign { .. } | PubStmt::Expr(_) => {
                self.line(&format!("{};", render_simple_stmt(s)))
            }
            PubStmt::Require(e) => self.line(&format!("require({});", render_expr(e))),
            PubStmt::Return(Some(e)) => self.line(&format!("return {};", render_expr(e))),
            PubStmt::Return(None) => self.line("return;"),
            PubStmt::Break => self.line("break;"),
            PubStmt::Continue => self.line("continue;"),
        }
    }

    fn function(&mut self, f: &PubFunction) {
        let params: Vec<String> =
            f.params.iter().map(|p| format!("{}{} {}", render_type(&p.ty), location(p.location), p.name)).collect();
        let mut head = if f.is_constructor {
            format!("constructor({})", params.join(", "))
        } else {
            let visibility = match f.visibility {
                Visibility::Public => "public",
                Visibility::External => "external",
                Visibility::Internal => "internal",
                Visibility::Private => "private",
            };
            format!("function {}({}) {}", f.name, params.join(", "), visibility)
        };
        match f.mutability {
            Mutability::NonPayable => {}
            Mutability::Payable => head.push_str(" payable"),
            Mutability::View => head.push_str(" view"),
            Mutability::Pure => head.push_str(" pure"),
        }
        if !f.returns.is_empty() {
            let returns: Vec<String> = f
                .returns
                .iter()
                .map(|t| {
                    let loc = t.is_reference().then_some(DataLocation::Memory);
                    format!("{}{}", render_type(t), location(loc))
                })
                .collect();
            head.push_str(&format!(" returns ({})", returns.join(", ")));
        }
        self.block(&head, &f.body, "");
    }
}

/// Renders a transformed contract as a Solidity source file
pub fn render_contract(contract: &PublicContract) -> String {
    let mut p = Printer { out: String::new(), depth: 0 };
    p.line(SOLIDITY_PRAGMA);
    p.line("");
    for import in &contract.imports {
        p.line(&format!("import \"./{}\";", import));
    }
    if !contract.imports.is_empty() {
        p.line("");
    }
    p.line(&format!("contract {} {{", contract.name));
    p.depth += 1;

    let sections = [("External contracts", &contract.external_contracts), ("User state variables", &contract.state_vars)];
    for (title, vars) in sections {
        if vars.is_empty() {
            continue;
        }
        p.line(&format!("// {}", title));
        for v in vars {
            let constant = if v.constant { " constant" } else { "" };
            let init = v.init.as_ref().map(|e| format!(" = {}", render_expr(e))).unwrap_or_default();
            p.line(&format!("{}{} {}{};", render_type(&v.ty), constant, v.name, init));
        }
        p.line("");
    }
    for s in &contract.structs {
        p.line(&format!("struct {} {{", s.name));
        p.depth += 1;
        for (ty, name) in &s.fields {
            p.line(&format!("{} {};", render_type(ty), name));
        }
        p.depth -= 1;
        p.line("}");
        p.line("");
    }
    for (i, f) in contract.functions.iter().enumerate() {
        if i > 0 {
            p.line("");
        }
        p.function(f);
    }

    p.depth -= 1;
    p.line("}");
    p.out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_ops_are_parenthesized() {
        let e = PubExpr::op(
            BuiltinOp::Mul,
            vec![PubExpr::op(BuiltinOp::Add, vec![PubExpr::ident("a"), PubExpr::num(1)]), PubExpr::ident("b")],
        );
        assert_eq!(render_expr(&e), "(a + 1) * b");
    }

    #[test]
    fn test_render_buffer_types() {
        assert_eq!(render_type(&PubType::Cipher(3)), "uint[3]");
        assert_eq!(render_type(&PubType::UintArray(None)), "uint[]");
        let m = PubType::Mapping { key: Box::new(PubType::Address), value: Box::new(PubType::Cipher(1)) };
        assert_eq!(render_type(&m), "mapping(address => uint[1])");
    }

    #[test]
    fn test_if_else_layout() {
        let mut p = Printer { out: String::new(), depth: 0 };
        p.stmt(&PubStmt::If {
            cond: PubExpr::ident("c"),
            then: vec![PubStmt::Break],
            otherwise: Some(vec![PubStmt::Continue]),
        });
        assert_eq!(p.out, "if (c) {\n    break;\n} else {\n    continue;\n}\n");
    }
}
