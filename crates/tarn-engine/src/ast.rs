//! Syntax tree produced by the parser and walked by the interpreter.

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Block {
    pub stats: Vec<Stat>,
}

#[derive(Debug, Clone)]
pub enum Stat {
    /// `local a, b = e1, e2`
    Local { names: Vec<String>, exprs: Vec<Expr> },
    /// `t1, t2 = e1, e2` where every target is a name or index expression
    Assign { targets: Vec<Expr>, exprs: Vec<Expr> },
    /// An expression statement; always a call.
    Call(Expr),
    /// `if c then b elseif c2 then b2 else b3 end`
    If {
        arms: Vec<(Expr, Block)>,
        else_body: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    /// `for i = start, stop [, step] do body end`
    NumericFor {
        var: String,
        start: Expr,
        stop: Expr,
        step: Option<Expr>,
        body: Block,
    },
    Do(Block),
    /// `function a.b.c(...) ... end`
    Function { target: Expr, body: FuncBody },
    LocalFunction { name: String, body: FuncBody },
    Return(Vec<Expr>),
    Break,
}

#[derive(Debug, Clone)]
pub struct FuncBody {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub block: Arc<Block>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Nil,
    True,
    False,
    Number(f64),
    Str(String),
    Name(String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Function(FuncBody),
    TableCtor(Vec<TableItem>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum TableItem {
    /// `{ e }` — appended to the list part
    Positional(Expr),
    /// `{ name = e }`
    Named(String, Expr),
    /// `{ [k] = e }`
    Keyed(Expr, Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
}
