//! Recursive-descent parser over the lexer's token stream.

use std::sync::Arc;

use crate::ast::{BinOp, Block, Expr, FuncBody, Stat, TableItem, UnOp};
use crate::error::{EngineError, EngineResult};
use crate::lexer::{tokenize, SpannedToken, Token};

pub fn parse(source: &str) -> EngineResult<Block> {
    let tokens = tokenize(source)?;
    let mut p = Parser { tokens, pos: 0 };
    let block = p.block()?;
    p.expect(Token::Eof)?;
    Ok(block)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos].line
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn accept(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> EngineResult<()> {
        if self.peek() == &token {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {}", token.describe())))
        }
    }

    fn expect_name(&mut self) -> EngineResult<String> {
        match self.peek().clone() {
            Token::Name(n) => {
                self.bump();
                Ok(n)
            }
            _ => Err(self.unexpected("expected a name")),
        }
    }

    fn unexpected(&self, what: &str) -> EngineError {
        EngineError::parse(
            self.line(),
            format!("{}, found {}", what, self.peek().describe()),
        )
    }

    // ----- statements -----

    fn block(&mut self) -> EngineResult<Block> {
        let mut stats = Vec::new();
        loop {
            while self.accept(&Token::Semi) {}
            match self.peek() {
                Token::Eof | Token::End | Token::Else | Token::Elseif => break,
                Token::Return => {
                    stats.push(self.return_stat()?);
                    while self.accept(&Token::Semi) {}
                    break;
                }
                _ => stats.push(self.statement()?),
            }
        }
        Ok(Block { stats })
    }

    fn statement(&mut self) -> EngineResult<Stat> {
        match self.peek() {
            Token::Local => self.local_stat(),
            Token::If => self.if_stat(),
            Token::While => self.while_stat(),
            Token::For => self.for_stat(),
            Token::Function => self.function_stat(),
            Token::Do => {
                self.bump();
                let body = self.block()?;
                self.expect(Token::End)?;
                Ok(Stat::Do(body))
            }
            Token::Break => {
                self.bump();
                Ok(Stat::Break)
            }
            _ => self.expr_stat(),
        }
    }

    fn return_stat(&mut self) -> EngineResult<Stat> {
        self.expect(Token::Return)?;
        let mut exprs = Vec::new();
        if !matches!(
            self.peek(),
            Token::Eof | Token::End | Token::Else | Token::Elseif | Token::Semi
        ) {
            exprs = self.expr_list()?;
        }
        Ok(Stat::Return(exprs))
    }

    fn local_stat(&mut self) -> EngineResult<Stat> {
        self.expect(Token::Local)?;
        if self.accept(&Token::Function) {
            let name = self.expect_name()?;
            let mut body = self.func_body()?;
            body.name = Some(name.clone());
            return Ok(Stat::LocalFunction { name, body });
        }
        let mut names = vec![self.expect_name()?];
        while self.accept(&Token::Comma) {
            names.push(self.expect_name()?);
        }
        let exprs = if self.accept(&Token::Assign) {
            self.expr_list()?
        } else {
            Vec::new()
        };
        Ok(Stat::Local { names, exprs })
    }

    fn if_stat(&mut self) -> EngineResult<Stat> {
        self.expect(Token::If)?;
        let mut arms = Vec::new();
        let cond = self.expr()?;
        self.expect(Token::Then)?;
        arms.push((cond, self.block()?));
        let mut else_body = None;
        loop {
            match self.peek() {
                Token::Elseif => {
                    self.bump();
                    let cond = self.expr()?;
                    self.expect(Token::Then)?;
                    arms.push((cond, self.block()?));
                }
                Token::Else => {
                    self.bump();
                    else_body = Some(self.block()?);
                    self.expect(Token::End)?;
                    break;
                }
                _ => {
                    self.expect(Token::End)?;
                    break;
                }
            }
        }
        Ok(Stat::If { arms, else_body })
    }

    fn while_stat(&mut self) -> EngineResult<Stat> {
        self.expect(Token::While)?;
        let cond = self.expr()?;
        self.expect(Token::Do)?;
        let body = self.block()?;
        self.expect(Token::End)?;
        Ok(Stat::While { cond, body })
    }

    fn for_stat(&mut self) -> EngineResult<Stat> {
        self.expect(Token::For)?;
        let var = self.expect_name()?;
        self.expect(Token::Assign)?;
        let start = self.expr()?;
        self.expect(Token::Comma)?;
        let stop = self.expr()?;
        let step = if self.accept(&Token::Comma) {
            Some(self.expr()?)
        } else {
            None
        };
        self.expect(Token::Do)?;
        let body = self.block()?;
        self.expect(Token::End)?;
        Ok(Stat::NumericFor {
            var,
            start,
            stop,
            step,
            body,
        })
    }

    fn function_stat(&mut self) -> EngineResult<Stat> {
        self.expect(Token::Function)?;
        let first = self.expect_name()?;
        let mut target = Expr::Name(first.clone());
        let mut last = first;
        while self.accept(&Token::Dot) {
            last = self.expect_name()?;
            target = Expr::Index(Box::new(target), Box::new(Expr::Str(last.clone())));
        }
        let mut body = self.func_body()?;
        body.name = Some(last);
        Ok(Stat::Function { target, body })
    }

    fn expr_stat(&mut self) -> EngineResult<Stat> {
        let line = self.line();
        let first = self.suffixed_expr()?;
        if matches!(self.peek(), Token::Assign | Token::Comma) {
            let mut targets = vec![first];
            while self.accept(&Token::Comma) {
                targets.push(self.suffixed_expr()?);
            }
            for t in &targets {
                if !matches!(t, Expr::Name(_) | Expr::Index(_, _)) {
                    return Err(EngineError::parse(line, "cannot assign to this expression"));
                }
            }
            self.expect(Token::Assign)?;
            let exprs = self.expr_list()?;
            return Ok(Stat::Assign { targets, exprs });
        }
        match first {
            call @ Expr::Call(_, _) => Ok(Stat::Call(call)),
            _ => Err(EngineError::parse(line, "unexpected expression statement")),
        }
    }

    // ----- expressions -----

    fn expr_list(&mut self) -> EngineResult<Vec<Expr>> {
        let mut exprs = vec![self.expr()?];
        while self.accept(&Token::Comma) {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr(&mut self) -> EngineResult<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.and_expr()?;
        while self.accept(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.cmp_expr()?;
        while self.accept(&Token::And) {
            let rhs = self.cmp_expr()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.concat_expr()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::Ne,
                Token::Less => BinOp::Lt,
                Token::LessEq => BinOp::Le,
                Token::Greater => BinOp::Gt,
                Token::GreaterEq => BinOp::Ge,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.concat_expr()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    // right-associative
    fn concat_expr(&mut self) -> EngineResult<Expr> {
        let lhs = self.add_expr()?;
        if self.accept(&Token::Concat) {
            let rhs = self.concat_expr()?;
            return Ok(Expr::Binary(BinOp::Concat, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.mul_expr()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn mul_expr(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary_expr(&mut self) -> EngineResult<Expr> {
        let op = match self.peek() {
            Token::Minus => UnOp::Neg,
            Token::Not => UnOp::Not,
            Token::Hash => UnOp::Len,
            _ => return self.suffixed_expr(),
        };
        self.bump();
        let operand = self.unary_expr()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn suffixed_expr(&mut self) -> EngineResult<Expr> {
        let mut expr = self.primary_expr()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.bump();
                    let name = self.expect_name()?;
                    expr = Expr::Index(Box::new(expr), Box::new(Expr::Str(name)));
                }
                Token::LBracket => {
                    self.bump();
                    let key = self.expr()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(key));
                }
                Token::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    if self.peek() != &Token::RParen {
                        args = self.expr_list()?;
                    }
                    self.expect(Token::RParen)?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                Token::Str(_) => {
                    // `f "literal"` call sugar
                    if let Token::Str(s) = self.bump() {
                        expr = Expr::Call(Box::new(expr), vec![Expr::Str(s)]);
                    }
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary_expr(&mut self) -> EngineResult<Expr> {
        match self.peek().clone() {
            Token::Nil => {
                self.bump();
                Ok(Expr::Nil)
            }
            Token::True => {
                self.bump();
                Ok(Expr::True)
            }
            Token::False => {
                self.bump();
                Ok(Expr::False)
            }
            Token::Number(n) => {
                self.bump();
                Ok(Expr::Number(n))
            }
            Token::Str(s) => {
                self.bump();
                Ok(Expr::Str(s))
            }
            Token::Name(n) => {
                self.bump();
                Ok(Expr::Name(n))
            }
            Token::Function => {
                self.bump();
                Ok(Expr::Function(self.func_body()?))
            }
            Token::LBrace => self.table_ctor(),
            Token::LParen => {
                self.bump();
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected("expected an expression")),
        }
    }

    fn func_body(&mut self) -> EngineResult<FuncBody> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if self.peek() != &Token::RParen {
            params.push(self.expect_name()?);
            while self.accept(&Token::Comma) {
                params.push(self.expect_name()?);
            }
        }
        self.expect(Token::RParen)?;
        let block = self.block()?;
        self.expect(Token::End)?;
        Ok(FuncBody {
            name: None,
            params,
            block: Arc::new(block),
        })
    }

    fn table_ctor(&mut self) -> EngineResult<Expr> {
        self.expect(Token::LBrace)?;
        let mut items = Vec::new();
        loop {
            match self.peek().clone() {
                Token::RBrace => break,
                Token::LBracket => {
                    self.bump();
                    let key = self.expr()?;
                    self.expect(Token::RBracket)?;
                    self.expect(Token::Assign)?;
                    items.push(TableItem::Keyed(key, self.expr()?));
                }
                Token::Name(n) if self.tokens[self.pos + 1].token == Token::Assign => {
                    self.bump();
                    self.bump();
                    items.push(TableItem::Named(n, self.expr()?));
                }
                _ => items.push(TableItem::Positional(self.expr()?)),
            }
            if !self.accept(&Token::Comma) && !self.accept(&Token::Semi) {
                break;
            }
        }
        self.expect(Token::RBrace)?;
        Ok(Expr::TableCtor(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_and_assign() {
        let b = parse("local x = 1\nx = x + 1").unwrap();
        assert_eq!(b.stats.len(), 2);
        assert!(matches!(b.stats[0], Stat::Local { .. }));
        assert!(matches!(b.stats[1], Stat::Assign { .. }));
    }

    #[test]
    fn parses_function_with_dotted_name() {
        let b = parse("function m.helper(a, b) return a end").unwrap();
        match &b.stats[0] {
            Stat::Function { target, body } => {
                assert!(matches!(target, Expr::Index(_, _)));
                assert_eq!(body.params, vec!["a", "b"]);
                assert_eq!(body.name.as_deref(), Some("helper"));
            }
            other => panic!("unexpected stat {:?}", other),
        }
    }

    #[test]
    fn parses_table_constructor_forms() {
        let b = parse(r#"local t = { 1, name = "x", [2+3] = true }"#).unwrap();
        match &b.stats[0] {
            Stat::Local { exprs, .. } => match &exprs[0] {
                Expr::TableCtor(items) => {
                    assert_eq!(items.len(), 3);
                    assert!(matches!(items[0], TableItem::Positional(_)));
                    assert!(matches!(items[1], TableItem::Named(_, _)));
                    assert!(matches!(items[2], TableItem::Keyed(_, _)));
                }
                other => panic!("unexpected expr {:?}", other),
            },
            other => panic!("unexpected stat {:?}", other),
        }
    }

    #[test]
    fn concat_is_right_associative() {
        let b = parse(r#"x = "a" .. "b" .. "c""#).unwrap();
        match &b.stats[0] {
            Stat::Assign { exprs, .. } => match &exprs[0] {
                Expr::Binary(BinOp::Concat, _, rhs) => {
                    assert!(matches!(**rhs, Expr::Binary(BinOp::Concat, _, _)));
                }
                other => panic!("unexpected expr {:?}", other),
            },
            other => panic!("unexpected stat {:?}", other),
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("local = 1").is_err());
        assert!(parse("if x then").is_err());
        assert!(parse("1 + 2").is_err());
    }

    #[test]
    fn parse_error_carries_line() {
        match parse("local a = 1\nlocal = 2") {
            Err(EngineError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
