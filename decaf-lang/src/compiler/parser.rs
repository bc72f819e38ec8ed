use crate::ast::*;
use crate::utils::error::ReportableError;
use chumsky::{prelude::*, Parser};

mod error;
mod lexer;
mod token;

pub use error::ParseError;
pub use token::{Op, Token};


fn type_parser() -> impl Parser<Token, Type, Error = Simple<Token>> + Clone {
    select! {
        Token::IntType => Type::Int,
        Token::BoolType => Type::Bool,
        Token::VoidType => Type::Void,
    }
    .labelled("type")
}

fn ident_parser() -> impl Parser<Token, String, Error = Simple<Token>> + Clone {
    select! { Token::Ident(s) => s }.labelled("identifier")
}

fn literal_parser() -> impl Parser<Token, Expr, Error = Simple<Token>> + Clone {
    select! {
        Token::Int(x) => Literal::Int(x),
        Token::True => Literal::Bool(true),
        Token::False => Literal::Bool(false),
        Token::Str(s) => Literal::Str(s),
    }
    .map_with_span(|lit, span| Expr::new(ExprKind::Literal(lit), span))
    .labelled("literal")
}

fn location_parser<P>(expr: P) -> impl Parser<Token, Location, Error = Simple<Token>> + Clone
where
    P: Parser<Token, Expr, Error = Simple<Token>> + Clone,
{
    ident_parser()
        .then(
            expr.delimited_by(just(Token::ArrayBegin), just(Token::ArrayEnd))
                .or_not(),
        )
        .map_with_span(|(name, index), span| Location {
            name,
            index: index.map(Box::new),
            span,
            symbol: None,
        })
        .labelled("location")
}

fn call_parser<P>(expr: P) -> impl Parser<Token, FuncCall, Error = Simple<Token>> + Clone
where
    P: Parser<Token, Expr, Error = Simple<Token>> + Clone,
{
    ident_parser()
        .then(
            expr.separated_by(just(Token::Comma))
                .delimited_by(just(Token::ParenBegin), just(Token::ParenEnd)),
        )
        .map_with_span(|(name, args), span| FuncCall { name, args, span })
        .labelled("call")
}

/// Left-associative chain of `prev (op prev)*`.
fn binary_level<P, O>(prev: P, op: O) -> impl Parser<Token, Expr, Error = Simple<Token>> + Clone
where
    P: Parser<Token, Expr, Error = Simple<Token>> + Clone,
    O: Parser<Token, BinaryOp, Error = Simple<Token>> + Clone,
{
    prev.clone()
        .then(op.then(prev).repeated())
        .foldl(|lhs, (op, rhs)| {
            let span = lhs.span.start..rhs.span.end;
            Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span)
        })
}

fn expr_parser() -> impl Parser<Token, Expr, Error = Simple<Token>> + Clone {
    recursive(|expr| {
        let call = call_parser(expr.clone())
            .map_with_span(|call, span| Expr::new(ExprKind::Call(call), span));
        let location = location_parser(expr.clone()).map(|loc| {
            let span = loc.span.clone();
            Expr::new(ExprKind::Location(loc), span)
        });
        let parenthesized = expr
            .clone()
            .delimited_by(just(Token::ParenBegin), just(Token::ParenEnd));
        let atom = literal_parser()
            .or(call)
            .or(location)
            .or(parenthesized)
            .boxed()
            .labelled("value");

        let unary = select! {
            Token::Op(Op::Minus) => UnaryOp::Neg,
            Token::Op(Op::Not) => UnaryOp::Not,
        }
        .map_with_span(|op, span| (op, span))
        .repeated()
        .then(atom)
        .foldr(|(op, span), rhs| {
            let span = span.start..rhs.span.end;
            Expr::new(ExprKind::Unary(op, Box::new(rhs)), span)
        })
        .boxed();

        let product = binary_level(
            unary,
            select! {
                Token::Op(Op::Product) => BinaryOp::Mul,
                Token::Op(Op::Divide) => BinaryOp::Div,
                Token::Op(Op::Modulo) => BinaryOp::Mod,
            },
        )
        .boxed();
        let sum = binary_level(
            product,
            select! {
                Token::Op(Op::Sum) => BinaryOp::Add,
                Token::Op(Op::Minus) => BinaryOp::Sub,
            },
        )
        .boxed();
        let relation = binary_level(
            sum,
            select! {
                Token::Op(Op::LessThan) => BinaryOp::Lt,
                Token::Op(Op::LessEqual) => BinaryOp::Le,
                Token::Op(Op::GreaterEqual) => BinaryOp::Ge,
                Token::Op(Op::GreaterThan) => BinaryOp::Gt,
            },
        )
        .boxed();
        let equality = binary_level(
            relation,
            select! {
                Token::Op(Op::Equal) => BinaryOp::Eq,
                Token::Op(Op::NotEqual) => BinaryOp::Ne,
            },
        )
        .boxed();
        let and = binary_level(equality, just(Token::Op(Op::And)).to(BinaryOp::And)).boxed();
        binary_level(and, just(Token::Op(Op::Or)).to(BinaryOp::Or))
            .boxed()
            .labelled("expression")
    })
}

fn var_decl_parser() -> impl Parser<Token, VarDecl, Error = Simple<Token>> + Clone {
    let array_len = select! { Token::Int(n) => n }
        .delimited_by(just(Token::ArrayBegin), just(Token::ArrayEnd))
        .or_not();
    type_parser()
        .then(ident_parser())
        .then(array_len)
        .then_ignore(just(Token::SemiColon))
        .map_with_span(|((ty, name), array_len), span| VarDecl {
            name,
            ty,
            array_len,
            span,
            symbol: None,
        })
        .labelled("variable declaration")
}

fn param_parser() -> impl Parser<Token, VarDecl, Error = Simple<Token>> + Clone {
    type_parser()
        .then(ident_parser())
        .map_with_span(|(ty, name), span| VarDecl {
            name,
            ty,
            array_len: None,
            span,
            symbol: None,
        })
        .labelled("parameter")
}

fn block_parser() -> impl Parser<Token, Block, Error = Simple<Token>> + Clone {
    recursive(|block| {
        let expr = expr_parser().boxed();
        let semicolon = || just(Token::SemiColon);
        let cond = expr
            .clone()
            .delimited_by(just(Token::ParenBegin), just(Token::ParenEnd));

        let assign = location_parser(expr.clone())
            .then_ignore(just(Token::Assign))
            .then(expr.clone())
            .then_ignore(semicolon())
            .map(|(loc, e)| Stmt::Assign(loc, e))
            .labelled("assignment");
        let call = call_parser(expr.clone())
            .then_ignore(semicolon())
            .map(Stmt::Call);
        let if_ = just(Token::If)
            .ignore_then(cond.clone())
            .then(block.clone())
            .then(just(Token::Else).ignore_then(block.clone()).or_not())
            .map(|((c, then), els)| Stmt::If(c, then, els))
            .labelled("if");
        let while_ = just(Token::While)
            .ignore_then(cond)
            .then(block.clone())
            .map(|(c, body)| Stmt::While(c, body))
            .labelled("while");
        let return_ = just(Token::Return)
            .ignore_then(expr.clone().or_not())
            .then_ignore(semicolon())
            .map_with_span(Stmt::Return)
            .labelled("return");
        let break_ = just(Token::Break)
            .then_ignore(semicolon())
            .map_with_span(|_, span| Stmt::Break(span));
        let continue_ = just(Token::Continue)
            .then_ignore(semicolon())
            .map_with_span(|_, span| Stmt::Continue(span));

        let stmt = choice((if_, while_, return_, break_, continue_, call, assign))
            .boxed()
            .labelled("statement");

        var_decl_parser()
            .repeated()
            .then(stmt.repeated())
            .delimited_by(just(Token::BlockBegin), just(Token::BlockEnd))
            .map(|(vars, stmts)| Block { vars, stmts })
            .labelled("block")
    })
}

fn func_parser() -> impl Parser<Token, FuncDecl, Error = Simple<Token>> + Clone {
    just(Token::Def)
        .ignore_then(type_parser())
        .then(ident_parser())
        .then(
            param_parser()
                .separated_by(just(Token::Comma))
                .delimited_by(just(Token::ParenBegin), just(Token::ParenEnd)),
        )
        .then(block_parser())
        .map_with_span(|(((ret, name), params), body), span| FuncDecl {
            name,
            ret,
            params,
            body,
            span,
            symbol: None,
            frame_size: None,
        })
        .labelled("function")
}

enum TopLevel {
    Var(VarDecl),
    Func(FuncDecl),
}

fn parser() -> impl Parser<Token, Program, Error = Simple<Token>> + Clone {
    var_decl_parser()
        .map(TopLevel::Var)
        .or(func_parser().map(TopLevel::Func))
        .repeated()
        .then_ignore(end())
        .map(|items| {
            items
                .into_iter()
                .fold(Program::default(), |mut prog, item| {
                    match item {
                        TopLevel::Var(v) => prog.vars.push(v),
                        TopLevel::Func(f) => prog.funcs.push(f),
                    }
                    prog
                })
        })
}

/// Lexes and parses a whole compilation unit. The first failing stage stops the pipeline.
pub fn parse(src: &str) -> Result<Program, Vec<Box<dyn ReportableError>>> {
    let len = src.chars().count();
    let tokens = lexer::lexer().parse(src).map_err(|errs| {
        errs.into_iter()
            .map(|e| Box::new(ParseError::<char>(e)) as Box<dyn ReportableError>)
            .collect::<Vec<_>>()
    })?;
    log::debug!("lexed {} tokens", tokens.len());
    parser()
        .parse(chumsky::Stream::from_iter(len..len + 1, tokens.into_iter()))
        .map_err(|errs| {
            errs.into_iter()
                .map(|e| Box::new(ParseError::<Token>(e)) as Box<dyn ReportableError>)
                .collect()
        })
}
