//! Macros for building syntax trees by hand in tests.
pub use crate::ast::{
    BinaryOp, Block, Expr, ExprKind, FuncCall, FuncDecl, Literal, Location, Stmt, Type, UnaryOp,
    VarDecl,
};

#[macro_export]
macro_rules! dummy_span {
    () => {
        0..0
    };
}

#[macro_export]
macro_rules! int {
    ($n:expr) => {
        $crate::ast::Expr::new(
            $crate::ast::ExprKind::Literal($crate::ast::Literal::Int($n)),
            $crate::dummy_span!(),
        )
    };
}

#[macro_export]
macro_rules! boolean {
    ($b:expr) => {
        $crate::ast::Expr::new(
            $crate::ast::ExprKind::Literal($crate::ast::Literal::Bool($b)),
            $crate::dummy_span!(),
        )
    };
}

#[macro_export]
macro_rules! loc {
    ($n:literal) => {
        $crate::ast::Location {
            name: $n.to_string(),
            index: None,
            span: $crate::dummy_span!(),
            symbol: None,
        }
    };
    ($n:literal [ $idx:expr ]) => {
        $crate::ast::Location {
            name: $n.to_string(),
            index: Some(Box::new($idx)),
            span: $crate::dummy_span!(),
            symbol: None,
        }
    };
}

#[macro_export]
macro_rules! var {
    ($n:literal) => {
        $crate::ast::Expr::new($crate::ast::ExprKind::Location($crate::loc!($n)), $crate::dummy_span!())
    };
}

#[macro_export]
macro_rules! binop {
    ($op:ident, $a:expr, $b:expr) => {
        $crate::ast::Expr::new(
            $crate::ast::ExprKind::Binary($crate::ast::BinaryOp::$op, Box::new($a), Box::new($b)),
            $crate::dummy_span!(),
        )
    };
}

#[macro_export]
macro_rules! call {
    ($n:literal, [$($arg:expr),*]) => {
        $crate::ast::Expr::new(
            $crate::ast::ExprKind::Call($crate::ast::FuncCall {
                name: $n.to_string(),
                args: vec![$($arg),*],
                span: $crate::dummy_span!(),
            }),
            $crate::dummy_span!(),
        )
    };
}

#[macro_export]
macro_rules! assign {
    ($loc:expr, $e:expr) => {
        $crate::ast::Stmt::Assign($loc, $e)
    };
}

#[macro_export]
macro_rules! ret {
    () => {
        $crate::ast::Stmt::Return(None, $crate::dummy_span!())
    };
    ($e:expr) => {
        $crate::ast::Stmt::Return(Some($e), $crate::dummy_span!())
    };
}

#[macro_export]
macro_rules! decl {
    ($ty:ident, $n:literal) => {
        $crate::ast::VarDecl {
            name: $n.to_string(),
            ty: $crate::ast::Type::$ty,
            array_len: None,
            span: $crate::dummy_span!(),
            symbol: None,
        }
    };
    ($ty:ident, $n:literal [ $len:expr ]) => {
        $crate::ast::VarDecl {
            name: $n.to_string(),
            ty: $crate::ast::Type::$ty,
            array_len: Some($len),
            span: $crate::dummy_span!(),
            symbol: None,
        }
    };
}

#[macro_export]
macro_rules! block {
    ([$($v:expr),*], [$($s:expr),*]) => {
        $crate::ast::Block {
            vars: vec![$($v),*],
            stmts: vec![$($s),*],
        }
    };
}

#[macro_export]
macro_rules! func {
    ($ret:expr, $n:literal, [$($p:expr),*], [$($s:expr),*]) => {
        $crate::func!($ret, $n, [$($p),*], [], [$($s),*])
    };
    ($ret:expr, $n:literal, [$($p:expr),*], [$($v:expr),*], [$($s:expr),*]) => {
        $crate::ast::FuncDecl {
            name: $n.to_string(),
            ret: $ret,
            params: vec![$($p),*],
            body: $crate::block!([$($v),*], [$($s),*]),
            span: $crate::dummy_span!(),
            symbol: None,
            frame_size: None,
        }
    };
}
