use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Sum,     // +
    Minus,   // -
    Product, // *
    Divide,  // /
    Modulo,  // %

    Equal,        // ==
    NotEqual,     // !=
    LessThan,     // <
    LessEqual,    // <=
    GreaterThan,  // >
    GreaterEqual, // >=

    And, // &&
    Or,  // ||
    Not, // !
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    Ident(String),

    IntType,
    BoolType,
    VoidType,

    Int(i64),
    Str(String),
    True,
    False,

    Op(Op),
    Assign,

    Comma,
    SemiColon,

    ParenBegin,
    ParenEnd,
    ArrayBegin,
    ArrayEnd,
    BlockBegin,
    BlockEnd,

    Def,
    If,
    Else,
    While,
    Return,
    Break,
    Continue,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Sum => "+",
            Op::Minus => "-",
            Op::Product => "*",
            Op::Divide => "/",
            Op::Modulo => "%",
            Op::Equal => "==",
            Op::NotEqual => "!=",
            Op::LessThan => "<",
            Op::LessEqual => "<=",
            Op::GreaterThan => ">",
            Op::GreaterEqual => ">=",
            Op::And => "&&",
            Op::Or => "||",
            Op::Not => "!",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(x) => write!(f, "{x}"),
            Token::IntType => write!(f, "int"),
            Token::BoolType => write!(f, "bool"),
            Token::VoidType => write!(f, "void"),
            Token::Int(x) => write!(f, "{x}"),
            Token::Str(x) => write!(f, "\"{x}\""),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Op(x) => write!(f, "{x}"),
            Token::Assign => write!(f, "="),
            Token::Comma => write!(f, ","),
            Token::SemiColon => write!(f, ";"),
            Token::ParenBegin => write!(f, "("),
            Token::ParenEnd => write!(f, ")"),
            Token::ArrayBegin => write!(f, "["),
            Token::ArrayEnd => write!(f, "]"),
            Token::BlockBegin => write!(f, "{{"),
            Token::BlockEnd => write!(f, "}}"),
            Token::Def => write!(f, "def"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::Return => write!(f, "return"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
        }
    }
}
