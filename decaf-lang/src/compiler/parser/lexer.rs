use super::token::*;
use crate::utils::metadata::*;
use chumsky::prelude::*;
use chumsky::Parser;

fn comment_parser() -> impl Parser<char, (), Error = Simple<char>> + Clone {
    just("//")
        .then(take_until(text::newline().or(end())))
        .ignored()
}

fn string_parser() -> impl Parser<char, Token, Error = Simple<char>> + Clone {
    let escape = just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('"'),
        just('\\'),
    )));
    just('"')
        .ignore_then(
            filter(|c: &char| *c != '"' && *c != '\\' && *c != '\n')
                .or(escape)
                .repeated(),
        )
        .then_ignore(just('"'))
        .collect::<String>()
        .map(Token::Str)
        .labelled("string")
}

fn int_parser() -> impl Parser<char, Token, Error = Simple<char>> + Clone {
    let hex = just("0x")
        .or(just("0X"))
        .ignore_then(filter(|c: &char| c.is_ascii_hexdigit()).repeated().at_least(1))
        .collect::<String>()
        .try_map(|s, span| {
            i64::from_str_radix(&s, 16)
                .map_err(|e| Simple::custom(span, format!("invalid hex literal: {e}")))
        });
    let dec = text::int(10).try_map(|s: String, span| {
        s.parse::<i64>()
            .map_err(|e| Simple::custom(span, format!("invalid integer literal: {e}")))
    });
    hex.or(dec).map(Token::Int).labelled("integer")
}

pub fn lexer() -> impl Parser<char, Vec<(Token, Span)>, Error = Simple<char>> {
    // two-character operators have to be tried before their one-character prefixes
    let op = choice((
        just("||").to(Token::Op(Op::Or)),
        just("&&").to(Token::Op(Op::And)),
        just("==").to(Token::Op(Op::Equal)),
        just("!=").to(Token::Op(Op::NotEqual)),
        just("<=").to(Token::Op(Op::LessEqual)),
        just(">=").to(Token::Op(Op::GreaterEqual)),
        just('<').to(Token::Op(Op::LessThan)),
        just('>').to(Token::Op(Op::GreaterThan)),
        just('+').to(Token::Op(Op::Sum)),
        just('-').to(Token::Op(Op::Minus)),
        just('*').to(Token::Op(Op::Product)),
        just('/').to(Token::Op(Op::Divide)),
        just('%').to(Token::Op(Op::Modulo)),
        just('!').to(Token::Op(Op::Not)),
        just('=').to(Token::Assign),
    ));

    let punct = one_of("(){}[],;").map(|c| match c {
        '(' => Token::ParenBegin,
        ')' => Token::ParenEnd,
        '{' => Token::BlockBegin,
        '}' => Token::BlockEnd,
        '[' => Token::ArrayBegin,
        ']' => Token::ArrayEnd,
        ',' => Token::Comma,
        _ => Token::SemiColon,
    });

    // A parser for identifiers and keywords
    let ident = text::ident().map(|ident: String| match ident.as_str() {
        "def" => Token::Def,
        "if" => Token::If,
        "else" => Token::Else,
        "while" => Token::While,
        "return" => Token::Return,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "true" => Token::True,
        "false" => Token::False,
        "int" => Token::IntType,
        "bool" => Token::BoolType,
        "void" => Token::VoidType,
        _ => Token::Ident(ident),
    });

    let token = int_parser()
        .or(string_parser())
        .or(ident)
        .or(op)
        .or(punct);

    let trivia = comment_parser()
        .or(filter(|c: &char| c.is_whitespace()).ignored())
        .repeated();

    trivia
        .clone()
        .ignore_then(
            token
                .map_with_span(|tok, span| (tok, span))
                .then_ignore(trivia)
                .repeated(),
        )
        .then_ignore(end())
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        lexer()
            .parse(src)
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_decl() {
        let src = "int a;\na = 36;";
        let res = lexer().parse(src).unwrap();
        let ans = vec![
            (Token::IntType, 0..3),
            (Token::Ident("a".to_string()), 4..5),
            (Token::SemiColon, 5..6),
            (Token::Ident("a".to_string()), 7..8),
            (Token::Assign, 9..10),
            (Token::Int(36), 11..13),
            (Token::SemiColon, 13..14),
        ];
        assert_eq!(res, ans);
    }

    #[test]
    fn operators() {
        assert_eq!(
            tokens("a<=b||!c!=-d"),
            vec![
                Token::Ident("a".to_string()),
                Token::Op(Op::LessEqual),
                Token::Ident("b".to_string()),
                Token::Op(Op::Or),
                Token::Op(Op::Not),
                Token::Ident("c".to_string()),
                Token::Op(Op::NotEqual),
                Token::Op(Op::Minus),
                Token::Ident("d".to_string()),
            ]
        );
    }

    #[test]
    fn literals_and_comments() {
        assert_eq!(
            tokens("// header\nprint_str(\"a\\tb\\n\"); // trailing\n0x1F true"),
            vec![
                Token::Ident("print_str".to_string()),
                Token::ParenBegin,
                Token::Str("a\tb\n".to_string()),
                Token::ParenEnd,
                Token::SemiColon,
                Token::Int(31),
                Token::True,
            ]
        );
        assert_eq!(tokens("x // no newline at the end"), vec![Token::Ident("x".to_string())]);
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(
            tokens("def void whilex"),
            vec![Token::Def, Token::VoidType, Token::Ident("whilex".to_string())]
        );
    }

    #[test]
    fn unterminated_string_fails() {
        assert!(lexer().parse("\"abc").is_err());
    }
}
