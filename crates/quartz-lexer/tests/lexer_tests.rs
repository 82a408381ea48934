use quartz_common::token::{TokenCategory, TokenKind};
use quartz_lexer::Lexer;

fn lexer(src: &str) -> Lexer {
    Lexer::new(src.as_bytes().to_vec(), "test.qz").unwrap()
}

/// Collect every token kind including the final sentinel.
fn kinds(src: &str) -> Vec<TokenKind> {
    let mut lx = lexer(src);
    let mut out = vec![lx.current().kind];
    loop {
        let t = lx.consume(1);
        out.push(t.kind);
        if t.kind == TokenKind::EndOfFile || t.kind == TokenKind::Illegal {
            break;
        }
    }
    out
}

fn first(src: &str) -> (TokenKind, String) {
    let lx = lexer(src);
    let tok = lx.current();
    (tok.kind, lx.token_text(&tok))
}

#[test]
fn simple_punctuators() {
    assert_eq!(
        kinds("(){}[];,"),
        vec![
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::RBrace,
            TokenKind::LBracket,
            TokenKind::RBracket,
            TokenKind::Semicolon,
            TokenKind::Comma,
            TokenKind::EndOfFile,
        ]
    );
}

#[test]
fn single_operators() {
    assert_eq!(
        kinds("+ - * / % == != < > <= >=&|^"),
        vec![
            TokenKind::Plus,
            TokenKind::Sub,
            TokenKind::Mul,
            TokenKind::Div,
            TokenKind::Mod,
            TokenKind::Eq,
            TokenKind::Neq,
            TokenKind::Lt,
            TokenKind::Gt,
            TokenKind::Lte,
            TokenKind::Gte,
            TokenKind::BitwiseAnd,
            TokenKind::BitwiseOr,
            TokenKind::Xor,
            TokenKind::EndOfFile,
        ]
    );
}

#[test]
fn compound_operators() {
    assert_eq!(
        kinds("+= -= *= /= %= &= |= ^= << >> <<= >>="),
        vec![
            TokenKind::PlusEq,
            TokenKind::SubEq,
            TokenKind::MulEq,
            TokenKind::DivEq,
            TokenKind::ModEq,
            TokenKind::BitwiseAndEq,
            TokenKind::BitwiseOrEq,
            TokenKind::XorEq,
            TokenKind::Lshift,
            TokenKind::Rshift,
            TokenKind::LshiftEq,
            TokenKind::RshiftEq,
            TokenKind::EndOfFile,
        ]
    );
}

#[test]
fn arrows_increments_and_logic() {
    assert_eq!(
        kinds("-> => ++ -- && || ! ~"),
        vec![
            TokenKind::Arrow,
            TokenKind::FatArrow,
            TokenKind::Inc,
            TokenKind::Dec,
            TokenKind::LogicalAnd,
            TokenKind::LogicalOr,
            TokenKind::LogicalNot,
            TokenKind::BitwiseNot,
            TokenKind::EndOfFile,
        ]
    );
}

#[test]
fn colon_and_dot_families() {
    assert_eq!(
        kinds(": :: . .. ... @ $"),
        vec![
            TokenKind::TypeAssign,
            TokenKind::NamespaceOp,
            TokenKind::Dot,
            TokenKind::DotDot,
            TokenKind::Ellipsis,
            TokenKind::At,
            TokenKind::Dollar,
            TokenKind::EndOfFile,
        ]
    );
}

#[test]
fn integer_literals() {
    let (kind, text) = first("42");
    assert_eq!(kind, TokenKind::IntLiteral);
    assert_eq!(text, "42");

    let (kind, text) = first("123456789 rest");
    assert_eq!(kind, TokenKind::IntLiteral);
    assert_eq!(text, "123456789");
}

#[test]
fn float_literals() {
    for src in ["3.14", "0.5", "1e10", "1e+10", "2.5e-3", "7E2"] {
        let (kind, _) = first(src);
        assert_eq!(kind, TokenKind::FloatLiteral, "{src} should be a float");
    }
}

#[test]
fn malformed_numbers_are_illegal() {
    for src in ["1.2.3", "1e5e5", "1e+", "1e"] {
        let (kind, _) = first(src);
        assert_eq!(kind, TokenKind::Illegal, "{src} should be illegal");
    }
}

#[test]
fn hex_literals() {
    let (kind, text) = first("0xFF");
    assert_eq!(kind, TokenKind::HexLiteral);
    assert_eq!(text, "0xFF");

    let (kind, _) = first("0X1a2b3c");
    assert_eq!(kind, TokenKind::HexLiteral);

    // "0x" with no digits is not a hex literal.
    let (kind, _) = first("0x");
    assert_eq!(kind, TokenKind::Illegal);
}

#[test]
fn octal_literals() {
    let (kind, text) = first("0777");
    assert_eq!(kind, TokenKind::OctalLiteral);
    assert_eq!(text, "0777");

    // An 8 or 9 digit poisons the literal.
    let (kind, _) = first("089");
    assert_eq!(kind, TokenKind::Illegal);
}

#[test]
fn string_literals() {
    let (kind, text) = first(r#""hello world""#);
    assert_eq!(kind, TokenKind::StringLiteral);
    assert_eq!(text, r#""hello world""#);

    // Escaped closing quote stays inside the literal.
    let (kind, text) = first(r#""a\"b""#);
    assert_eq!(kind, TokenKind::StringLiteral);
    assert_eq!(text, r#""a\"b""#);

    // Backtick strings lex the same way.
    let (kind, _) = first("`raw \\` tick`");
    assert_eq!(kind, TokenKind::StringLiteral);
}

#[test]
fn unterminated_strings_are_illegal() {
    let (kind, _) = first("\"abc");
    assert_eq!(kind, TokenKind::Illegal);

    let (kind, _) = first("\"abc\ndef\"");
    assert_eq!(kind, TokenKind::Illegal);
}

#[test]
fn utf8_inside_strings_is_preserved() {
    let src = "\"héllo → wörld\"";
    let (kind, text) = first(src);
    assert_eq!(kind, TokenKind::StringLiteral);
    assert_eq!(text, src);
}

#[test]
fn byte_literals() {
    let (kind, text) = first("'a'");
    assert_eq!(kind, TokenKind::ByteLiteral);
    assert_eq!(text, "'a'");

    let (kind, _) = first(r"'\n'");
    assert_eq!(kind, TokenKind::ByteLiteral);

    let (kind, _) = first(r"'\''");
    assert_eq!(kind, TokenKind::ByteLiteral);
}

#[test]
fn bad_byte_literals_are_illegal() {
    // Two plain characters inside the quotes.
    let (kind, _) = first("'ab'");
    assert_eq!(kind, TokenKind::Illegal);

    // Multi-byte UTF-8 interior.
    let (kind, _) = first("'é'");
    assert_eq!(kind, TokenKind::Illegal);

    // Newline interior.
    let (kind, _) = first("'\n'");
    assert_eq!(kind, TokenKind::Illegal);
}

#[test]
fn keywords_lex_as_keywords() {
    assert_eq!(
        kinds("proc let const namespace struct switch defer_if scope"),
        vec![
            TokenKind::Proc,
            TokenKind::Let,
            TokenKind::Const,
            TokenKind::Namespace,
            TokenKind::Struct,
            TokenKind::Switch,
            TokenKind::DeferIf,
            TokenKind::Scope,
            TokenKind::EndOfFile,
        ]
    );
}

#[test]
fn bool_and_null_are_literal_category() {
    let mut lx = lexer("true false null");
    assert_eq!(lx.current().kind, TokenKind::BoolLiteral);
    assert!(lx.current().cat.isa(TokenCategory::LITERAL));
    lx.consume(1);
    assert_eq!(lx.current().kind, TokenKind::BoolLiteral);
    lx.consume(1);
    assert_eq!(lx.current().kind, TokenKind::NullLiteral);
    assert!(lx.current().cat.isa(TokenCategory::LITERAL));
}

#[test]
fn identifiers_with_utf8() {
    let (kind, text) = first("übung");
    assert_eq!(kind, TokenKind::Identifier);
    assert_eq!(text, "übung");

    let (kind, text) = first("foo_bar123");
    assert_eq!(kind, TokenKind::Identifier);
    assert_eq!(text, "foo_bar123");
}

#[test]
fn identifier_stops_at_reserved_byte() {
    let mut lx = lexer("foo;bar");
    assert_eq!(lx.token_text(&lx.current()), "foo");
    assert_eq!(lx.consume(1).kind, TokenKind::Semicolon);
    assert_eq!(lx.consume(1).kind, TokenKind::Identifier);
    assert_eq!(lx.token_text(&lx.current()), "bar");
}

#[test]
fn categories_drive_parser_dispatch() {
    let mut lx = lexer("+ ++ ( ; x == if");
    assert!(lx.current().cat.isa(TokenCategory::BINARY_OP));
    assert!(lx.current().cat.isa(TokenCategory::VALID_PREFIX));

    let inc = lx.consume(1);
    assert!(inc.cat.isa(TokenCategory::VALID_POSTFIX));
    assert!(inc.cat.isa(TokenCategory::VALID_PREFIX));
    assert!(inc.cat.isa(TokenCategory::UNARY_OP));

    let lparen = lx.consume(1);
    assert!(lparen.cat.isa(TokenCategory::PUNCTUATOR));
    assert!(lparen.cat.isa(TokenCategory::VALID_POSTFIX));

    let semi = lx.consume(1);
    assert!(semi.cat.isa(TokenCategory::TERMINATOR));

    let ident = lx.consume(1);
    assert!(ident.cat.isa(TokenCategory::IDENTIFIER));

    let eq = lx.consume(1);
    assert!(eq.cat.isa(TokenCategory::COMPARISON_OP));
    assert!(eq.cat.isa(TokenCategory::BINARY_OP));

    let if_kw = lx.consume(1);
    assert!(if_kw.cat.isa(TokenCategory::KEYWORD));
    assert!(if_kw.cat.isa(TokenCategory::CONTROL_FLOW));
}

#[test]
fn batched_peek_matches_sequential_consume() {
    let mut lx = lexer("a b c d");
    let peeked: [_; 3] = lx.batched_peek();
    let before = lx.current();

    let t1 = lx.consume(1);
    let t2 = lx.consume(1);
    let t3 = lx.consume(1);
    assert_eq!(peeked, [t1, t2, t3]);
    assert_ne!(before, t1);
}

#[test]
fn expect_kind_and_category() {
    let mut lx = lexer("let x");
    assert!(lx.expect_kind(TokenKind::Let, true).is_ok());
    assert!(lx.expect_kind(TokenKind::Let, false).is_err());
    assert!(lx.expect_cat(TokenCategory::IDENTIFIER, true).is_ok());
    assert_eq!(lx.current().kind, TokenKind::EndOfFile);
}

#[test]
fn reset_restarts_on_new_buffer() {
    let mut lx = lexer("proc main");
    lx.consume(1);
    lx.reset(b"let y = 2;".to_vec(), "other.qz").unwrap();
    assert_eq!(lx.current().kind, TokenKind::Let);
    assert_eq!(lx.current().line, 1);
    assert_eq!(lx.file_name(), "other.qz");
}

#[test]
fn line_counter_is_monotonic() {
    let mut lx = lexer("a\nb\nc d\n\n\ne");
    let mut last = 0;
    loop {
        let tok = lx.current();
        assert!(tok.line >= last);
        last = tok.line;
        if tok.kind == TokenKind::EndOfFile {
            break;
        }
        lx.consume(1);
    }
    assert_eq!(last, 6);
}

#[test]
fn nul_byte_terminates_tokenization() {
    let mut bytes = b"abc".to_vec();
    bytes.push(0);
    bytes.extend_from_slice(b"def");
    let mut lx = Lexer::new(bytes, "nul.qz").unwrap();
    assert_eq!(lx.current().kind, TokenKind::Identifier);
    assert_eq!(lx.consume(1).kind, TokenKind::EndOfFile);
}

#[test]
fn stray_control_bytes_are_illegal_not_looping() {
    let mut bytes = b"a".to_vec();
    bytes.push(0x0C); // form feed, not in the whitespace skip set
    bytes.extend_from_slice(b"b");
    let mut lx = Lexer::new(bytes, "ctrl.qz").unwrap();

    assert_eq!(lx.current().kind, TokenKind::Identifier);
    assert_eq!(lx.consume(1).kind, TokenKind::Illegal);
    assert_eq!(lx.consume(1).kind, TokenKind::Identifier);
    assert_eq!(lx.consume(1).kind, TokenKind::EndOfFile);
}

#[test]
fn consume_past_eof_is_idempotent() {
    let mut lx = lexer("x");
    lx.consume(1);
    assert_eq!(lx.current().kind, TokenKind::EndOfFile);
    let eof = lx.current();
    assert_eq!(lx.consume(5), eof);
}

#[test]
fn token_dump_writes_one_line_per_token() {
    let mut lx = lexer("let x = 1;");
    let mut out = Vec::new();
    lx.dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    // let, x, =, 1, ;, EOF
    assert_eq!(text.lines().count(), 6);
    assert!(text.contains("IntLiteral"));
    assert!(text.contains("LINE=1"));
}
