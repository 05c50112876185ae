use funcy_lex::{Lexer, TokenKind};
use funcy_util::Log;
use proptest::prelude::*;

proptest! {
    /// Every identifier-shaped string either round-trips as an identifier
    /// or matches a keyword exactly — the lexer never reclassifies a valid
    /// identifier lexeme as anything else.
    #[test]
    fn identifiers_round_trip(name in "[A-Za-z_][A-Za-z0-9_]{0,16}") {
        let mut log = Log::new();
        let mut lexer = Lexer::new("prop", &name, false);
        let tok = lexer.next_token(&mut log);

        match tok.kind {
            TokenKind::Identifier(text) => prop_assert_eq!(text, name),
            other => prop_assert!(TokenKind::keyword(&name) == Some(other)),
        }
    }

    /// Decimal literals without a leading zero always lex back to the same
    /// integer value.
    #[test]
    fn decimal_literals_round_trip(value in 1i64..1_000_000) {
        let text = value.to_string();
        let mut log = Log::new();
        let mut lexer = Lexer::new("prop", &text, false);
        let tok = lexer.next_token(&mut log);
        prop_assert_eq!(tok.kind, TokenKind::LiteralInt(value));
    }
}
