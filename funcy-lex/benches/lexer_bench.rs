use criterion::{criterion_group, criterion_main, Criterion};
use funcy_lex::Lexer;
use funcy_util::Log;

fn lex_all(source: &str) {
    let mut log = Log::new();
    let mut lexer = Lexer::new("bench", source, false);
    loop {
        let tok = lexer.next_token(&mut log);
        if tok.is_eof() {
            break;
        }
    }
}

fn bench_lexer(c: &mut Criterion) {
    let source = "func main() { let mut i = 0; while (i < 1000) { i += 1; } return i; }\n"
        .repeat(64);

    c.bench_function("lex_synthetic_program", |b| {
        b.iter(|| lex_all(&source));
    });
}

criterion_group!(benches, bench_lexer);
criterion_main!(benches);
