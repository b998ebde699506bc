//! Single-pass Pratt compiler.
//!
//! There is no intermediate AST: every call into the parser emits bytecode
//! directly into the target [`Chunk`] as it recognizes grammar. Precedence
//! climbing is driven by a small table (`rule_precedence`) rather than a
//! table of function pointers, since a `Compiler<'src, '_>` borrowing both a
//! scanner and a chunk makes a `fn` pointer table fight the borrow checker
//! for no real benefit -- a `match` on `TokenKind` reads the same and costs
//! nothing extra.

use ash_core::{Chunk, Interner, OpCode, Value};

use crate::scanner::{Scanner, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

fn rule_precedence(kind: TokenKind) -> Precedence {
    use TokenKind::*;
    match kind {
        Minus | Plus => Precedence::Term,
        Slash | Star => Precedence::Factor,
        BangEqual | EqualEqual => Precedence::Equality,
        Greater | GreaterEqual | Less | LessEqual => Precedence::Comparison,
        _ => Precedence::None,
    }
}

/// Drives the scanner, reports diagnostics, and emits into a caller-owned
/// chunk. One `Compiler` per `compile()` call.
pub struct Compiler<'src, 'a> {
    scanner: Scanner<'src>,
    current: Token<'src>,
    previous: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    chunk: &'a mut Chunk,
    interner: &'a mut Interner,
}

impl<'src, 'a> Compiler<'src, 'a> {
    fn new(source: &'src str, chunk: &'a mut Chunk, interner: &'a mut Interner) -> Self {
        let mut scanner = Scanner::new(source);
        let bootstrap = scanner.scan_token();
        Compiler {
            scanner,
            current: bootstrap,
            previous: bootstrap,
            had_error: false,
            panic_mode: false,
            chunk,
            interner,
        }
    }

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme;
            self.error_at_current(message);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        eprint!("[Line {}] Error", token.line);
        match token.kind {
            TokenKind::Eof => eprint!(" at end"),
            TokenKind::Error => {}
            _ => eprint!(" at '{}'", token.lexeme),
        }
        eprintln!(": {message}");
        self.had_error = true;
    }

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn synchronize(&mut self) {
        tracing::debug!(target: "ash_compiler::parser", line = self.current.line, "resynchronizing after parse error");
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.chunk.write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        let line = self.previous.line;
        self.chunk.write_op(op, line);
    }

    fn emit_bytes(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    fn emit_constant(&mut self, value: Value) {
        let line = self.previous.line;
        self.chunk.write_constant(value, line);
    }

    fn emit_return(&mut self) {
        self.emit_op(OpCode::Return);
    }

    /// Intern `name` and add it to the constant pool, returning its index.
    /// Global names are always addressed with the one-byte global opcodes,
    /// so more than 255 distinct globals is a compile error.
    fn identifier_constant(&mut self, name: &str) -> u8 {
        let interned = self.interner.intern(name);
        let index = self.chunk.add_constant(Value::from(interned));
        if index > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        index as u8
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn var_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect variable name.");
        let name = self.previous.lexeme;
        let global = self.identifier_constant(name);

        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        );
        self.emit_bytes(OpCode::DefineGlobal, global);
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.block();
        } else {
            self.expression_statement();
        }
    }

    /// A block is syntactic grouping only: it introduces no new scope, so a
    /// `var` declared inside it still defines a global.
    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let can_assign = precedence <= Precedence::Assignment;
        if !self.prefix(self.previous.kind, can_assign) {
            self.error("Expect expression.");
            return;
        }

        while precedence <= rule_precedence(self.current.kind) {
            self.advance();
            self.infix(self.previous.kind);
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn prefix(&mut self, kind: TokenKind, can_assign: bool) -> bool {
        match kind {
            TokenKind::LeftParen => self.grouping(),
            TokenKind::Minus | TokenKind::Bang => self.unary(),
            TokenKind::Number => self.number(),
            TokenKind::String => self.string(),
            TokenKind::Identifier => self.variable(can_assign),
            TokenKind::Nil | TokenKind::True | TokenKind::False => self.literal(),
            _ => return false,
        }
        true
    }

    fn infix(&mut self, kind: TokenKind) {
        use TokenKind::*;
        match kind {
            Minus | Plus | Slash | Star | BangEqual | EqualEqual | Greater | GreaterEqual
            | Less | LessEqual => self.binary(),
            _ => {}
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!("unary() dispatched for non-unary token"),
        }
    }

    fn binary(&mut self) {
        let operator = self.previous.kind;
        let precedence = rule_precedence(operator);
        self.parse_precedence(precedence.next());
        match operator {
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::BangEqual => {
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            }
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            TokenKind::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            _ => unreachable!("binary() dispatched for non-binary token"),
        }
    }

    fn number(&mut self) {
        let value: f64 = self
            .previous
            .lexeme
            .parse()
            .expect("scanner guarantees a valid numeric lexeme");
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self) {
        let lexeme = self.previous.lexeme;
        let contents = &lexeme[1..lexeme.len() - 1];
        let interned = self.interner.intern(contents);
        self.emit_constant(Value::from(interned));
    }

    fn literal(&mut self) {
        match self.previous.kind {
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::False => self.emit_op(OpCode::False),
            _ => unreachable!("literal() dispatched for non-literal token"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme;
        self.named_variable(name, can_assign);
    }

    fn named_variable(&mut self, name: &str, can_assign: bool) {
        let arg = self.identifier_constant(name);
        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_bytes(OpCode::SetGlobal, arg);
        } else {
            self.emit_bytes(OpCode::GetGlobal, arg);
        }
    }
}

/// Compile `source` into `chunk`, interning literals and identifiers through
/// `interner`. Returns `true` on success; on a compile error, diagnostics
/// have already been written to stderr and `chunk` should be discarded.
pub fn compile(source: &str, chunk: &mut Chunk, interner: &mut Interner) -> bool {
    tracing::trace!(target: "ash_compiler", bytes = source.len(), "compiling");
    let mut compiler = Compiler::new(source, chunk, interner);

    while !compiler.match_token(TokenKind::Eof) {
        compiler.declaration();
    }
    compiler.emit_return();

    tracing::trace!(target: "ash_compiler", had_error = compiler.had_error, "compile finished");
    !compiler.had_error
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash_core::OpCode;

    fn compile_ok(source: &str) -> Chunk {
        let mut chunk = Chunk::new();
        let mut interner = Interner::new();
        assert!(compile(source, &mut chunk, &mut interner), "expected compile success for {source:?}");
        chunk
    }

    #[test]
    fn compiles_arithmetic_with_precedence() {
        let chunk = compile_ok("print 1 + 2 * 3;");
        let ops: Vec<u8> = chunk.code().to_vec();
        assert!(ops.contains(&(OpCode::Add as u8)));
        assert!(ops.contains(&(OpCode::Multiply as u8)));
        assert_eq!(*chunk.code().last().unwrap(), OpCode::Return as u8);
    }

    #[test]
    fn var_declaration_emits_define_global() {
        let chunk = compile_ok("var x = 10;");
        assert!(chunk.code().contains(&(OpCode::DefineGlobal as u8)));
    }

    #[test]
    fn assignment_emits_set_global_after_evaluating_rhs() {
        let chunk = compile_ok("var x = 1; x = x + 5;");
        assert!(chunk.code().contains(&(OpCode::SetGlobal as u8)));
        assert!(chunk.code().contains(&(OpCode::GetGlobal as u8)));
    }

    #[test]
    fn block_introduces_no_new_scope() {
        let chunk = compile_ok("{ var x = 1; print x; }");
        assert!(chunk.code().contains(&(OpCode::DefineGlobal as u8)));
        assert!(chunk.code().contains(&(OpCode::GetGlobal as u8)));
    }

    #[test]
    fn missing_semicolon_is_a_compile_error() {
        let mut chunk = Chunk::new();
        let mut interner = Interner::new();
        assert!(!compile("print 1", &mut chunk, &mut interner));
    }

    #[test]
    fn panic_mode_suppresses_cascading_errors_until_synchronized() {
        let mut chunk = Chunk::new();
        let mut interner = Interner::new();
        // Two consecutive malformed statements: only synchronize() recovery
        // keeps this from reporting an unbounded cascade.
        let ok = compile("print ; print ;", &mut chunk, &mut interner);
        assert!(!ok);
    }

    #[test]
    fn string_literals_are_interned_not_duplicated() {
        let chunk = compile_ok("print \"ab\" + \"ab\";");
        let strings: Vec<_> = chunk
            .constants()
            .iter()
            .filter_map(|v| v.as_string().cloned())
            .collect();
        assert_eq!(strings.len(), 2);
        assert!(std::rc::Rc::ptr_eq(&strings[0], &strings[1]));
    }
}
