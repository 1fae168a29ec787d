use std::rc::Rc;

use tracing::debug;

use crate::{
    intern,
    scan::Scanner,
    token::{self, Token},
    Chunk, Location, ObjFun, OpCode, ParseError, ParseErrorKind, Position, Value,
};

/// Local slots are addressed by a single byte operand.
pub const MAX_LOCALS: usize = u8::MAX as usize + 1;

/// Constants are addressed by a single byte operand.
pub const MAX_CONSTANTS: usize = u8::MAX as usize + 1;

/// Compile the given source code in to bytecodes that can be read
/// by the virtual machine. The result is the function wrapping the
/// top-level code, or every diagnostic that was reported.
pub fn compile(src: &str) -> Result<ObjFun, Vec<ParseError>> {
    Compiler::new(src).compile()
}

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
    fn next(self) -> Self {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary => Self::Call,
            Self::Call | Self::Primary => Self::Primary,
        }
    }
}

/// Handlers a token can be parsed with, dispatched by [`Compiler::apply`].
#[derive(Debug, Clone, Copy)]
enum ParseFn {
    Grouping,
    Call,
    Unary,
    Binary,
    Number,
    String,
    Literal,
    Variable,
    And,
    Or,
}

#[derive(Debug, Clone, Copy)]
struct ParseRule {
    prefix: Option<ParseFn>,
    infix: Option<ParseFn>,
    precedence: Precedence,
}

impl ParseRule {
    const fn new(prefix: Option<ParseFn>, infix: Option<ParseFn>, precedence: Precedence) -> Self {
        Self {
            prefix,
            infix,
            precedence,
        }
    }

    fn of(typ: token::Type) -> Self {
        use token::Type;
        match typ {
            Type::LParen => Self::new(Some(ParseFn::Grouping), Some(ParseFn::Call), Precedence::Call),
            Type::Minus => Self::new(Some(ParseFn::Unary), Some(ParseFn::Binary), Precedence::Term),
            Type::Plus => Self::new(None, Some(ParseFn::Binary), Precedence::Term),
            Type::Slash | Type::Star => Self::new(None, Some(ParseFn::Binary), Precedence::Factor),
            Type::Bang => Self::new(Some(ParseFn::Unary), None, Precedence::None),
            Type::BangEqual | Type::EqualEqual => {
                Self::new(None, Some(ParseFn::Binary), Precedence::Equality)
            }
            Type::Greater | Type::GreaterEqual | Type::Less | Type::LessEqual => {
                Self::new(None, Some(ParseFn::Binary), Precedence::Comparison)
            }
            Type::Ident => Self::new(Some(ParseFn::Variable), None, Precedence::None),
            Type::String => Self::new(Some(ParseFn::String), None, Precedence::None),
            Type::Number => Self::new(Some(ParseFn::Number), None, Precedence::None),
            Type::And => Self::new(None, Some(ParseFn::And), Precedence::And),
            Type::Or => Self::new(None, Some(ParseFn::Or), Precedence::Or),
            Type::False | Type::True | Type::Nil => {
                Self::new(Some(ParseFn::Literal), None, Precedence::None)
            }
            _ => Self::new(None, None, Precedence::None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Script,
    Function,
}

#[derive(Debug)]
struct Local {
    name: String,
    /// `None` until the variable's initializer has been compiled.
    depth: Option<usize>,
}

/// Compile-time state of one function body. Scopes form a stack, the
/// enclosing function is always the previous entry.
#[derive(Debug)]
struct FunctionScope {
    fun: ObjFun,
    kind: FunctionKind,
    locals: Vec<Local>,
    depth: usize,
}

impl FunctionScope {
    fn new(fun: ObjFun, kind: FunctionKind, callee: String) -> Self {
        // Slot 0 holds the callee while the function runs.
        let locals = vec![Local {
            name: callee,
            depth: Some(0),
        }];
        Self {
            fun,
            kind,
            locals,
            depth: 0,
        }
    }
}

/// A single-pass compiler that parses Lox tokens and emits bytecode
/// as it goes.
#[derive(Debug)]
pub struct Compiler {
    scanner: Scanner,
    previous: Token,
    current: Token,
    scopes: Vec<FunctionScope>,
    errors: Vec<ParseError>,
    panic_mode: bool,
}

impl Compiler {
    /// Create a compiler for the given source
    pub fn new(src: &str) -> Self {
        Self {
            scanner: Scanner::new(src),
            previous: Token::synthetic(token::Type::Eof),
            current: Token::synthetic(token::Type::Eof),
            scopes: vec![FunctionScope::new(
                ObjFun::script(),
                FunctionKind::Script,
                String::new(),
            )],
            errors: Vec::new(),
            panic_mode: false,
        }
    }

    /// Compile the whole source. Parsing always runs until the end of file
    /// so independent errors are all reported.
    pub fn compile(mut self) -> Result<ObjFun, Vec<ParseError>> {
        self.advance();
        while !self.matches(token::Type::Eof) {
            self.declaration();
        }
        let script = self.end_function();
        if self.errors.is_empty() {
            Ok(script)
        } else {
            Err(self.errors)
        }
    }

    fn declaration(&mut self) {
        if self.matches(token::Type::Fun) {
            self.fun_declaration();
        } else if self.matches(token::Type::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn fun_declaration(&mut self) {
        let is_local = self.scope().depth > 0;
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        // A local function can only reach itself through its callee slot.
        let callee = if is_local {
            self.previous.lexeme.clone()
        } else {
            String::new()
        };
        self.function(FunctionKind::Function, callee);
        self.define_variable(global);
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");
        if self.matches(token::Type::Equal) {
            self.expression();
        } else {
            self.emit(OpCode::Nil);
        }
        self.consume(
            token::Type::Semicolon,
            "Expect ';' after variable declaration.",
        );
        self.define_variable(global);
    }

    fn statement(&mut self) {
        if self.matches(token::Type::Print) {
            self.print_statement();
        } else if self.matches(token::Type::If) {
            self.if_statement();
        } else if self.matches(token::Type::Return) {
            self.return_statement();
        } else if self.matches(token::Type::While) {
            self.while_statement();
        } else if self.matches(token::Type::For) {
            self.for_statement();
        } else if self.matches(token::Type::LBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(token::Type::Semicolon, "Expect ';' after value.");
        self.emit(OpCode::Print);
    }

    fn if_statement(&mut self) {
        self.consume(token::Type::LParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(token::Type::RParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit(OpCode::Pop);
        self.statement();
        let else_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(then_jump);
        self.emit(OpCode::Pop);
        if self.matches(token::Type::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn return_statement(&mut self) {
        if self.scope().kind == FunctionKind::Script {
            self.error(ParseErrorKind::TopLevelReturn);
        }
        if self.matches(token::Type::Semicolon) {
            self.emit_return();
        } else {
            self.expression();
            self.consume(token::Type::Semicolon, "Expect ';' after return value.");
            self.emit(OpCode::Return);
        }
    }

    fn while_statement(&mut self) {
        let loop_start = self.chunk().size();
        self.consume(token::Type::LParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(token::Type::RParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit(OpCode::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(token::Type::LParen, "Expect '(' after 'for'.");
        if self.matches(token::Type::Semicolon) {
            // No initializer.
        } else if self.matches(token::Type::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.chunk().size();
        let mut exit_jump = None;
        if !self.matches(token::Type::Semicolon) {
            self.expression();
            self.consume(token::Type::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit(OpCode::Pop);
        }

        if !self.matches(token::Type::RParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.chunk().size();
            self.expression();
            self.emit(OpCode::Pop);
            self.consume(token::Type::RParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit(OpCode::Pop);
        }
        self.end_scope();
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(token::Type::Semicolon, "Expect ';' after expression.");
        self.emit(OpCode::Pop);
    }

    fn block(&mut self) {
        while !self.check(token::Type::RBrace) && !self.check(token::Type::Eof) {
            self.declaration();
        }
        self.consume(token::Type::RBrace, "Expect '}' after block.");
    }

    fn function(&mut self, kind: FunctionKind, callee: String) {
        let name = intern::id(&self.previous.lexeme);
        self.scopes
            .push(FunctionScope::new(ObjFun::new(name), kind, callee));
        self.begin_scope();

        self.consume(token::Type::LParen, "Expect '(' after function name.");
        if !self.check(token::Type::RParen) {
            loop {
                if self.scope().fun.arity == u8::MAX {
                    self.error_at_current(ParseErrorKind::TooManyParameters);
                } else {
                    self.scope_mut().fun.arity += 1;
                }
                let param = self.parse_variable("Expect parameter name.");
                self.define_variable(param);
                if !self.matches(token::Type::Comma) {
                    break;
                }
            }
        }
        self.consume(token::Type::RParen, "Expect ')' after parameters.");
        self.consume(token::Type::LBrace, "Expect '{' before function body.");
        self.block();

        // The function's locals are discarded by `Return`, no need to end the scope.
        let fun = self.end_function();
        let constant = self.make_constant(Value::from(Rc::new(fun)));
        self.emit(OpCode::Closure(constant));
    }

    fn end_function(&mut self) -> ObjFun {
        self.emit_return();
        let scope = self
            .scopes
            .pop()
            .expect("There's always a scope for the function being compiled.");
        if self.errors.is_empty() && tracing::enabled!(tracing::Level::DEBUG) {
            let mut listing = Vec::new();
            if scope
                .fun
                .chunk
                .disassemble(&scope.fun.to_string(), &mut listing)
                .is_ok()
            {
                debug!("\n{}", String::from_utf8_lossy(&listing));
            }
        }
        scope.fun
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix = match ParseRule::of(self.previous.typ).prefix {
            Some(prefix) => prefix,
            None => {
                self.error(ParseErrorKind::UnexpectedToken("Expect expression."));
                return;
            }
        };

        let can_assign = precedence <= Precedence::Assignment;
        self.apply(prefix, can_assign);

        while precedence <= ParseRule::of(self.current.typ).precedence {
            self.advance();
            if let Some(infix) = ParseRule::of(self.previous.typ).infix {
                self.apply(infix, can_assign);
            }
        }

        if can_assign && self.matches(token::Type::Equal) {
            self.error(ParseErrorKind::InvalidAssignTarget);
        }
    }

    fn apply(&mut self, parse_fn: ParseFn, can_assign: bool) {
        match parse_fn {
            ParseFn::Grouping => self.grouping(),
            ParseFn::Call => self.call(),
            ParseFn::Unary => self.unary(),
            ParseFn::Binary => self.binary(),
            ParseFn::Number => self.number(),
            ParseFn::String => self.string(),
            ParseFn::Literal => self.literal(),
            ParseFn::Variable => self.variable(can_assign),
            ParseFn::And => self.and(),
            ParseFn::Or => self.or(),
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(token::Type::RParen, "Expect ')' after expression.");
    }

    fn call(&mut self) {
        let argc = self.argument_list();
        self.emit(OpCode::Call(argc));
    }

    fn argument_list(&mut self) -> u8 {
        let mut argc: u8 = 0;
        if !self.check(token::Type::RParen) {
            loop {
                self.expression();
                if argc == u8::MAX {
                    self.error(ParseErrorKind::TooManyArguments);
                } else {
                    argc += 1;
                }
                if !self.matches(token::Type::Comma) {
                    break;
                }
            }
        }
        self.consume(token::Type::RParen, "Expect ')' after arguments.");
        argc
    }

    fn unary(&mut self) {
        let op = self.previous.typ;
        self.parse_precedence(Precedence::Unary);
        match op {
            token::Type::Minus => self.emit(OpCode::Negate),
            token::Type::Bang => self.emit(OpCode::Not),
            _ => unreachable!("Only '-' and '!' have a unary rule."),
        }
    }

    fn binary(&mut self) {
        let op = self.previous.typ;
        self.parse_precedence(ParseRule::of(op).precedence.next());
        match op {
            token::Type::BangEqual => {
                self.emit(OpCode::Equal);
                self.emit(OpCode::Not);
            }
            token::Type::EqualEqual => self.emit(OpCode::Equal),
            token::Type::Greater => self.emit(OpCode::Greater),
            token::Type::GreaterEqual => {
                self.emit(OpCode::Less);
                self.emit(OpCode::Not);
            }
            token::Type::Less => self.emit(OpCode::Less),
            token::Type::LessEqual => {
                self.emit(OpCode::Greater);
                self.emit(OpCode::Not);
            }
            token::Type::Plus => self.emit(OpCode::Add),
            token::Type::Minus => self.emit(OpCode::Subtract),
            token::Type::Star => self.emit(OpCode::Multiply),
            token::Type::Slash => self.emit(OpCode::Divide),
            _ => unreachable!("{:?} has no binary rule.", op),
        }
    }

    fn and(&mut self) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or(&mut self) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(else_jump);
        self.emit(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn number(&mut self) {
        let n = self
            .previous
            .lexeme
            .parse::<f64>()
            .expect("Number lexemes only contain digits and a fractional part.");
        self.emit_constant(Value::Number(n));
    }

    fn string(&mut self) {
        let lexeme = &self.previous.lexeme;
        let value = Value::from(&lexeme[1..lexeme.len() - 1]);
        self.emit_constant(value);
    }

    fn literal(&mut self) {
        match self.previous.typ {
            token::Type::False => self.emit(OpCode::False),
            token::Type::True => self.emit(OpCode::True),
            token::Type::Nil => self.emit(OpCode::Nil),
            _ => unreachable!("Only 'false', 'true', and 'nil' are literals."),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme.clone();
        self.named_variable(&name, can_assign);
    }

    fn named_variable(&mut self, name: &str, can_assign: bool) {
        let (get, set) = match self.resolve_local(name) {
            Some(slot) => (OpCode::GetLocal(slot), OpCode::SetLocal(slot)),
            None => {
                if self.resolve_enclosing(name) {
                    self.error(ParseErrorKind::CapturedLocal);
                }
                let constant = self.identifier_constant(name);
                (OpCode::GetGlobal(constant), OpCode::SetGlobal(constant))
            }
        };

        if can_assign && self.matches(token::Type::Equal) {
            self.expression();
            self.emit(set);
        } else {
            self.emit(get);
        }
    }

    fn resolve_local(&mut self, name: &str) -> Option<u8> {
        let (slot, initialized) = self
            .scope()
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, local)| local.name == name)
            .map(|(slot, local)| (slot, local.depth.is_some()))?;
        if !initialized {
            self.error(ParseErrorKind::SelfReferencingInitializer);
        }
        // `add_local` never lets the slot count go past `MAX_LOCALS`.
        Some(slot as u8)
    }

    fn resolve_enclosing(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .rev()
            .skip(1)
            .any(|scope| scope.locals.iter().any(|local| local.name == name))
    }

    fn parse_variable(&mut self, message: &'static str) -> u8 {
        self.consume(token::Type::Ident, message);
        self.declare_variable();
        if self.scope().depth > 0 {
            return 0;
        }
        let name = self.previous.lexeme.clone();
        self.identifier_constant(&name)
    }

    fn declare_variable(&mut self) {
        let depth = self.scope().depth;
        if depth == 0 {
            return;
        }
        let name = self.previous.lexeme.clone();
        let redeclared = self
            .scope()
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth.map_or(true, |d| d >= depth))
            .any(|local| local.name == name);
        if redeclared {
            self.error(ParseErrorKind::VariableRedeclaration);
        }
        self.add_local(name);
    }

    fn add_local(&mut self, name: String) {
        if self.scope().locals.len() == MAX_LOCALS {
            self.error(ParseErrorKind::TooManyLocalVariables);
            return;
        }
        self.scope_mut().locals.push(Local { name, depth: None });
    }

    fn define_variable(&mut self, global: u8) {
        if self.scope().depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit(OpCode::DefineGlobal(global));
    }

    fn mark_initialized(&mut self) {
        let scope = self.scope_mut();
        let depth = scope.depth;
        if depth == 0 {
            return;
        }
        if let Some(local) = scope.locals.last_mut() {
            local.depth = Some(depth);
        }
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        self.make_constant(Value::from(name))
    }

    fn begin_scope(&mut self) {
        self.scope_mut().depth += 1;
    }

    fn end_scope(&mut self) {
        let scope = self.scope_mut();
        scope.depth -= 1;
        let depth = scope.depth;
        let mut discarded = 0;
        while scope
            .locals
            .last()
            .map_or(false, |local| local.depth.map_or(true, |d| d > depth))
        {
            scope.locals.pop();
            discarded += 1;
        }
        for _ in 0..discarded {
            self.emit(OpCode::Pop);
        }
    }

    fn emit(&mut self, code: OpCode) {
        let pos = self.previous.pos;
        self.chunk_mut().write(code, pos);
    }

    fn emit_return(&mut self) {
        self.emit(OpCode::Nil);
        self.emit(OpCode::Return);
    }

    fn emit_constant(&mut self, value: Value) {
        let constant = self.make_constant(value);
        self.emit(OpCode::Constant(constant));
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let idx = self.chunk_mut().add_const(value);
        if idx >= MAX_CONSTANTS {
            self.error(ParseErrorKind::TooManyConstants);
            return 0;
        }
        idx as u8
    }

    /// Emit a jump with a placeholder distance and return its index so it
    /// can be patched once the jump target is known.
    fn emit_jump(&mut self, jump: fn(u16) -> OpCode) -> usize {
        self.emit(jump(u16::MAX));
        self.chunk().size() - 1
    }

    fn patch_jump(&mut self, idx: usize) {
        let distance = match u16::try_from(self.chunk().size() - idx - 1) {
            Ok(distance) => distance,
            Err(_) => {
                self.error(ParseErrorKind::JumpTooLarge);
                return;
            }
        };
        let patched = match *self.chunk().read_instruction(idx).0 {
            OpCode::Jump(_) => OpCode::Jump(distance),
            OpCode::JumpIfFalse(_) => OpCode::JumpIfFalse(distance),
            code => unreachable!("{:?} is not a forward jump.", code),
        };
        self.chunk_mut().replace(idx, patched);
    }

    fn emit_loop(&mut self, loop_start: usize) {
        // Account for the loop instruction itself.
        let offset = self.chunk().size() - loop_start + 1;
        match u16::try_from(offset) {
            Ok(offset) => self.emit(OpCode::Loop(offset)),
            Err(_) => self.error(ParseErrorKind::LoopTooLarge),
        }
    }

    fn advance(&mut self) {
        loop {
            match self.scanner.scan() {
                Ok(token) => {
                    self.previous = std::mem::replace(&mut self.current, token);
                    return;
                }
                Err(err) => self.report(err.pos(), Location::Unknown, ParseErrorKind::Scan(err)),
            }
        }
    }

    fn consume(&mut self, typ: token::Type, message: &'static str) {
        if self.current.typ == typ {
            self.advance();
            return;
        }
        self.error_at_current(ParseErrorKind::UnexpectedToken(message));
    }

    fn check(&self, typ: token::Type) -> bool {
        self.current.typ == typ
    }

    fn matches(&mut self, typ: token::Type) -> bool {
        if !self.check(typ) {
            return false;
        }
        self.advance();
        true
    }

    /// Skip tokens until a statement boundary so one mistake doesn't cascade
    /// into a flood of unrelated errors.
    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.typ != token::Type::Eof {
            if self.previous.typ == token::Type::Semicolon {
                return;
            }
            match self.current.typ {
                token::Type::Class
                | token::Type::Fun
                | token::Type::Var
                | token::Type::For
                | token::Type::If
                | token::Type::While
                | token::Type::Print
                | token::Type::Return => return,
                _ => self.advance(),
            }
        }
    }

    fn error(&mut self, kind: ParseErrorKind) {
        let (pos, location) = location_of(&self.previous);
        self.report(pos, location, kind);
    }

    fn error_at_current(&mut self, kind: ParseErrorKind) {
        let (pos, location) = location_of(&self.current);
        self.report(pos, location, kind);
    }

    fn report(&mut self, pos: Position, location: Location, kind: ParseErrorKind) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors.push(ParseError {
            pos,
            location,
            kind,
        });
    }

    fn scope(&self) -> &FunctionScope {
        self.scopes
            .last()
            .expect("There's always a scope for the function being compiled.")
    }

    fn scope_mut(&mut self) -> &mut FunctionScope {
        self.scopes
            .last_mut()
            .expect("There's always a scope for the function being compiled.")
    }

    fn chunk(&self) -> &Chunk {
        &self.scope().fun.chunk
    }

    fn chunk_mut(&mut self) -> &mut Chunk {
        &mut self.scope_mut().fun.chunk
    }
}

fn location_of(token: &Token) -> (Position, Location) {
    let location = if token.typ == token::Type::Eof {
        Location::End
    } else {
        Location::Lexeme(token.lexeme.clone())
    };
    (token.pos, location)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::Object;

    fn script(src: &str) -> ObjFun {
        compile(src).unwrap_or_else(|errs| panic!("unexpected compile errors: {errs:?}"))
    }

    fn codes(chunk: &Chunk) -> Vec<OpCode> {
        (0..chunk.size())
            .map(|idx| *chunk.read_instruction(idx).0)
            .collect()
    }

    fn errors(src: &str) -> Vec<String> {
        match compile(src) {
            Ok(_) => panic!("expected compile errors for {src:?}"),
            Err(errs) => errs.iter().map(ToString::to_string).collect(),
        }
    }

    fn nested_fun(chunk: &Chunk, name: &str) -> Rc<ObjFun> {
        chunk
            .constants()
            .iter()
            .find_map(|c| match c {
                Value::Object(Object::Fun(fun)) if intern::str(fun.name) == name => {
                    Some(Rc::clone(fun))
                }
                _ => None,
            })
            .unwrap_or_else(|| panic!("no function named {name}"))
    }

    /// Every jump must land inside the chunk, forward jumps strictly ahead
    /// of themselves and loops at or before themselves.
    fn assert_jumps_in_bounds(chunk: &Chunk) {
        for idx in 0..chunk.size() {
            match *chunk.read_instruction(idx).0 {
                OpCode::Jump(d) | OpCode::JumpIfFalse(d) => {
                    assert_ne!(d, u16::MAX, "unpatched jump at {idx}");
                    assert!(idx + 1 + (d as usize) <= chunk.size());
                }
                OpCode::Loop(d) => assert!((d as usize) <= idx + 1),
                _ => {}
            }
        }
    }

    #[test]
    fn compile_precedence() {
        let fun = script("print 1 + 2 * 3 / 5 - 7;");
        assert_eq!(
            codes(&fun.chunk),
            vec![
                OpCode::Constant(0),
                OpCode::Constant(1),
                OpCode::Constant(2),
                OpCode::Multiply,
                OpCode::Constant(3),
                OpCode::Divide,
                OpCode::Add,
                OpCode::Constant(4),
                OpCode::Subtract,
                OpCode::Print,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn compile_desugared_comparisons() {
        let fun = script("1 != 2; 1 <= 2; 1 >= 2; !true;");
        assert_eq!(
            codes(&fun.chunk),
            vec![
                OpCode::Constant(0),
                OpCode::Constant(1),
                OpCode::Equal,
                OpCode::Not,
                OpCode::Pop,
                OpCode::Constant(2),
                OpCode::Constant(3),
                OpCode::Greater,
                OpCode::Not,
                OpCode::Pop,
                OpCode::Constant(4),
                OpCode::Constant(5),
                OpCode::Less,
                OpCode::Not,
                OpCode::Pop,
                OpCode::True,
                OpCode::Not,
                OpCode::Pop,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn compile_locals_and_globals() {
        let fun = script("var x = 1; { var x = 2; print x; x = 3; } print x;");
        assert_eq!(
            codes(&fun.chunk),
            vec![
                OpCode::Constant(1),
                OpCode::DefineGlobal(0),
                OpCode::Constant(2),
                OpCode::GetLocal(1),
                OpCode::Print,
                OpCode::Constant(3),
                OpCode::SetLocal(1),
                OpCode::Pop,
                OpCode::Pop,
                OpCode::GetGlobal(4),
                OpCode::Print,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
        assert_eq!(fun.chunk.read_const(0), &Value::from("x"));
    }

    #[test]
    fn compile_if_else_jumps() {
        let fun = script("if (true) print 1; else print 2;");
        assert_eq!(
            codes(&fun.chunk),
            vec![
                OpCode::True,
                OpCode::JumpIfFalse(4),
                OpCode::Pop,
                OpCode::Constant(0),
                OpCode::Print,
                OpCode::Jump(3),
                OpCode::Pop,
                OpCode::Constant(1),
                OpCode::Print,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn compile_while_loop_targets_condition() {
        let fun = script("var i = 0; while (i < 3) i = i + 1;");
        let chunk = &fun.chunk;
        assert_jumps_in_bounds(chunk);
        let loop_idx = codes(chunk)
            .iter()
            .position(|c| matches!(c, OpCode::Loop(_)))
            .unwrap();
        let exit_idx = codes(chunk)
            .iter()
            .position(|c| matches!(c, OpCode::JumpIfFalse(_)))
            .unwrap();
        // The condition starts right after `var i = 0;`.
        assert_eq!(chunk.instruction(loop_idx).to_string().split(" -> ").nth(1), Some("2"));
        assert_eq!(
            *chunk.read_instruction(exit_idx).0,
            OpCode::JumpIfFalse((loop_idx - exit_idx) as u16)
        );
        assert_eq!(*chunk.read_instruction(loop_idx + 1).0, OpCode::Pop);
    }

    #[test]
    fn compile_for_loop_disassembly() {
        let fun = script("for (var a = 5; a < 10; a = a + 1) { print a; }");
        let mut out = Vec::new();
        fun.chunk.disassemble("<script>", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "== <script> ==\n\
             0000    1 OP_CONSTANT         0 '5'\n\
             0001    | OP_GET_LOCAL        1\n\
             0002    | OP_CONSTANT         1 '10'\n\
             0003    | OP_LESS\n\
             0004    | OP_JUMP_IF_FALSE   11 -> 16\n\
             0005    | OP_POP\n\
             0006    | OP_JUMP             6 -> 13\n\
             0007    | OP_GET_LOCAL        1\n\
             0008    | OP_CONSTANT         2 '1'\n\
             0009    | OP_ADD\n\
             0010    | OP_SET_LOCAL        1\n\
             0011    | OP_POP\n\
             0012    | OP_LOOP            12 -> 1\n\
             0013    | OP_GET_LOCAL        1\n\
             0014    | OP_PRINT\n\
             0015    | OP_LOOP             9 -> 7\n\
             0016    | OP_POP\n\
             0017    | OP_POP\n\
             0018    | OP_NIL\n\
             0019    | OP_RETURN\n"
        );
    }

    #[test]
    fn compile_nested_control_flow_patches_every_jump() {
        let fun = script(
            "var n = 0;
             for (var i = 0; i < 10; i = i + 1) {
               if (i > 5 and i < 8) {
                 while (n < i) n = n + 1;
               } else if (i == 0 or i == 1) {
                 print i;
               }
             }
             for (;;) { print n; }",
        );
        assert_jumps_in_bounds(&fun.chunk);
    }

    #[test]
    fn compile_if_else_inside_while_disassembly() {
        let fun = script(
            "{ var i = 0; while (i < 2) { if (i == 0) print 1; else print 2; i = i + 1; } }",
        );
        let mut out = Vec::new();
        fun.chunk.disassemble("<script>", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "== <script> ==\n\
             0000    1 OP_CONSTANT         0 '0'\n\
             0001    | OP_GET_LOCAL        1\n\
             0002    | OP_CONSTANT         1 '2'\n\
             0003    | OP_LESS\n\
             0004    | OP_JUMP_IF_FALSE   18 -> 23\n\
             0005    | OP_POP\n\
             0006    | OP_GET_LOCAL        1\n\
             0007    | OP_CONSTANT         2 '0'\n\
             0008    | OP_EQUAL\n\
             0009    | OP_JUMP_IF_FALSE    4 -> 14\n\
             0010    | OP_POP\n\
             0011    | OP_CONSTANT         3 '1'\n\
             0012    | OP_PRINT\n\
             0013    | OP_JUMP             3 -> 17\n\
             0014    | OP_POP\n\
             0015    | OP_CONSTANT         4 '2'\n\
             0016    | OP_PRINT\n\
             0017    | OP_GET_LOCAL        1\n\
             0018    | OP_CONSTANT         5 '1'\n\
             0019    | OP_ADD\n\
             0020    | OP_SET_LOCAL        1\n\
             0021    | OP_POP\n\
             0022    | OP_LOOP            22 -> 1\n\
             0023    | OP_POP\n\
             0024    | OP_POP\n\
             0025    | OP_NIL\n\
             0026    | OP_RETURN\n"
        );
    }

    #[test]
    fn compile_number_literals() {
        let fun = script("print 12.50; print 007;");
        assert_eq!(fun.chunk.read_const(0), &Value::Number(12.5));
        assert_eq!(fun.chunk.read_const(1), &Value::Number(7.0));
    }

    #[test]
    fn compile_function_declaration() {
        let fun = script("fun add(a, b) { return a + b; } print add(1, 2);");
        assert_eq!(
            codes(&fun.chunk),
            vec![
                OpCode::Closure(1),
                OpCode::DefineGlobal(0),
                OpCode::GetGlobal(2),
                OpCode::Constant(3),
                OpCode::Constant(4),
                OpCode::Call(2),
                OpCode::Print,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
        let add = nested_fun(&fun.chunk, "add");
        assert_eq!(add.arity, 2);
        assert_eq!(
            codes(&add.chunk),
            vec![
                OpCode::GetLocal(1),
                OpCode::GetLocal(2),
                OpCode::Add,
                OpCode::Return,
                OpCode::Nil,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn compile_local_function_recurses_through_callee_slot() {
        let fun = script("{ fun count(n) { if (n > 0) count(n - 1); } count(3); }");
        let count = nested_fun(&fun.chunk, "count");
        assert!(codes(&count.chunk).contains(&OpCode::GetLocal(0)));
        assert!(!codes(&count.chunk)
            .iter()
            .any(|c| matches!(c, OpCode::GetGlobal(_))));
    }

    #[test]
    fn error_redeclaration_in_same_scope() {
        assert_eq!(
            errors("{ var x = 1; var x = 2; }"),
            vec!["[line 1] Error at 'x': Already a variable with this name in this scope."]
        );
        assert!(compile("var x = 1; var x = 2; { var x = 3; { var x = 4; } }").is_ok());
    }

    #[test]
    fn error_local_in_own_initializer() {
        assert_eq!(
            errors("{ var a = 1; { var a = a; } }"),
            vec!["[line 1] Error at 'a': Local variable used before being initialized."]
        );
    }

    #[test]
    fn error_invalid_assignment_target() {
        assert_eq!(
            errors("var a; var b; a + b = 3;"),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
    }

    #[test]
    fn error_top_level_return() {
        assert_eq!(
            errors("return 1;"),
            vec!["[line 1] Error at 'return': Can't return from top-level code."]
        );
    }

    #[test]
    fn error_at_end() {
        assert_eq!(
            errors("print 1"),
            vec!["[line 1] Error at end: Expect ';' after value."]
        );
    }

    #[test]
    fn error_from_scanner_has_no_location() {
        assert_eq!(
            errors("print 1;\nprint @;"),
            vec!["[line 2] Error: Unexpected character '@'."]
        );
        assert_eq!(
            errors("print \"open;"),
            vec!["[line 1] Error: Unterminated string."]
        );
    }

    #[test]
    fn error_capturing_enclosing_local() {
        assert_eq!(
            errors("fun outer() {\n  var x = 1;\n  fun inner() { return x; }\n}"),
            vec!["[line 3] Error at 'x': Can't capture local variable from an enclosing function."]
        );
    }

    #[test]
    fn panic_mode_reports_once_per_statement() {
        assert_eq!(
            errors("var 1 = 2;\nvar y = ;\nprint y;"),
            vec![
                "[line 1] Error at '1': Expect variable name.",
                "[line 2] Error at ';': Expect expression.",
            ]
        );
        assert_eq!(
            errors("print (1 + ;"),
            vec!["[line 1] Error at ';': Expect expression."]
        );
    }

    #[test]
    fn too_many_constants() {
        let src = (0..257).map(|i| format!("{i};")).collect::<String>();
        assert_eq!(
            errors(&src),
            vec!["[line 1] Error at '256': Too many constants in one chunk."]
        );
    }
}
