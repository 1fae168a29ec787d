use std::{
    io::{self, Write},
    rc::Rc,
};

use itertools::Itertools;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, Level};

use crate::{
    compile, intern, Chunk, Error, ObjClosure, ObjFun, Object, OpCode, RuntimeError, StrId,
    TraceFrame, Value, MAX_LOCALS,
};

/// Maximum depth of nested calls, including the top-level script
pub const MAX_FRAMES: usize = 64;

/// Every frame can address at most `MAX_LOCALS` slots
pub const MAX_STACK: usize = MAX_LOCALS * MAX_FRAMES;

#[derive(Debug)]
struct CallFrame {
    function: Rc<ObjFun>,
    ip: usize,
    slot: usize,
}

/// A bytecode virtual machine for the Lox programming language. Output of
/// `print` statements goes to `W`.
#[derive(Debug)]
pub struct VM<W = io::Stdout> {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: FxHashMap<StrId, Value>,
    out: W,
}

impl Default for VM<io::Stdout> {
    fn default() -> Self {
        Self::with_output(io::stdout())
    }
}

impl<W: Write> VM<W> {
    /// Create a virtual machine that prints to the given writer
    pub fn with_output(out: W) -> Self {
        Self {
            stack: Vec::with_capacity(MAX_STACK),
            frames: Vec::with_capacity(MAX_FRAMES),
            globals: FxHashMap::default(),
            out,
        }
    }

    /// The writer that receives printed values
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Consume the virtual machine and return its writer
    pub fn into_output(self) -> W {
        self.out
    }

    /// Compile and run the given source. Globals defined by earlier calls
    /// remain visible.
    pub fn interpret(&mut self, src: &str) -> Result<(), Error> {
        let function = compile(src).map_err(Error::Compile)?;
        self.execute(Rc::new(function))
    }

    /// Run an already compiled top-level function.
    pub fn execute(&mut self, function: Rc<ObjFun>) -> Result<(), Error> {
        debug!(function = %function, "execute");
        self.stack.push(Value::from(Rc::clone(&function)));
        let res = match self.call(function, 0) {
            Ok(()) => self.run(),
            Err(err) => Err(err),
        };
        res.map_err(|error| {
            let trace = self.stack_trace();
            debug!(%error, depth = trace.len(), "runtime error");
            self.reset();
            Error::Runtime { error, trace }
        })
    }

    /// Run the virtual machine with it currently given chunk.
    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            if tracing::enabled!(Level::TRACE) {
                self.trace_instruction();
            }

            match self.next_instruction() {
                OpCode::Constant(const_id) => {
                    let val = self.chunk().read_const(const_id).clone();
                    self.push(val)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal(slot) => {
                    let local = self.stack[self.frame().slot + slot as usize].clone();
                    self.push(local)?;
                }
                OpCode::SetLocal(slot) => {
                    let offset = self.frame().slot + slot as usize;
                    self.stack[offset] = self.peek(0).clone();
                }
                OpCode::GetGlobal(const_id) => {
                    let name = self.read_name(const_id);
                    let val = self
                        .globals
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| RuntimeError::UndefinedVariable(intern::str(name)))?;
                    self.push(val)?;
                }
                OpCode::DefineGlobal(const_id) => {
                    let name = self.read_name(const_id);
                    let val = self.pop();
                    self.globals.insert(name, val);
                }
                OpCode::SetGlobal(const_id) => {
                    let name = self.read_name(const_id);
                    let val = self.peek(0).clone();
                    match self.globals.get_mut(&name) {
                        Some(global) => *global = val,
                        None => return Err(RuntimeError::UndefinedVariable(intern::str(name))),
                    }
                }
                OpCode::Equal => {
                    let v2 = self.pop();
                    let v1 = self.peek_mut(0);
                    *v1 = Value::Bool(*v1 == v2);
                }
                OpCode::Greater => self.binary_op(Value::gt)?,
                OpCode::Less => self.binary_op(Value::lt)?,
                OpCode::Add => self.binary_op(|v1, v2| v1 + v2)?,
                OpCode::Subtract => self.binary_op(|v1, v2| v1 - v2)?,
                OpCode::Multiply => self.binary_op(|v1, v2| v1 * v2)?,
                OpCode::Divide => self.binary_op(|v1, v2| v1 / v2)?,
                OpCode::Not => {
                    let v = self.peek_mut(0);
                    *v = !&*v;
                }
                OpCode::Negate => {
                    let v = self.peek_mut(0);
                    *v = (-&*v)?;
                }
                OpCode::Print => {
                    let v = self.pop();
                    writeln!(self.out, "{}", v).map_err(|err| RuntimeError::Output(err.kind()))?;
                }
                OpCode::Jump(offset) => {
                    self.frame_mut().ip += offset as usize;
                }
                OpCode::JumpIfFalse(offset) => {
                    if self.peek(0).is_falsey() {
                        self.frame_mut().ip += offset as usize;
                    }
                }
                OpCode::Loop(offset) => {
                    self.frame_mut().ip -= offset as usize;
                }
                OpCode::Call(argc) => {
                    let callee = self.peek(argc as usize).clone();
                    self.call_value(callee, argc)?;
                }
                OpCode::Closure(const_id) => {
                    let fun = match self.chunk().read_const(const_id) {
                        Value::Object(Object::Fun(fun)) => Rc::clone(fun),
                        _ => unreachable!("Closure operand must be a function constant."),
                    };
                    self.push(Value::from(Rc::new(ObjClosure::new(fun))))?;
                }
                OpCode::Return => {
                    let val = self.pop();
                    let frame = self
                        .frames
                        .pop()
                        .expect("Should have exited when there's no frame left");
                    self.stack.truncate(frame.slot);
                    if self.frames.is_empty() {
                        return Ok(());
                    }
                    self.push(val)?;
                }
            }
        }
    }

    fn binary_op(
        &mut self,
        op: fn(&Value, &Value) -> Result<Value, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let res = op(self.peek(1), self.peek(0))?;
        self.pop();
        *self.peek_mut(0) = res;
        Ok(())
    }

    fn call_value(&mut self, callee: Value, argc: u8) -> Result<(), RuntimeError> {
        match callee {
            Value::Object(Object::Closure(closure)) => self.call(Rc::clone(&closure.fun), argc),
            Value::Object(Object::Fun(fun)) => self.call(fun, argc),
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call(&mut self, function: Rc<ObjFun>, argc: u8) -> Result<(), RuntimeError> {
        if argc != function.arity {
            return Err(RuntimeError::ArityMismatch {
                arity: function.arity,
                argc,
            });
        }

        if self.frames.len() == MAX_FRAMES {
            return Err(RuntimeError::StackOverflow);
        }

        let frame = CallFrame {
            function,
            ip: 0,
            slot: self.stack.len() - argc as usize - 1,
        };
        self.frames.push(frame);
        Ok(())
    }

    /// Where execution stopped in every active frame, innermost first.
    fn stack_trace(&self) -> Vec<TraceFrame> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let (_, pos) = frame
                    .function
                    .chunk
                    .read_instruction(frame.ip.saturating_sub(1));
                let function = if frame.function.is_script() {
                    None
                } else {
                    Some(intern::str(frame.function.name))
                };
                TraceFrame {
                    line: pos.line,
                    function,
                }
            })
            .collect()
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.frames.clear();
    }

    fn trace_instruction(&self) {
        let frame = self.frame();
        trace!(
            stack = %self.stack.iter().map(|v| format!("[ {} ]", v)).join(""),
            "{}",
            frame.function.chunk.instruction(frame.ip)
        );
    }

    fn read_name(&self, const_id: u8) -> StrId {
        match self.chunk().read_const(const_id) {
            Value::Object(Object::String(name)) => intern::id(&**name),
            _ => unreachable!("Constant for the variable name must have been added."),
        }
    }

    fn next_instruction(&mut self) -> OpCode {
        let frame = self.frame_mut();
        let (opcode, _) = frame.function.chunk.read_instruction(frame.ip);
        let opcode = *opcode;
        frame.ip += 1;
        opcode
    }

    fn chunk(&self) -> &Chunk {
        &self.frame().function.chunk
    }

    fn frame(&self) -> &CallFrame {
        self.frames
            .last()
            .expect("There's always one callframe for the script.")
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames
            .last_mut()
            .expect("There's always one callframe for the script.")
    }

    fn peek(&self, steps: usize) -> &Value {
        self.stack
            .get(self.stack.len() - 1 - steps)
            .expect("Invalid bytecodes")
    }

    fn peek_mut(&mut self, steps: usize) -> &mut Value {
        let idx = self.stack.len() - 1 - steps;
        self.stack.get_mut(idx).expect("Invalid bytecodes")
    }

    fn push(&mut self, val: Value) -> Result<(), RuntimeError> {
        if self.stack.len() == MAX_STACK {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(val);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("Invalid bytecodes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InterpretResult;

    fn run(src: &str) -> (Result<(), Error>, String) {
        let mut vm = VM::with_output(Vec::new());
        let res = vm.interpret(src);
        (res, String::from_utf8(vm.into_output()).unwrap())
    }

    #[test]
    fn arithmetic_precedence() {
        let (res, out) = run("print 1 + 2 * 3 / 5 - 7 == -4.8; print 1 + 2 * 3 / 5 - 7;");
        assert!(res.is_ok());
        assert_eq!(out, "true\n-4.8\n");
    }

    #[test]
    fn truthiness_of_zero_and_nil() {
        let (res, out) = run("print !0; print !nil; print !false; print !\"\";");
        assert!(res.is_ok());
        assert_eq!(out, "false\ntrue\ntrue\nfalse\n");
    }

    #[test]
    fn stack_is_balanced_after_statements() {
        let mut vm = VM::with_output(Vec::new());
        vm.interpret("var a = 1; { var b = 2; a + b; if (a) { var c; } while (false) {} }")
            .unwrap();
        assert!(vm.stack.is_empty());
        assert!(vm.frames.is_empty());
    }

    #[test]
    fn runtime_error_resets_state_and_keeps_output() {
        let mut vm = VM::with_output(Vec::new());
        let res = vm.interpret("print \"before\";\nprint -\"x\";\nprint \"after\";");
        match &res {
            Err(Error::Runtime { error, trace }) => {
                assert_eq!(error, &RuntimeError::ExpectedNumber);
                assert_eq!(trace.len(), 1);
                assert_eq!(trace[0].line, 2);
            }
            other => panic!("expected a runtime error, got {other:?}"),
        }
        assert_eq!(InterpretResult::from(&res), InterpretResult::RuntimeError);
        assert!(vm.stack.is_empty());
        assert!(vm.frames.is_empty());
        assert_eq!(vm.output(), b"before\n");
    }

    #[test]
    fn globals_survive_between_interpret_calls() {
        let mut vm = VM::with_output(Vec::new());
        vm.interpret("var greeting = \"hi\";").unwrap();
        vm.interpret("greeting = greeting + \"!\"; print greeting;")
            .unwrap();
        assert_eq!(vm.output(), b"hi!\n");
    }

    #[test]
    fn stack_overflow_on_deep_recursion() {
        let (res, _) = run("fun f() { f(); } f();");
        match res {
            Err(Error::Runtime { error, trace }) => {
                assert_eq!(error, RuntimeError::StackOverflow);
                assert_eq!(trace.len(), MAX_FRAMES);
                assert_eq!(trace.last().unwrap().function, None);
                assert_eq!(trace[0].function.as_deref(), Some("f"));
            }
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }
}
