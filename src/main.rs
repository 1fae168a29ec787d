use std::{
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
    process,
    rc::Rc,
};

use clap::Parser;
use rclox::{compile, intern, Error, ObjFun, Object, Value, VM};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rclox", about = "A bytecode virtual machine for Lox")]
struct Cli {
    /// Script to run, starts a REPL when omitted
    path: Option<PathBuf>,

    /// Print the compiled bytecode to stderr before running
    #[arg(short, long)]
    disassemble: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut vm = VM::default();
    match &cli.path {
        Some(path) => run_file(&mut vm, path, cli.disassemble),
        None => repl(&mut vm, cli.disassemble),
    }
}

fn repl(vm: &mut VM, disassemble: bool) {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }
        let line = match lines.next() {
            Some(Ok(line)) if !line.is_empty() => line,
            _ => {
                println!();
                break;
            }
        };
        if let Err(err) = run(vm, &line, disassemble) {
            eprintln!("{err}");
        }
    }
}

fn run_file(vm: &mut VM, path: &PathBuf, disassemble: bool) {
    let src = match fs::read_to_string(path) {
        Ok(src) => src,
        Err(err) => {
            eprintln!("Could not read file \"{}\": {err}.", path.display());
            process::exit(74);
        }
    };
    if let Err(err) = run(vm, &src, disassemble) {
        eprintln!("{err}");
        process::exit(err.exit_code());
    }
}

fn run(vm: &mut VM, src: &str, disassemble: bool) -> Result<(), Error> {
    if !disassemble {
        return vm.interpret(src);
    }
    let script = Rc::new(compile(src).map_err(Error::Compile)?);
    if let Err(err) = dump(&script, &mut io::stderr()) {
        eprintln!("Could not write disassembly: {err}.");
    }
    vm.execute(script)
}

/// Disassemble a function and every function nested in its constants.
fn dump(fun: &ObjFun, w: &mut impl Write) -> io::Result<()> {
    let name = if fun.is_script() {
        "<script>".to_string()
    } else {
        intern::str(fun.name)
    };
    fun.chunk.disassemble(&name, &mut *w)?;
    for constant in fun.chunk.constants() {
        if let Value::Object(Object::Fun(nested)) = constant {
            dump(nested, w)?;
        }
    }
    Ok(())
}
