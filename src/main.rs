use std::io::{self, Write};

fn main() {
    let args: Vec<String> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let mut stdout = io::stdout();
    let code = minish::cli::run(&args, &mut stdout, Box::new(io::stderr()));
    let _ = stdout.flush();
    std::process::exit(code);
}
