use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: abc <input.abc>");
        eprintln!("       abc --tokens <input.abc>");
        eprintln!("       abc --semantics <input.abc>");
        eprintln!("       abc --abct <input.abct>");
        process::exit(1);
    }

    let mut mode = "check";
    let mut input_path = &args[1];

    if args[1].starts_with("--") {
        mode = match args[1].as_str() {
            "--tokens" => "tokens",
            "--semantics" => "semantics",
            "--abct" => "abct",
            other => {
                eprintln!("Unknown option: {}", other);
                process::exit(1);
            }
        };
        if args.len() < 3 {
            eprintln!("Usage: abc {} <input>", args[1]);
            process::exit(1);
        }
        input_path = &args[2];
    }

    let source = match fs::read_to_string(input_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", input_path, e);
            process::exit(1);
        }
    };

    match mode {
        "tokens" => {
            let mut ctx = abc::SourceContext::with_source_name(input_path);
            let tokens = abc::scan(&source, &mut ctx);
            print_yaml(&tokens);
            report(input_path, abc::errors(&ctx));
            if ctx.has_errors() {
                process::exit(1);
            }
        }
        "abct" => {
            let mut ctx = abc::SourceContext::with_source_name(input_path);
            let tokens = abc::scan_abct(&source, &mut ctx);
            print_yaml(&tokens);
            report(input_path, abc::errors(&ctx));
            if ctx.has_errors() {
                process::exit(1);
            }
        }
        "semantics" => {
            let result = abc::compile(&source);
            // sort by node id for stable output
            let sorted: BTreeMap<u32, &abc::SemanticData> =
                result.semantics.iter().map(|(k, v)| (*k, v)).collect();
            print_yaml(&sorted);
            report(input_path, &result.diagnostics);
            if !result.diagnostics.is_empty() {
                process::exit(1);
            }
        }
        _ => {
            let result = abc::compile(&source);
            report(input_path, &result.diagnostics);
            if !result.diagnostics.is_empty() {
                process::exit(1);
            }
            let tunes = result
                .ast
                .contents
                .iter()
                .filter(|e| matches!(e, abc::Expr::Tune(_)))
                .count();
            eprintln!("{}: {} tune(s), no problems", input_path, tunes);
        }
    }
}

fn print_yaml<T: serde::Serialize>(value: &T) {
    match serde_yaml::to_string(value) {
        Ok(yaml) => println!("{}", yaml),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn report(path: &str, diagnostics: &[abc::Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}: {}", path, diagnostic);
    }
}
